//! Single-producer/single-consumer ring buffer.
//!
//! Lossless, order-preserving handoff between exactly one producer thread
//! and one consumer thread, with no mutual exclusion. `head` (consumer
//! owned) and `tail` (producer owned) each live in their own cache line to
//! avoid false sharing, the same padding idea as
//! `disruptor::common::{PaddedProducerSequence, PaddedConsumerSequence}`.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::constants::CACHE_LINE_SIZE;

static_assertions::const_assert!(CACHE_LINE_SIZE == 64);

/// An atomic index padded to a full cache line so that producer-side and
/// consumer-side updates never false-share.
#[repr(align(64))]
struct PaddedIndex {
    value: AtomicUsize,
}

impl PaddedIndex {
    fn new(initial: usize) -> Self {
        Self { value: AtomicUsize::new(initial) }
    }
}

/// A bounded SPSC ring buffer over a plain-old-data item type `T`.
///
/// `capacity` must be a power of two; this is enforced at construction.
/// The ring never mutates items in place after enqueue — each slot is
/// overwritten wholesale on the next enqueue to that index.
pub struct SpscRing<T> {
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    /// Consumer-owned: only the consumer thread stores to this.
    head: PaddedIndex,
    /// Producer-owned: only the producer thread stores to this.
    tail: PaddedIndex,
}

// SAFETY: `SpscRing<T>` is safe to share between exactly one producer
// thread and one consumer thread as long as `T: Send`. All mutation of
// the slot array happens either through the producer (enqueue) or the
// consumer (dequeue reads, never both on the same index at once — the
// head/tail handoff guarantees disjoint access).
unsafe impl<T: Send> Send for SpscRing<T> {}
unsafe impl<T: Send> Sync for SpscRing<T> {}

impl<T: Copy> SpscRing<T> {
    /// Construct an empty ring. `capacity` must be a power of two.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity.is_power_of_two(), "ring capacity must be a power of two, got {capacity}");
        let buffer = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            buffer,
            mask: capacity - 1,
            head: PaddedIndex::new(0),
            tail: PaddedIndex::new(0),
        }
    }

    /// Ring capacity (always a power of two).
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Side-effect-free hint: has the consumer drained everything the
    /// producer has published, as of this snapshot?
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        let head = self.head.value.load(Ordering::Relaxed);
        let tail = self.tail.value.load(Ordering::Acquire);
        head == tail
    }

    /// Side-effect-free hint: is the ring at capacity, as of this
    /// snapshot?
    #[inline(always)]
    pub fn is_full(&self) -> bool {
        let tail = self.tail.value.load(Ordering::Relaxed);
        let head = self.head.value.load(Ordering::Acquire);
        tail.wrapping_sub(head) >= self.capacity()
    }

    /// Producer-only. Attempt to enqueue `item`; returns `false` if the
    /// ring is full and the item was not stored.
    #[inline(always)]
    pub fn try_enqueue(&self, item: T) -> bool {
        let tail = self.tail.value.load(Ordering::Relaxed);
        let head = self.head.value.load(Ordering::Acquire);
        if tail.wrapping_sub(head) >= self.capacity() {
            return false;
        }

        let idx = tail & self.mask;
        // SAFETY: this index is only ever written by the single producer,
        // and is not yet visible to the consumer until the release store
        // to `tail` below.
        unsafe {
            (*self.buffer[idx].get()).write(item);
        }
        self.tail.value.store(tail.wrapping_add(1), Ordering::Release);
        true
    }

    /// Producer-only. Spin-retrying variant of `try_enqueue`, used by
    /// producers (the scheduler's output rings, puppets' done rings) that
    /// must not lose items and instead retry until space is observed.
    #[inline(always)]
    pub fn enqueue_spin(&self, item: T) {
        while !self.try_enqueue(item) {
            std::hint::spin_loop();
        }
    }

    /// Consumer-only. Look at the head item without removing it.
    #[inline(always)]
    pub fn try_peek(&self) -> Option<T> {
        let head = self.head.value.load(Ordering::Relaxed);
        let tail = self.tail.value.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let idx = head & self.mask;
        // SAFETY: `tail` was loaded with Acquire after observing
        // `head != tail`, so the producer's Release store that published
        // this slot happens-before this read.
        Some(unsafe { (*self.buffer[idx].get()).assume_init() })
    }

    /// Consumer-only. Remove and return the head item, if any.
    #[inline(always)]
    pub fn try_dequeue(&self) -> Option<T> {
        let item = self.try_peek()?;
        let head = self.head.value.load(Ordering::Relaxed);
        self.head.value.store(head.wrapping_add(1), Ordering::Release);
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_dequeue_preserves_order() {
        let ring: SpscRing<u64> = SpscRing::new(8);
        for i in 0..8u64 {
            assert!(ring.try_enqueue(i));
        }
        assert!(ring.is_full());
        assert!(!ring.try_enqueue(99));

        for i in 0..8u64 {
            assert_eq!(ring.try_dequeue(), Some(i));
        }
        assert!(ring.is_empty());
        assert_eq!(ring.try_dequeue(), None);
    }

    #[test]
    fn peek_does_not_consume() {
        let ring: SpscRing<u64> = SpscRing::new(4);
        ring.try_enqueue(42);
        assert_eq!(ring.try_peek(), Some(42));
        assert_eq!(ring.try_peek(), Some(42));
        assert_eq!(ring.try_dequeue(), Some(42));
        assert_eq!(ring.try_peek(), None);
    }

    #[test]
    fn wraps_around_correctly() {
        let ring: SpscRing<u64> = SpscRing::new(4);
        for i in 0..4u64 {
            assert!(ring.try_enqueue(i));
        }
        for i in 0..4u64 {
            assert_eq!(ring.try_dequeue(), Some(i));
        }
        // Having fully cycled once, the ring should behave identically.
        for i in 100..104u64 {
            assert!(ring.try_enqueue(i));
        }
        for i in 100..104u64 {
            assert_eq!(ring.try_dequeue(), Some(i));
        }
    }

    #[test]
    #[should_panic]
    fn rejects_non_power_of_two_capacity() {
        let _: SpscRing<u64> = SpscRing::new(100);
    }

    #[test]
    fn concurrent_producer_consumer_loses_nothing() {
        use std::sync::Arc;
        use std::thread;

        let ring: Arc<SpscRing<u64>> = Arc::new(SpscRing::new(64));
        const N: u64 = 200_000;

        let producer_ring = ring.clone();
        let producer = thread::spawn(move || {
            for i in 0..N {
                while !producer_ring.try_enqueue(i) {
                    std::hint::spin_loop();
                }
            }
        });

        let consumer_ring = ring.clone();
        let consumer = thread::spawn(move || {
            let mut expected = 0u64;
            while expected < N {
                if let Some(v) = consumer_ring.try_dequeue() {
                    assert_eq!(v, expected);
                    expected += 1;
                }
            }
        });

        producer.join().unwrap();
        consumer.join().unwrap();
    }
}
