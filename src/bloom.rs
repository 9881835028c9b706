//! Bloom summary of the active set's object universe.
//!
//! A fixed-size, partitioned bit array over object identifiers, used as a
//! cheap pre-filter ahead of the exact conflict scan. Four independent
//! multiply-shift hashes each own a disjoint partition of the bit array —
//! `total_bits / BLOOM_NUM_HASHES` bits per partition, required to divide
//! evenly and be 64-bit aligned — so that one hash's bit never collides
//! with another's regardless of input.
//!
//! The hash constants and the `(h >> 46)` shift are carried over from the
//! reference simulator's `bloom_hash`; only the destination-bit
//! computation was changed to add each hash's partition offset, matching
//! this spec's explicit partitioning requirement (see `DESIGN.md`).

use crate::constants::BLOOM_NUM_HASHES;

const HASH_CONSTANTS: [u64; BLOOM_NUM_HASHES] = [
    0x9e3779b97f4a7c15,
    0xc6a4a7935bd1e995,
    0x2545f4914f6cdd1d,
    0x21c64e4276c9f809,
];

/// A fixed-size Bloom filter summarizing a set of 63-bit object ids.
pub struct BloomFilter {
    bits: Box<[u64]>,
    partition_bits: usize,
}

impl BloomFilter {
    /// Construct a filter with `total_bits` total bits, divided evenly
    /// across [`BLOOM_NUM_HASHES`] partitions.
    ///
    /// # Panics
    ///
    /// Panics if `total_bits` doesn't divide evenly across the hash
    /// functions, or if each partition isn't 64-bit aligned.
    pub fn new(total_bits: usize) -> Self {
        assert_eq!(total_bits % BLOOM_NUM_HASHES, 0, "BLOOM_NUM_HASHES must evenly divide total_bits");
        let partition_bits = total_bits / BLOOM_NUM_HASHES;
        assert_eq!(partition_bits % 64, 0, "each Bloom partition must be divisible by 64 bits");

        Self { bits: vec![0u64; total_bits / 64].into_boxed_slice(), partition_bits }
    }

    #[inline]
    fn bit_index(&self, obj_id: u64, hash_idx: usize) -> usize {
        let h = obj_id.wrapping_mul(HASH_CONSTANTS[hash_idx]);
        let local = ((h >> 46) as usize) % self.partition_bits;
        hash_idx * self.partition_bits + local
    }

    /// Insert an object id. Idempotent: inserting the same id twice has
    /// the same effect as inserting it once.
    pub fn insert(&mut self, obj_id: u64) {
        for h in 0..BLOOM_NUM_HASHES {
            let bit = self.bit_index(obj_id, h);
            self.bits[bit / 64] |= 1u64 << (bit % 64);
        }
    }

    /// Query whether `obj_id` may be present. `false` is a definitive
    /// answer; `true` may be a false positive.
    pub fn query(&self, obj_id: u64) -> bool {
        (0..BLOOM_NUM_HASHES).all(|h| {
            let bit = self.bit_index(obj_id, h);
            self.bits[bit / 64] & (1u64 << (bit % 64)) != 0
        })
    }

    /// Zero every bit.
    pub fn reset(&mut self) {
        self.bits.iter_mut().for_each(|w| *w = 0);
    }
}
