//! Workload CSV parsing.
//!
//! One line per transaction: `aux,oid0,rw0,oid1,rw1,...`. `aux` is an
//! unsigned decimal; each `(oid, rw)` pair names an object id and a
//! `0`/`1` read/write flag. Lines shorter than two characters are
//! ignored. A transaction's id is its zero-based line index among
//! non-ignored lines. This is the CSV workload parser referenced as an
//! external collaborator in the core's scope — it exists only to build
//! the `Txn` values the core operates on.

use std::io::BufRead;

use crate::constants::MAX_TXN_OBJS;
use crate::error::{PmError, Result};
use crate::txn::{ObjRef, Txn};

/// Parse a workload from a reader in the CSV format described above.
pub fn parse_workload(reader: impl BufRead) -> Result<Vec<Txn>> {
    let mut txns = Vec::new();
    let mut next_id: u64 = 0;

    for line in reader.lines() {
        let line = line?;
        if line.len() < 2 {
            continue;
        }
        let txn = parse_line(next_id, &line)?;
        txns.push(txn);
        next_id += 1;
    }

    Ok(txns)
}

fn parse_line(id: u64, line: &str) -> Result<Txn> {
    let mut fields = line.split(',');

    let aux: u64 = fields
        .next()
        .ok_or_else(|| PmError::workload(format!("line {id}: missing aux field")))?
        .trim()
        .parse()
        .map_err(|_| PmError::workload(format!("line {id}: aux field is not an unsigned decimal")))?;

    let rest: Vec<&str> = fields.collect();
    if rest.len() % 2 != 0 {
        return Err(PmError::workload(format!("line {id}: (oid, rw) pairs must come in twos")));
    }
    let num_pairs = rest.len() / 2;
    if num_pairs > MAX_TXN_OBJS {
        return Err(PmError::workload(format!(
            "line {id}: {num_pairs} object pairs exceeds the {MAX_TXN_OBJS}-object limit"
        )));
    }

    let mut objs = Vec::with_capacity(num_pairs);
    for pair in rest.chunks_exact(2) {
        let oid: u64 = pair[0]
            .trim()
            .parse()
            .map_err(|_| PmError::workload(format!("line {id}: object id is not an unsigned decimal")))?;
        let rw: u8 = pair[1]
            .trim()
            .parse()
            .map_err(|_| PmError::workload(format!("line {id}: rw flag is not 0 or 1")))?;
        if rw > 1 {
            return Err(PmError::workload(format!("line {id}: rw flag must be 0 or 1, got {rw}")));
        }
        objs.push(ObjRef::new(oid, rw == 1));
    }

    Ok(Txn::new(id, aux, &objs))
}
