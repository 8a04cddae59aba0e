//! Facade Tests
//!
//! The crate-level entry points run on the process-wide manager and
//! surface the stable [`strata_stm::Error`] type.

use crate::*;
use strata_stm::{atomically, run_in_transaction, Error};

#[test]
fn test_atomically_commits() {
    let cell = Cell::new(vec![1u8]);
    atomically(|txn| {
        cell.modify(txn, |v| {
            let mut next = v.clone();
            next.push(2);
            next
        })
    })
    .unwrap();
    let value = atomically(|txn| cell.get(txn)).unwrap();
    assert_eq!(value, vec![1, 2]);
}

#[test]
fn test_exhaustion_surfaces_as_public_error() {
    let mut attempts = 0;
    let err = run_in_transaction(2, |_txn| -> StmResult<()> {
        attempts += 1;
        Err(StmError::write_conflict("forced"))
    })
    .unwrap_err();
    assert_eq!(attempts, 3);
    assert_eq!(err, Error::RetriesExhausted { attempts: 3 });
    assert!(!err.is_retryable());
}

#[test]
fn test_nested_atomically_is_misuse() {
    let err = atomically(|_txn| atomically(|_inner| Ok(())).map_err(StmError::task))
        .unwrap_err();
    assert!(matches!(err, Error::Task(_)));
    assert!(err.to_string().contains("already active"));
}
