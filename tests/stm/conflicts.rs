//! Conflict Detection Tests
//!
//! - Commit-time validation of the read set
//! - Fail-fast writes after a stale read
//! - Blind writes never conflict

use crate::*;

/// A reads v, C commits v, A writes v: A's commit must fail
#[test]
fn test_scalar_conflict_scenario() {
    let manager = TransactionManager::new();
    let v = Cell::new(5);

    let mut a = manager.begin().unwrap();
    assert_eq!(v.get(&mut a).unwrap(), 5);

    commit_elsewhere(&manager, &v, 7);

    v.set(&mut a, 10).unwrap();
    let err = manager.commit(&mut a).unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(a.status(), TransactionStatus::Aborted);

    // No partial state: the failed write is gone
    assert_eq!(read_committed(&manager, &v), 7);
    assert_eq!(v.chain_len(), 1);
}

#[test]
fn test_conflict_on_other_cell_write() {
    let manager = TransactionManager::new();
    let guard = Cell::new(false);
    let target = Cell::new(0);

    let mut a = manager.begin().unwrap();
    assert!(!guard.get(&mut a).unwrap());
    commit_elsewhere(&manager, &guard, true);
    target.set(&mut a, 1).unwrap();

    assert!(matches!(
        manager.commit(&mut a),
        Err(StmError::WriteConflict { .. })
    ));
    assert_eq!(read_committed(&manager, &target), 0);
}

#[test]
fn test_stale_read_fails_next_write_immediately() {
    let manager = TransactionManager::new();
    let v = Cell::new(1);

    let mut a = manager.begin().unwrap();
    commit_elsewhere(&manager, &v, 2);

    // The read passes over the newer commit and raises the flag
    assert_eq!(v.get(&mut a).unwrap(), 1);
    assert!(a.has_conflict());
    assert!(v.set(&mut a, 3).unwrap_err().is_conflict());
    assert!(a.is_active());
    manager.abort(&mut a).unwrap();

    assert_eq!(manager.metrics().total_conflicts, 1);
}

#[test]
fn test_blind_writes_do_not_conflict() {
    let manager = TransactionManager::new();
    let v = Cell::new(0);

    let mut a = manager.begin().unwrap();
    v.set(&mut a, 1).unwrap();
    commit_elsewhere(&manager, &v, 2);
    manager.commit(&mut a).unwrap();

    // A committed after B, so A's value is current even though B's node leads
    assert_eq!(read_committed(&manager, &v), 1);
}

#[test]
fn test_read_only_transaction_never_conflicts() {
    let manager = TransactionManager::new();
    let v = Cell::new(0);

    let mut a = manager.begin().unwrap();
    assert_eq!(v.get(&mut a).unwrap(), 0);
    commit_elsewhere(&manager, &v, 1);
    assert_eq!(v.get(&mut a).unwrap(), 0);
    assert!(manager.commit(&mut a).is_ok());
}

#[test]
fn test_own_write_read_is_not_validated() {
    let manager = TransactionManager::new();
    let v = Cell::new(0);
    let other = Cell::new(0);

    let mut a = manager.begin().unwrap();
    other.set(&mut a, 1).unwrap();
    v.set(&mut a, 5).unwrap();
    assert_eq!(v.get(&mut a).unwrap(), 5);
    assert_eq!(a.read_count(), 0);
    manager.commit(&mut a).unwrap();
}
