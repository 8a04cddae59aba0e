//! Transaction Misuse Tests
//!
//! - One active transaction per thread
//! - Only the owning thread may use, commit or abort a transaction
//! - Finished transactions reject further use
//! - Dropping an active transaction aborts it

use crate::*;

#[test]
fn test_nested_begin_is_rejected() {
    let manager = TransactionManager::new();
    let mut outer = manager.begin().unwrap();
    let err = manager.begin().unwrap_err();
    assert_eq!(err, StmError::AlreadyActive);
    assert!(err.is_misuse());

    manager.commit(&mut outer).unwrap();
    // The slot is free again once the outer transaction finishes
    let mut next = manager.begin().unwrap();
    manager.commit(&mut next).unwrap();
}

#[test]
fn test_independent_managers_track_threads_separately() {
    let first = TransactionManager::new();
    let second = TransactionManager::new();
    let mut a = first.begin().unwrap();
    let mut b = second.begin().unwrap();
    first.commit(&mut a).unwrap();
    second.commit(&mut b).unwrap();
}

#[test]
fn test_commit_from_other_thread_is_rejected() {
    let manager = TransactionManager::new();
    let cell = Cell::new(0);
    let mut txn = manager.begin().unwrap();
    cell.set(&mut txn, 1).unwrap();

    let (result, mut txn) = {
        let manager = manager.clone();
        thread::spawn(move || {
            let result = manager.commit(&mut txn);
            (result, txn)
        })
        .join()
        .unwrap()
    };
    assert_eq!(result.unwrap_err(), StmError::NotOwner { txn_id: txn.id() });
    assert!(txn.is_active());

    manager.commit(&mut txn).unwrap();
    assert_eq!(read_committed(&manager, &cell), 1);
}

#[test]
fn test_cell_use_from_other_thread_is_rejected() {
    let manager = TransactionManager::new();
    let cell = Cell::new(0);
    let mut txn = manager.begin().unwrap();

    let (get, set, mut txn) = {
        let cell = cell.clone();
        thread::spawn(move || {
            let get = cell.get(&mut txn);
            let set = cell.set(&mut txn, 5);
            (get, set, txn)
        })
        .join()
        .unwrap()
    };
    assert!(matches!(get, Err(StmError::NotOwner { .. })));
    assert!(matches!(set, Err(StmError::NotOwner { .. })));
    assert_eq!(txn.write_count(), 0);
    manager.abort(&mut txn).unwrap();
}

#[test]
fn test_finished_transaction_rejects_use() {
    let manager = TransactionManager::new();
    let cell = Cell::new(0);
    let tags: CellSet<u8> = CellSet::new();

    let mut txn = manager.begin().unwrap();
    manager.abort(&mut txn).unwrap();
    assert_eq!(txn.status(), TransactionStatus::Aborted);

    assert!(matches!(cell.get(&mut txn), Err(StmError::NotActive { .. })));
    assert!(matches!(tags.add(&mut txn, 1), Err(StmError::NotActive { .. })));
    assert!(matches!(manager.commit(&mut txn), Err(StmError::NotActive { .. })));
    assert!(matches!(manager.abort(&mut txn), Err(StmError::NotActive { .. })));
}

#[test]
fn test_dropped_transaction_is_aborted() {
    let manager = TransactionManager::new();
    let cell = Cell::new(7);
    {
        let mut txn = manager.begin().unwrap();
        cell.set(&mut txn, 8).unwrap();
    }
    assert_eq!(cell.chain_len(), 1);
    assert_eq!(read_committed(&manager, &cell), 7);
    assert_eq!(manager.metrics().total_aborted, 1);
    assert_eq!(manager.metrics().active_count, 0);
}

#[test]
fn test_transaction_dropped_on_other_thread_releases_owner() {
    let manager = TransactionManager::new();
    let txn = manager.begin().unwrap();
    thread::spawn(move || drop(txn)).join().unwrap();

    // The owning thread may begin again
    let mut next = manager.begin().unwrap();
    manager.commit(&mut next).unwrap();
    assert_eq!(manager.oldest_source_in_use(), None);
}
