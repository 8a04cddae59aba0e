//! Revision History Tests
//!
//! - Sequential commits keep chains short
//! - A long-lived snapshot pins history until it finishes
//! - Aborted revisions are unlinked and reclaimed

use crate::*;

#[test]
fn test_sequential_commits_keep_history_bounded() {
    let manager = TransactionManager::new();
    let cell = Cell::new(0u64);
    for _ in 0..100 {
        manager
            .transaction(|txn| cell.modify(txn, |n| n + 1))
            .unwrap();
        assert!(cell.chain_len() <= 2);
    }
    assert_eq!(read_committed(&manager, &cell), 100);
}

#[test]
fn test_open_snapshot_pins_history() {
    let manager = TransactionManager::new();
    let cell = Cell::new(0u64);

    let mut pinned = manager.begin().unwrap();
    assert_eq!(cell.get(&mut pinned).unwrap(), 0);

    {
        let (manager, cell) = (manager.clone(), cell.clone());
        thread::spawn(move || {
            for n in 1..=5 {
                manager.transaction(|txn| cell.set(txn, n)).unwrap();
            }
        })
        .join()
        .unwrap();
    }

    // Every revision newer than the pinned snapshot is still linked
    assert_eq!(cell.chain_len(), 6);
    assert_eq!(cell.get(&mut pinned).unwrap(), 0);
    assert_eq!(manager.oldest_source_in_use(), Some(pinned.source_revision()));

    manager.commit(&mut pinned).unwrap();
    assert_eq!(cell.chain_len(), 1);
    assert_eq!(read_committed(&manager, &cell), 5);
}

#[test]
fn test_aborted_revisions_are_reclaimed() {
    let manager = TransactionManager::new();
    let cell = Cell::new(1);
    for _ in 0..10 {
        let mut txn = manager.begin().unwrap();
        cell.set(&mut txn, 2).unwrap();
        manager.abort(&mut txn).unwrap();
    }
    assert_eq!(cell.chain_len(), 1);

    let metrics = manager.metrics();
    assert_eq!(metrics.total_aborted, 10);
    assert_eq!(metrics.pending_cleanup, 0);
    assert_eq!(metrics.reclaimed_transactions, 10);
}

#[test]
fn test_explicit_collect_reports_nothing_when_idle() {
    let manager = TransactionManager::new();
    let report = manager.collect().unwrap();
    assert_eq!(report.transactions, 0);
    assert_eq!(report.revisions, 0);
}

#[test]
fn test_collection_history_folds_after_pin_released() {
    let manager = TransactionManager::new();
    let tags: CellSet<u32> = CellSet::new();

    let mut pinned = manager.begin().unwrap();
    assert!(tags.is_empty(&mut pinned).unwrap());
    {
        let (manager, tags) = (manager.clone(), tags.clone());
        thread::spawn(move || {
            for n in 0..5 {
                manager.transaction(|txn| tags.add(txn, n)).unwrap();
            }
        })
        .join()
        .unwrap();
    }
    assert_eq!(tags.chain_len(), 6);
    manager.commit(&mut pinned).unwrap();
    assert_eq!(tags.chain_len(), 1);

    let mut txn = manager.begin().unwrap();
    assert_eq!(tags.len(&mut txn).unwrap(), 5);
}
