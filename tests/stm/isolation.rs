//! Snapshot Isolation Tests
//!
//! - Read-your-writes before commit
//! - Uncommitted writes are invisible to other transactions
//! - A snapshot never observes commits made after it began
//! - Interleaved writers become visible in commit order, all or nothing

use crate::*;
use std::sync::mpsc;

#[test]
fn test_read_your_writes_before_commit() {
    let manager = TransactionManager::new();
    let cell = Cell::new(1u32);

    let mut txn = manager.begin().unwrap();
    cell.set(&mut txn, 2).unwrap();
    assert_eq!(cell.get(&mut txn).unwrap(), 2);
    cell.set(&mut txn, 3).unwrap();
    assert_eq!(cell.get(&mut txn).unwrap(), 3);
    manager.commit(&mut txn).unwrap();

    assert_eq!(read_committed(&manager, &cell), 3);
}

#[test]
fn test_snapshot_ignores_later_commits() {
    let manager = TransactionManager::new();
    let cell = Cell::new(String::from("before"));

    let mut txn = manager.begin().unwrap();
    commit_elsewhere(&manager, &cell, String::from("after"));

    assert_eq!(cell.get(&mut txn).unwrap(), "before");
    assert!(txn.has_conflict());
    // Read-only transactions commit at their snapshot
    assert_eq!(manager.commit(&mut txn).unwrap(), txn.source_revision());

    assert_eq!(read_committed(&manager, &cell), "after");
}

#[test]
fn test_uncommitted_write_is_invisible() {
    let manager = TransactionManager::new();
    let cell = Cell::new(10i64);

    let mut writer = manager.begin().unwrap();
    cell.set(&mut writer, 20).unwrap();

    let seen = {
        let manager = manager.clone();
        let cell = cell.clone();
        thread::spawn(move || read_committed(&manager, &cell))
            .join()
            .unwrap()
    };
    assert_eq!(seen, 10);

    manager.commit(&mut writer).unwrap();
    assert_eq!(read_committed(&manager, &cell), 20);
}

#[test]
fn test_commit_revisions_increase() {
    let manager = TransactionManager::new();
    let cell = Cell::new(0u8);
    let mut last = manager.last_committed();
    for value in 1..=5 {
        let mut txn = manager.begin().unwrap();
        cell.set(&mut txn, value).unwrap();
        let revision = manager.commit(&mut txn).unwrap();
        assert!(revision > last);
        assert!(revision.is_committed());
        assert_eq!(txn.status(), TransactionStatus::Committed);
        last = revision;
    }
    assert_eq!(manager.last_committed(), last);
}

#[test]
fn test_multi_cell_commit_is_atomic() {
    let manager = TransactionManager::new();
    let from = Cell::new(1_000i64);
    let to = Cell::new(0i64);
    let config = contended();

    let writers: Vec<_> = (0..4)
        .map(|_| {
            let (manager, from, to, config) =
                (manager.clone(), from.clone(), to.clone(), config.clone());
            thread::spawn(move || {
                for _ in 0..100 {
                    manager
                        .run_with_config(&config, |txn| {
                            from.modify(txn, |b| b - 1)?;
                            to.modify(txn, |b| b + 1)?;
                            Ok(())
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..2)
        .map(|_| {
            let (manager, from, to) = (manager.clone(), from.clone(), to.clone());
            thread::spawn(move || {
                for _ in 0..200 {
                    let mut txn = manager.begin().unwrap();
                    let total = from.get(&mut txn).unwrap() + to.get(&mut txn).unwrap();
                    manager.commit(&mut txn).unwrap();
                    assert_eq!(total, 1_000, "a snapshot saw half of a transfer");
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }

    assert_eq!(read_committed(&manager, &from), 600);
    assert_eq!(read_committed(&manager, &to), 400);
}

/// Read both cells in one transaction on a fresh thread
fn read_pair_elsewhere(
    manager: &TransactionManager,
    first: &Cell<u32>,
    second: &Cell<u32>,
) -> (u32, u32) {
    let (manager, first, second) = (manager.clone(), first.clone(), second.clone());
    thread::spawn(move || {
        manager
            .transaction(|txn| Ok((first.get(txn)?, second.get(txn)?)))
            .unwrap()
    })
    .join()
    .unwrap()
}

#[test]
fn test_interleaved_blind_writers_commit_atomically() {
    let manager = TransactionManager::new();
    let first = Cell::new(0u32);
    let second = Cell::new(0u32);

    let mut slow = manager.begin().unwrap();
    first.set(&mut slow, 100).unwrap();
    second.set(&mut slow, 100).unwrap();

    // Lands in front of the slow node on `first` but commits before it
    commit_elsewhere(&manager, &first, 1);

    // A snapshot taken between the two commits stays open across the second
    let (seen_tx, seen_rx) = mpsc::channel();
    let (resume_tx, resume_rx) = mpsc::channel::<()>();
    let between = {
        let (manager, first, second) = (manager.clone(), first.clone(), second.clone());
        thread::spawn(move || {
            let mut txn = manager.begin().unwrap();
            let source = txn.source_revision();
            let pair = (first.get(&mut txn).unwrap(), second.get(&mut txn).unwrap());
            seen_tx.send((source, pair)).unwrap();
            resume_rx.recv().unwrap();
            let pair = (first.get(&mut txn).unwrap(), second.get(&mut txn).unwrap());
            seen_tx.send((source, pair)).unwrap();
            manager.commit(&mut txn).unwrap();
        })
    };
    let (between_source, before_slow) = seen_rx.recv().unwrap();
    assert_eq!(before_slow, (1, 0));

    let slow_revision = manager.commit(&mut slow).unwrap();
    assert!(slow_revision > between_source);

    // Both of the slow writes, never the fast value next to a slow one
    assert_eq!(read_pair_elsewhere(&manager, &first, &second), (100, 100));

    resume_tx.send(()).unwrap();
    let (_, after_slow) = seen_rx.recv().unwrap();
    assert_eq!(after_slow, (1, 0));
    between.join().unwrap();

    // Same answer once history has been folded
    assert_eq!(read_pair_elsewhere(&manager, &first, &second), (100, 100));
    assert_eq!(first.chain_len(), 1);
    assert_eq!(second.chain_len(), 1);
}

#[test]
fn test_interleaved_collection_writers_replay_in_commit_order() {
    let manager = TransactionManager::new();
    let log: CellSeq<&str> = CellSeq::new();

    let mut slow = manager.begin().unwrap();
    log.add(&mut slow, "slow").unwrap();
    {
        let (manager, log) = (manager.clone(), log.clone());
        thread::spawn(move || manager.transaction(|txn| log.add(txn, "fast")).unwrap())
            .join()
            .unwrap();
    }
    manager.commit(&mut slow).unwrap();

    let mut txn = manager.begin().unwrap();
    assert_eq!(log.get(&mut txn).unwrap(), vec!["fast", "slow"]);
}
