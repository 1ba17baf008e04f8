//! Many workers, one shared directory.

use std::sync::{Arc, Barrier};
use std::thread;

use baton_core::app::BoardBuilder;
use baton_core::domain::{ClaimError, OwnerId, TaskKey};
use baton_core::impls::FileClaimStore;
use baton_core::ports::{AgentIndex, ClaimStore, DeleteOutcome, FixedClock};
use chrono::{Duration, TimeZone, Utc};

const WORKERS: usize = 16;

#[test]
fn exactly_one_worker_wins_a_contended_task() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path().to_path_buf();
    let barrier = Arc::new(Barrier::new(WORKERS));

    // each worker opens its own handle, like separate processes would
    let handles: Vec<_> = (0..WORKERS)
        .map(|i| {
            let root = root.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let board = BoardBuilder::new()
                    .store(FileClaimStore::open(&root).unwrap())
                    .build()
                    .unwrap();
                let owner = OwnerId::new(format!("agent-{i}")).unwrap();
                barrier.wait();
                board.claim(&TaskKey::new("build-1").unwrap(), &owner)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, ClaimError::AlreadyClaimed { .. }))
    );

    let store = FileClaimStore::open(&root).unwrap();
    let stored = store.get(&TaskKey::new("build-1").unwrap()).unwrap().unwrap();
    assert_eq!(stored.owner_id, winners[0].owner_id);
    assert_eq!(store.owners().unwrap(), vec![stored.owner_id.clone()]);
}

#[test]
fn concurrent_release_and_sweep_remove_the_lease_once() {
    let temp = tempfile::tempdir().expect("tempdir");
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
    ));
    let store = Arc::new(FileClaimStore::open(temp.path()).unwrap());
    let board = Arc::new(
        BoardBuilder::new()
            .shared_store(store.clone())
            .shared_clock(clock.clone())
            .build()
            .unwrap(),
    );
    let owner = OwnerId::new("agent-A").unwrap();
    let task = TaskKey::new("lint-1").unwrap();
    board.claim_with_ttl(&task, &owner, 60).unwrap();
    clock.advance(Duration::seconds(61));

    let releaser = {
        let board = Arc::clone(&board);
        let (task, owner) = (task.clone(), owner.clone());
        thread::spawn(move || board.release(&task, &owner))
    };
    let swept = board.sweep().unwrap().count();
    let released = releaser.join().unwrap();

    // either path may win, but the record goes away exactly once
    match released {
        Ok(_) => assert_eq!(swept, 0),
        Err(ClaimError::NotFound(_)) => assert_eq!(swept, 1),
        Err(other) => panic!("unexpected release error: {other}"),
    }
    assert_eq!(store.get(&task).unwrap(), None);
    assert!(store.entries(&owner).unwrap().is_empty());
}

#[test]
fn claim_list_release_over_the_file_store() {
    let temp = tempfile::tempdir().expect("tempdir");
    let board = BoardBuilder::new()
        .store(FileClaimStore::open(temp.path()).unwrap())
        .build()
        .unwrap();
    let a = OwnerId::new("agent-A").unwrap();
    let tasks: Vec<TaskKey> = ["build/linux", "build/mac", "docs 1"]
        .into_iter()
        .map(|t| TaskKey::new(t).unwrap())
        .collect();

    for task in &tasks {
        board.claim(task, &a).unwrap();
    }
    let listed: Vec<TaskKey> = board
        .list_tasks(&a)
        .unwrap()
        .to_vec()
        .unwrap()
        .into_iter()
        .map(|row| row.task_id)
        .collect();
    assert_eq!(listed, tasks);

    board.release(&tasks[1], &a).unwrap();
    assert_eq!(board.list_tasks(&a).unwrap().len(), 2);
    assert_eq!(board.status().unwrap().live_leases, 2);
}

#[test]
fn reclaimed_task_stays_listed_when_the_sweeper_prunes_late() {
    let temp = tempfile::tempdir().expect("tempdir");
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
    ));
    let store = Arc::new(FileClaimStore::open(temp.path()).unwrap());
    let board = BoardBuilder::new()
        .shared_store(store.clone())
        .shared_clock(clock.clone())
        .build()
        .unwrap();
    let owner = OwnerId::new("agent-A").unwrap();
    let task = TaskKey::new("lint-1").unwrap();
    board.claim_with_ttl(&task, &owner, 60).unwrap();
    clock.advance(Duration::seconds(61));

    // a sweeper removes the stale record, then stalls before pruning
    let outcome = store.delete_if(&task, &|_| true).unwrap();
    assert!(matches!(outcome, DeleteOutcome::Deleted(_)));
    board.claim(&task, &owner).unwrap();
    assert!(store.prune(&owner, &task).unwrap());

    assert_eq!(store.entries(&owner).unwrap(), vec![task.clone()]);
    assert_eq!(store.owners().unwrap(), vec![owner.clone()]);
    assert_eq!(board.status().unwrap().owners, 1);
}
