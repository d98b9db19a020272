//! Direct-mode concurrency: several threads share one store and rely on the
//! table's atomic primitives.

use revkv_common::{PutOutcome, Revision};
use revkv_engine::RevisionStore;
use revkv_table::{FileTable, MemoryTable, RevisionTable};
use std::sync::Barrier;
use std::thread;

fn racing_puts_have_one_winner<T: RevisionTable + Sync>(store: &RevisionStore<T>, rounds: u64) {
    for round in 0..rounds {
        let barrier = Barrier::new(2);
        let outcomes: Vec<PutOutcome> = thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|writer| {
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        store.put("race", round, format!("round{round}writer{writer}"))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners: Vec<Revision> = outcomes.iter().filter_map(PutOutcome::revision).collect();
        assert_eq!(winners, vec![round + 1], "round {round}: {outcomes:?}");
        let loser = outcomes.iter().find(|o| o.is_conflict()).unwrap();
        match loser {
            PutOutcome::Conflict {
                expected, actual, ..
            } => {
                assert_eq!(*expected, round);
                assert_eq!(*actual, Some(round + 1));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(store.get("race").into_entry().unwrap().revision, rounds);
}

/// Each writer retries on conflict until it has landed `per_writer` updates.
fn no_lost_updates<T: RevisionTable + Sync>(store: &RevisionStore<T>, writers: usize, per_writer: usize) {
    thread::scope(|s| {
        for _ in 0..writers {
            s.spawn(|| {
                let mut landed = 0;
                let mut expected = 0;
                while landed < per_writer {
                    match store.put("counter", expected, "tick") {
                        PutOutcome::Created { revision, .. } | PutOutcome::Updated { revision, .. } => {
                            landed += 1;
                            expected = revision;
                        }
                        PutOutcome::Conflict { actual, .. } => expected = actual.unwrap_or(0),
                        PutOutcome::Failure { error, .. } => panic!("storage failure: {error}"),
                    }
                }
            });
        }
    });
    let total = (writers * per_writer) as Revision;
    assert_eq!(store.get("counter").into_entry().unwrap().revision, total);
}

#[test]
fn memory_racing_puts() {
    racing_puts_have_one_winner(&RevisionStore::new(MemoryTable::new()), 200);
}

#[test]
fn file_racing_puts() {
    let tmp = tempfile::tempdir().unwrap();
    let store = RevisionStore::new(FileTable::open(tmp.path(), "kz", false).unwrap());
    racing_puts_have_one_winner(&store, 50);
}

#[test]
fn memory_no_lost_updates() {
    let store = RevisionStore::new(MemoryTable::new());
    no_lost_updates(&store, 4, 250);
    let revisions = store.get_revisions("counter");
    assert_eq!(revisions.entries().unwrap().len(), 1000);
}

#[test]
fn file_no_lost_updates() {
    let tmp = tempfile::tempdir().unwrap();
    let store = RevisionStore::with_auto_purge(FileTable::open(tmp.path(), "kz", false).unwrap(), true);
    no_lost_updates(&store, 3, 20);
    assert_eq!(store.get_revisions("counter").entries().unwrap().len(), 1);
}

fn purge_is_never_observed_half_done<T: RevisionTable + Sync>(store: &RevisionStore<T>, writes: u64) {
    store.set_auto_purge(true);
    assert!(store.put("k", 0, "seed").is_written());
    thread::scope(|s| {
        s.spawn(|| {
            for expected in 1..writes {
                assert!(store.put("k", expected, "x").is_written());
            }
        });
        s.spawn(|| {
            for _ in 0..writes {
                let outcome = store.get_revisions("k");
                assert_eq!(outcome.entries().map(<[_]>::len), Some(1));
            }
        });
    });
}

fn delete_racing_put_ends_in_one_state<T: RevisionTable + Sync>(store: &RevisionStore<T>) {
    assert!(store.put("k", 0, "a").is_written());
    let (put, deleted) = thread::scope(|s| {
        let put = s.spawn(|| store.put("k", 1, "b"));
        let delete = s.spawn(|| store.delete("k"));
        (put.join().unwrap(), delete.join().unwrap())
    });

    let chain = store.get_revisions("k");
    match (put.is_written(), deleted.body()) {
        // put first, then delete removed the whole two-entry chain
        (true, Some(body)) => {
            assert_eq!(body, b"b");
            assert!(chain.is_not_found());
        }
        // delete first, put found no chain
        (false, Some(body)) => {
            assert_eq!(body, b"a");
            assert!(matches!(put, PutOutcome::Conflict { actual: None, .. }));
            assert!(chain.is_not_found());
        }
        other => panic!("impossible interleaving: {other:?}"),
    }
}

#[test]
fn memory_purge_is_atomic() {
    purge_is_never_observed_half_done(&RevisionStore::new(MemoryTable::new()), 500);
}

#[test]
fn file_purge_is_atomic() {
    let tmp = tempfile::tempdir().unwrap();
    let store = RevisionStore::new(FileTable::open(tmp.path(), "kz", false).unwrap());
    purge_is_never_observed_half_done(&store, 60);
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
}

#[test]
fn memory_delete_racing_put() {
    for _ in 0..200 {
        delete_racing_put_ends_in_one_state(&RevisionStore::new(MemoryTable::new()));
    }
}

#[test]
fn file_delete_racing_put() {
    for _ in 0..40 {
        let tmp = tempfile::tempdir().unwrap();
        let store = RevisionStore::new(FileTable::open(tmp.path(), "kz", false).unwrap());
        delete_racing_put_ends_in_one_state(&store);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
