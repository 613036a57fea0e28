//! Weight updates racing on the same engineer must never lose an increment.

use std::sync::Arc;
use std::thread;

use rota_core::{Discipline, EngineerPool, NewEngineer, RosterDb};

const THREADS: usize = 8;
const INCREMENTS: usize = 25;

/// Test: one shared handle, many threads.
#[test]
fn test_shared_handle_serializes_increments() {
    let db = Arc::new(RosterDb::open_memory().unwrap());
    let a = db
        .create_engineer(&NewEngineer::new("A", Discipline::FrontEnd, "x"))
        .unwrap();

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let db = db.clone();
            let id = a.id.clone();
            thread::spawn(move || {
                for _ in 0..INCREMENTS {
                    db.adjust_weight(&id, 1).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        db.get_engineer(&a.id).unwrap().unwrap().weight as usize,
        THREADS * INCREMENTS
    );
}

/// Test: separate connections to one database file, as separate CLI
/// invocations would have.
#[test]
fn test_separate_connections_serialize_increments() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rota.db");

    let setup = RosterDb::open_at(&path).unwrap();
    let a = setup
        .create_engineer(&NewEngineer::new("A", Discipline::BackEnd, "x"))
        .unwrap();

    let connections: Vec<RosterDb> = (0..THREADS)
        .map(|_| RosterDb::open_at(&path).unwrap())
        .collect();
    let handles: Vec<_> = connections
        .into_iter()
        .enumerate()
        .map(|(i, db)| {
            let id = a.id.clone();
            thread::spawn(move || {
                // Interleave increments and decrements; the net is +1 per pair.
                for n in 0..INCREMENTS {
                    db.adjust_weight(&id, 2).unwrap();
                    if (n + i) % 2 == 0 {
                        db.adjust_weight(&id, -1).unwrap();
                    } else {
                        db.adjust_weight(&id, 1).unwrap();
                        db.adjust_weight(&id, -2).unwrap();
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        setup.get_engineer(&a.id).unwrap().unwrap().weight as usize,
        THREADS * INCREMENTS
    );
}
