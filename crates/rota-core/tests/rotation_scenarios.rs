//! End-to-end staffing scenarios against an in-memory roster.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rota_core::error::Result;
use rota_core::{
    Discipline, Engineer, EngineerPool, LogNotifier, NewEngineer, Release, ReleaseStore, Role,
    RosterDb, RotaService, RotationEngine, ScheduleRebalancer,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn engineer(db: &RosterDb, name: &str, discipline: Discipline, pod: &str) -> Engineer {
    db.create_engineer(&NewEngineer::new(name, discipline, pod))
        .unwrap()
}

fn weight(db: &RosterDb, id: &str) -> u32 {
    db.get_engineer(id).unwrap().unwrap().weight
}

/// Every engineer's weight must equal the roles they hold across all releases.
fn assert_ledger(db: &RosterDb) {
    let releases = db.list_releases(1000).unwrap();
    for engineer in db.list_engineers().unwrap() {
        let held = releases
            .iter()
            .filter(|r| r.role_of(&engineer.id).is_some())
            .count() as u32;
        assert_eq!(engineer.weight, held, "ledger drift for {}", engineer.name);
    }
}

/// Log shared by the recording wrappers below.
type EventLog = Arc<Mutex<Vec<String>>>;

struct RecordingPool {
    inner: Arc<RosterDb>,
    log: EventLog,
}

impl EngineerPool for RecordingPool {
    fn list_by_discipline(&self, discipline: Discipline) -> Result<Vec<Engineer>> {
        self.log.lock().unwrap().push(format!("select {discipline}"));
        self.inner.list_by_discipline(discipline)
    }

    fn adjust_weight(&self, engineer_id: &str, delta: i64) -> Result<Engineer> {
        self.inner.adjust_weight(engineer_id, delta)
    }

    fn get_engineer(&self, engineer_id: &str) -> Result<Option<Engineer>> {
        self.inner.get_engineer(engineer_id)
    }
}

struct RecordingStore {
    inner: Arc<RosterDb>,
    log: EventLog,
}

impl ReleaseStore for RecordingStore {
    fn get_release(&self, release_id: &str) -> Result<Option<Release>> {
        self.inner.get_release(release_id)
    }

    fn list_releases_after(&self, date: DateTime<Utc>) -> Result<Vec<Release>> {
        self.inner.list_releases_after(date)
    }

    fn save_assignment(&self, release_id: &str, primary: &[String], backup: &[String]) -> Result<Release> {
        let saved = self.inner.save_assignment(release_id, primary, backup)?;
        self.log.lock().unwrap().push(format!("save {}", saved.name));
        Ok(saved)
    }
}

// ============================================================================
// Scenarios
// ============================================================================

/// Test: same-pod front end pair leaves the backup empty.
#[test]
fn test_scenario_same_pod_has_no_backup() {
    let db = Arc::new(RosterDb::open_memory().unwrap());
    let a = engineer(&db, "A", Discipline::FrontEnd, "X");
    let b = engineer(&db, "B", Discipline::FrontEnd, "X");
    let c = engineer(&db, "C", Discipline::BackEnd, "Y");
    let release = db
        .create_release(&Release::new("18.9.1", Utc::now() + Duration::days(1)))
        .unwrap();

    let assignment = RotationEngine::new(db.clone())
        .assign_engineers(&release)
        .unwrap();

    assert_eq!(assignment.primary, vec![a.id.clone(), c.id.clone()]);
    assert!(assignment.backup.is_empty());
    assert!(assignment.skipped.is_empty());
    assert_eq!(weight(&db, &a.id), 1);
    assert_eq!(weight(&db, &b.id), 0);
    assert_eq!(weight(&db, &c.id), 1);
}

/// Test: lighter engineer is primary, other pod is backup.
#[test]
fn test_scenario_weight_and_pod_pick_pair() {
    let db = Arc::new(RosterDb::open_memory().unwrap());
    let a = engineer(&db, "A", Discipline::FrontEnd, "X");
    let b = engineer(&db, "B", Discipline::FrontEnd, "Y");
    db.adjust_weight(&b.id, 1).unwrap();
    let release = db
        .create_release(&Release::new("18.9.1", Utc::now() + Duration::days(1)))
        .unwrap();

    let assignment = RotationEngine::new(db.clone())
        .assign_engineers(&release)
        .unwrap();

    assert_eq!(assignment.primary, vec![a.id.clone()]);
    assert_eq!(assignment.backup, vec![b.id.clone()]);
    assert_eq!(weight(&db, &a.id), 1);
    assert_eq!(weight(&db, &b.id), 2);
}

/// Test: removing an assignee decrements them and rebalances later releases.
#[test]
fn test_scenario_manual_removal_rebalances_later_releases() {
    let db = Arc::new(RosterDb::open_memory().unwrap());
    let svc = RotaService::new(db.clone(), Arc::new(LogNotifier));
    let a = engineer(&db, "A", Discipline::FrontEnd, "x");
    let b = engineer(&db, "B", Discipline::FrontEnd, "y");
    let now = Utc::now();

    let r1 = svc
        .add_release("18.9.1", now + Duration::days(1))
        .unwrap()
        .release
        .unwrap();
    let r2 = svc
        .add_release("18.9.2", now + Duration::days(2))
        .unwrap()
        .release
        .unwrap();
    assert_eq!(r1.primary, vec![a.id.clone()]);
    assert_eq!(r2.primary, vec![a.id.clone()]);
    assert_eq!(weight(&db, &a.id), 2);

    let report = svc.remove_one(&r1.id, &a.id, Role::Primary).unwrap();

    assert!(report.release.unwrap().primary.is_empty());
    assert_eq!(report.rebalanced.len(), 1);
    assert_eq!(report.rebalanced[0].id, r2.id);
    assert_eq!(report.rebalanced[0].primary, vec![a.id.clone()]);
    assert_eq!(report.rebalanced[0].backup, vec![b.id.clone()]);
    assert_eq!(weight(&db, &a.id), 1);
    assert_ledger(&db);
}

/// Test: each release is saved before the next one is computed.
#[test]
fn test_rebalance_is_chronological() {
    let db = Arc::new(RosterDb::open_memory().unwrap());
    let log: EventLog = Arc::default();
    let pool = Arc::new(RecordingPool {
        inner: db.clone(),
        log: log.clone(),
    });
    let store = Arc::new(RecordingStore {
        inner: db.clone(),
        log: log.clone(),
    });
    let rebalancer = ScheduleRebalancer::new(RotationEngine::new(pool), store);

    let a = engineer(&db, "A", Discipline::FrontEnd, "x");
    let b = engineer(&db, "B", Discipline::FrontEnd, "y");
    let c = engineer(&db, "C", Discipline::FrontEnd, "x");
    let now = Utc::now();
    // Created out of order on purpose.
    db.create_release(&Release::new("18.9.2", now + Duration::days(14)))
        .unwrap();
    db.create_release(&Release::new("18.9.1", now + Duration::days(7)))
        .unwrap();

    let saved = rebalancer.update_future_releases(&Release::new("pivot", now)).unwrap();

    assert_eq!(
        saved.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
        vec!["18.9.1", "18.9.2"]
    );
    assert_eq!(saved[0].primary, vec![a.id.clone()]);
    assert_eq!(saved[0].backup, vec![b.id.clone()]);
    assert_eq!(saved[1].primary, vec![c.id.clone()]);
    assert_eq!(saved[1].backup, vec![b.id.clone()]);

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "select front_end",
            "select back_end",
            "save 18.9.1",
            "select front_end",
            "select back_end",
            "save 18.9.2",
        ]
    );
    assert_ledger(&db);
}

/// Test: adding and removing engineers keeps the ledger exact.
#[test]
fn test_pool_changes_keep_ledger_exact() {
    let db = Arc::new(RosterDb::open_memory().unwrap());
    let svc = RotaService::new(db.clone(), Arc::new(LogNotifier));
    let now = Utc::now();
    engineer(&db, "A", Discipline::BackEnd, "x");
    engineer(&db, "B", Discipline::FrontEnd, "x");
    for (i, name) in ["18.9.1", "18.9.2", "18.10.1"].iter().enumerate() {
        svc.add_release(name, now + Duration::days(7 * (i as i64 + 1)))
            .unwrap();
    }
    assert_ledger(&db);

    let (c, report) = svc
        .add_engineer(&NewEngineer::new("C", Discipline::BackEnd, "y"))
        .unwrap();
    assert_eq!(report.rebalanced.len(), 3);
    assert!(c.weight > 0);
    assert_ledger(&db);

    svc.remove_engineer(&c.id).unwrap();
    assert_ledger(&db);

    // Repeated rebalances do not inflate anything.
    for _ in 0..3 {
        svc.rebalancer().rebalance_after(now).unwrap();
    }
    assert_ledger(&db);
}

/// Test: past releases are never touched by a rebalance.
#[test]
fn test_past_releases_keep_their_staffing() {
    let db = Arc::new(RosterDb::open_memory().unwrap());
    let svc = RotaService::new(db.clone(), Arc::new(LogNotifier));
    let a = engineer(&db, "A", Discipline::FrontEnd, "x");
    let past = db
        .create_release(&Release::new("18.8.1", Utc::now() - Duration::days(7)))
        .unwrap();
    db.save_assignment(&past.id, &[a.id.clone()], &[]).unwrap();
    db.adjust_weight(&a.id, 1).unwrap();

    let (_, report) = svc
        .add_engineer(&NewEngineer::new("B", Discipline::FrontEnd, "y"))
        .unwrap();

    assert!(report.rebalanced.is_empty());
    assert_eq!(db.get_release(&past.id).unwrap().unwrap().primary, vec![a.id]);
    assert_ledger(&db);
}
