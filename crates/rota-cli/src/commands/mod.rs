pub mod auth;
pub mod config;
pub mod engineer;
pub mod pool;
pub mod release;

use std::error::Error;
use std::sync::Arc;

use chrono::Local;
use rota_core::{
    Config, CoreError, Engineer, EngineerPool, LogNotifier, Notifier, OperationReport, Release, RosterDb, RotaService,
    SlackNotifier,
};
use serde::Serialize;
use serde_json::json;

pub type CmdResult = Result<(), Box<dyn Error>>;

/// Open the roster and wire the configured notifier.
pub fn open_service(config: &Config) -> Result<RotaService, Box<dyn Error>> {
    let db = Arc::new(RosterDb::open()?);
    let notifier = build_notifier(config, &db);
    Ok(RotaService::new(db, notifier))
}

fn build_notifier(config: &Config, db: &Arc<RosterDb>) -> Arc<dyn Notifier> {
    if config.slack.enabled {
        match SlackNotifier::from_stored_token(&config.slack, db.clone()) {
            Ok(slack) => return Arc::new(slack),
            Err(e) => tracing::warn!(error = %e, "Slack is enabled but unavailable, only logging notifications"),
        }
    }
    Arc::new(LogNotifier)
}

pub fn find_release(db: &RosterDb, name: &str) -> Result<Release, CoreError> {
    db.get_release_by_name(name)?
        .ok_or_else(|| CoreError::release_not_found(name))
}

pub fn find_engineer(db: &RosterDb, key: &str) -> Result<Engineer, CoreError> {
    db.find_engineer(key)?
        .ok_or_else(|| CoreError::engineer_not_found(key))
}

#[derive(Serialize)]
pub struct MemberView {
    pub id: String,
    pub name: String,
    pub discipline: String,
    pub pod: String,
    pub slack_id: Option<String>,
}

impl From<&Engineer> for MemberView {
    fn from(engineer: &Engineer) -> Self {
        Self {
            id: engineer.id.clone(),
            name: engineer.name.clone(),
            discipline: engineer.discipline.label().to_string(),
            pod: engineer.pod.clone(),
            slack_id: engineer.slack_id.clone(),
        }
    }
}

/// A release with engineer ids resolved to names.
#[derive(Serialize)]
pub struct ReleaseView {
    pub id: String,
    pub name: String,
    pub date: String,
    pub primary: Vec<MemberView>,
    pub backup: Vec<MemberView>,
}

impl ReleaseView {
    pub fn load(db: &RosterDb, release: &Release) -> Result<Self, CoreError> {
        let resolve = |ids: &[String]| -> Result<Vec<MemberView>, CoreError> {
            let mut members = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(engineer) = db.get_engineer(id)? {
                    members.push(MemberView::from(&engineer));
                }
            }
            Ok(members)
        };
        Ok(Self {
            id: release.id.clone(),
            name: release.name.clone(),
            date: release
                .date
                .with_timezone(&Local)
                .format("%a %b %-d %Y, %H:%M")
                .to_string(),
            primary: resolve(&release.primary)?,
            backup: resolve(&release.backup)?,
        })
    }
}

pub fn print_json<T: Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_releases(db: &RosterDb, releases: &[Release]) -> CmdResult {
    let views = releases
        .iter()
        .map(|r| ReleaseView::load(db, r))
        .collect::<Result<Vec<_>, _>>()?;
    print_json(&views)
}

/// Print an operation's outcome: JSON on stdout, warnings and a one-line
/// summary on stderr.
pub fn print_report(db: &RosterDb, report: &OperationReport, summary: &str) -> CmdResult {
    let release = report
        .release
        .as_ref()
        .map(|r| ReleaseView::load(db, r))
        .transpose()?;
    let rebalanced = report
        .rebalanced
        .iter()
        .map(|r| ReleaseView::load(db, r))
        .collect::<Result<Vec<_>, _>>()?;

    print_json(&json!({
        "release": release,
        "rebalanced": rebalanced,
        "warnings": report.warnings,
    }))?;
    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    if report.rebalanced.is_empty() {
        eprintln!("{summary}");
    } else {
        eprintln!("{summary} ({} later release(s) rebalanced)", report.rebalanced.len());
    }
    Ok(())
}
