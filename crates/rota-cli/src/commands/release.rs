use chrono::Utc;
use clap::Subcommand;
use rota_core::validation::{parse_release_date, parse_start_time, validate_release_name};
use rota_core::{Config, Role};

use super::{find_engineer, find_release, open_service, print_releases, print_report, CmdResult, ReleaseView};

#[derive(Subcommand)]
pub enum ReleaseAction {
    /// Schedule a release and staff it
    Add {
        /// Release name (e.g. "18.9.1")
        name: String,
        /// Release date (m/d/yy or m/d/yyyy)
        date: String,
    },
    /// Rename or reschedule a release
    Edit {
        /// Current release name
        name: String,
        /// New name
        #[arg(long = "name", value_name = "NAME")]
        new_name: Option<String>,
        /// New date (m/d/yy or m/d/yyyy)
        #[arg(long)]
        date: Option<String>,
    },
    /// Show a release and who is on it
    Show {
        name: String,
    },
    /// List the most recent releases
    List {
        /// Number of releases to show (defaults to release.list_limit)
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Releases before the given one, newest first
    History {
        name: String,
        /// Number of releases to show (defaults to release.history_limit)
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Put an engineer on a release
    Assign {
        /// Release name
        name: String,
        /// Engineer id, Slack id or name
        engineer: String,
        /// primary (on call) or backup
        #[arg(long, default_value = "primary")]
        role: Role,
    },
    /// Take an engineer off a release
    Unassign {
        /// Release name
        name: String,
        /// Engineer id, Slack id or name
        engineer: String,
        /// primary (on call) or backup
        #[arg(long, default_value = "primary")]
        role: Role,
    },
}

pub fn run(action: ReleaseAction) -> CmdResult {
    let config = Config::load()?;
    let svc = open_service(&config)?;
    let db = svc.db();

    match action {
        ReleaseAction::Add { name, date } => {
            let name = validate_release_name(&name)?;
            let start = parse_start_time(&config.release.start_time)?;
            let date = parse_release_date(&date, start, Utc::now())?;
            let report = svc.add_release(&name, date)?;
            print_report(db, &report, &format!("release {name} created"))?;
        }
        ReleaseAction::Edit {
            name,
            new_name,
            date,
        } => {
            if new_name.is_none() && date.is_none() {
                return Err("nothing to change: pass --name and/or --date".into());
            }
            let release = find_release(db, &name)?;
            let new_name = new_name
                .map(|n| validate_release_name(&n))
                .transpose()?;
            let date = match date {
                Some(d) => {
                    let start = parse_start_time(&config.release.start_time)?;
                    Some(parse_release_date(&d, start, Utc::now())?)
                }
                None => None,
            };
            let report = svc.edit_release(&release.id, new_name.as_deref(), date)?;
            print_report(db, &report, &format!("release {name} updated"))?;
        }
        ReleaseAction::Show { name } => {
            let release = find_release(db, &name)?;
            super::print_json(&ReleaseView::load(db, &release)?)?;
        }
        ReleaseAction::List { limit } => {
            let limit = limit.unwrap_or(config.release.list_limit);
            print_releases(db, &db.list_releases(limit as usize)?)?;
        }
        ReleaseAction::History { name, limit } => {
            let release = find_release(db, &name)?;
            let limit = limit.unwrap_or(config.release.history_limit);
            print_releases(db, &db.release_history(&release, limit as usize)?)?;
        }
        ReleaseAction::Assign {
            name,
            engineer,
            role,
        } => {
            let release = find_release(db, &name)?;
            let engineer = find_engineer(db, &engineer)?;
            let report = svc.assign_one(&release.id, &engineer.id, role)?;
            print_report(
                db,
                &report,
                &format!("{} is now {role} on {}", engineer.name, release.name),
            )?;
        }
        ReleaseAction::Unassign {
            name,
            engineer,
            role,
        } => {
            let release = find_release(db, &name)?;
            let engineer = find_engineer(db, &engineer)?;
            let report = svc.remove_one(&release.id, &engineer.id, role)?;
            print_report(
                db,
                &report,
                &format!("{} is no longer {role} on {}", engineer.name, release.name),
            )?;
        }
    }
    Ok(())
}
