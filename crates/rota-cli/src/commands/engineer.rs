use clap::Subcommand;
use rota_core::{Config, Discipline, NewEngineer};

use super::{find_engineer, open_service, print_json, print_report, CmdResult, MemberView};

#[derive(Subcommand)]
pub enum EngineerAction {
    /// Add an engineer to the pool
    Add {
        /// Display name
        name: String,
        /// front_end or back_end
        #[arg(long)]
        discipline: Discipline,
        /// Sub-team the engineer belongs to
        #[arg(long)]
        pod: String,
        /// Slack user id used for reminders
        #[arg(long)]
        slack_id: Option<String>,
    },
    /// Remove an engineer from the pool
    Remove {
        /// Engineer id, Slack id or name
        engineer: String,
    },
    /// List the pool
    List,
}

pub fn run(action: EngineerAction) -> CmdResult {
    let config = Config::load()?;
    let svc = open_service(&config)?;
    let db = svc.db();

    match action {
        EngineerAction::Add {
            name,
            discipline,
            pod,
            slack_id,
        } => {
            if name.trim().is_empty() || pod.trim().is_empty() {
                return Err("name and pod must not be empty".into());
            }
            let mut new = NewEngineer::new(name, discipline, pod);
            if let Some(slack_id) = slack_id {
                new = new.with_slack_id(slack_id);
            }
            let (engineer, report) = svc.add_engineer(&new)?;
            print_report(
                db,
                &report,
                &format!("{} added to the {} pool", engineer.name, engineer.discipline.label()),
            )?;
        }
        EngineerAction::Remove { engineer } => {
            let engineer = find_engineer(db, &engineer)?;
            let report = svc.remove_engineer(&engineer.id)?;
            print_report(db, &report, &format!("{} removed from the pool", engineer.name))?;
        }
        EngineerAction::List => {
            let engineers = db.list_engineers()?;
            let views: Vec<MemberView> = engineers.iter().map(MemberView::from).collect();
            print_json(&views)?;
        }
    }
    Ok(())
}
