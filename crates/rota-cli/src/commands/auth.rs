use std::sync::Arc;

use clap::Subcommand;
use rota_core::{Config, RosterDb, SlackNotifier};

use super::CmdResult;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Slack: login / logout / status
    Slack {
        #[command(subcommand)]
        action: AuthOp,
    },
}

#[derive(Subcommand)]
pub enum AuthOp {
    /// Store a bot token and verify it
    Login {
        /// Slack bot token (xoxb-...)
        #[arg(long)]
        token: String,
    },
    /// Remove credentials
    Logout,
    /// Check authentication status
    Status,
}

pub fn run(action: AuthAction) -> CmdResult {
    match action {
        AuthAction::Slack { action: op } => handle_slack(op),
    }
}

fn handle_slack(op: AuthOp) -> CmdResult {
    match op {
        AuthOp::Login { token } => {
            let config = Config::load()?;
            let db = Arc::new(RosterDb::open()?);
            SlackNotifier::new(token.as_str(), &config.slack, db)?.verify()?;
            SlackNotifier::set_credentials(&token)?;
            println!("Slack authenticated");
            if !config.slack.enabled {
                eprintln!("hint: run `rota config set slack.enabled true` to send reminders");
            }
        }
        AuthOp::Logout => {
            SlackNotifier::disconnect()?;
            println!("Slack disconnected");
        }
        AuthOp::Status => {
            println!(
                "{}",
                if SlackNotifier::stored_token().is_some() {
                    "authenticated"
                } else {
                    "not authenticated"
                }
            );
        }
    }
    Ok(())
}
