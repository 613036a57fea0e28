use clap::Subcommand;
use rota_core::{Config, ConfigError};

use super::CmdResult;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print one setting (e.g. "release.start_time", "slack.enabled")
    Get { key: String },
    /// Change one setting and save it
    Set { key: String, value: String },
    /// Print the whole file as TOML
    Show,
    /// Print where the config file lives
    Path,
    /// Overwrite the file with defaults
    Reset,
}

pub fn run(action: ConfigAction) -> CmdResult {
    match action {
        ConfigAction::Get { key } => {
            let value = Config::load()?
                .get(&key)
                .ok_or(ConfigError::UnknownKey(key))?;
            println!("{value}");
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            eprintln!("{key} = {}", config.get(&key).unwrap_or(value));
            if key == "release.start_time" {
                eprintln!("note: existing releases keep their current time; `release edit` moves one");
            }
        }
        ConfigAction::Show => print!("{}", toml::to_string_pretty(&Config::load()?)?),
        ConfigAction::Path => println!("{}", Config::path()?.display()),
        ConfigAction::Reset => {
            Config::default().save()?;
            eprintln!("configuration reset to defaults");
        }
    }
    Ok(())
}
