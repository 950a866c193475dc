use clap::Subcommand;
use focustimer_core::{ConfigError, PreferenceStore};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "timer.focus_duration", "notifications.enabled")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// List all config values
    List {
        /// One `key = value` line per setting instead of JSON
        #[arg(long)]
        flat: bool,
    },
    /// Reset config to defaults (onboarding state is kept)
    Reset,
    /// Mark onboarding as completed
    Onboard,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    // Out-of-range values must not lock the user out of the commands that fix them.
    let store = PreferenceStore::open_unchecked()?;

    match action {
        ConfigAction::Get { key } => match store.get(&key) {
            Some(value) => println!("{value}"),
            None => return Err(ConfigError::UnknownKey(key).into()),
        },
        ConfigAction::Set { key, value } => {
            let change = store.set(&key, &value)?;
            println!("{}", serde_json::to_string_pretty(&change)?);
        }
        ConfigAction::List { flat: false } => {
            let json = serde_json::to_string_pretty(&store.config())?;
            println!("{json}");
        }
        ConfigAction::List { flat: true } => {
            for (key, value) in store.config().entries() {
                println!("{key} = {value}");
            }
        }
        ConfigAction::Reset => {
            store.reset()?;
            println!("config reset to defaults");
        }
        ConfigAction::Onboard => {
            store.complete_onboarding()?;
            println!("onboarding completed");
        }
    }
    Ok(())
}
