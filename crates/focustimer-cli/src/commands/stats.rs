use chrono::{Local, NaiveDate};
use clap::Subcommand;
use focustimer_core::storage::Database;
use serde_json::json;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's stats
    Today,
    /// All-time stats, including the current streak
    All {
        /// Evaluate as of this day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Current streak in days
    Streak,
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let today = Local::now().date_naive();

    match action {
        StatsAction::Today => {
            let stats = db.stats(today)?;
            let report = json!({
                "date": today,
                "sessions": stats.today_sessions,
                "focus_min": stats.today_focus_min,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        StatsAction::All { date } => {
            let stats = db.stats(date.unwrap_or(today))?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::Streak => {
            let stats = db.stats(today)?;
            println!("{}", json!({ "streak_days": stats.streak_days }));
        }
    }
    Ok(())
}
