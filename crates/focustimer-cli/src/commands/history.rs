use chrono::{Datelike, Local, NaiveDate};
use clap::Subcommand;
use focustimer_core::storage::Database;
use focustimer_core::ValidationError;
use serde_json::json;

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List sessions, newest first
    List {
        /// Only sessions of this day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show one session
    Show { id: i64 },
    /// Delete one session
    Delete { id: i64 },
    /// Delete every session
    Clear {
        /// Confirm deleting the whole history
        #[arg(long)]
        yes: bool,
    },
    /// Days that have at least one session, newest first
    Dates,
    /// Days of a month with sessions
    Calendar {
        /// Month as YYYY-MM (default: current month)
        #[arg(long, value_parser = parse_month)]
        month: Option<YearMonth>,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

fn parse_month(s: &str) -> Result<YearMonth, String> {
    let (year, month) = s
        .split_once('-')
        .ok_or_else(|| format!("expected YYYY-MM, got '{s}'"))?;
    let year = year.parse::<i32>().map_err(|e| format!("year: {e}"))?;
    let month = month.parse::<u32>().map_err(|e| format!("month: {e}"))?;
    if !(1..=12).contains(&month) {
        return Err(format!("month must be 1-12, got {month}"));
    }
    Ok(YearMonth { year, month })
}

fn not_found(id: i64) -> ValidationError {
    ValidationError::NotFound { kind: "session", id }
}

pub fn run(action: HistoryAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        HistoryAction::List { date } => {
            let sessions = match date {
                Some(date) => db.sessions_by_date(date)?,
                None => db.all_sessions()?,
            };
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
        HistoryAction::Show { id } => {
            let session = db.session_by_id(id)?.ok_or_else(|| not_found(id))?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        HistoryAction::Delete { id } => {
            if !db.delete_session(id)? {
                return Err(not_found(id).into());
            }
            println!("{}", json!({ "deleted": id }));
        }
        HistoryAction::Clear { yes } => {
            if !yes {
                return Err("refusing to clear history without --yes".into());
            }
            let removed = db.delete_all_sessions()?;
            println!("{}", json!({ "deleted": removed }));
        }
        HistoryAction::Dates => {
            println!("{}", serde_json::to_string_pretty(&db.session_dates()?)?);
        }
        HistoryAction::Calendar { month } => {
            let today = Local::now().date_naive();
            let YearMonth { year, month } = month.unwrap_or(YearMonth {
                year: today.year(),
                month: today.month(),
            });
            let days = db.session_days_in_month(year, month)?;
            let report = json!({ "year": year, "month": month, "days": days });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
