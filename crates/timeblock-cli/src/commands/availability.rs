//! Weekly availability commands for CLI.

use clap::Subcommand;
use serde::Serialize;
use timeblock_core::schedule::{parse_time_of_day, parse_utc_offset};
use timeblock_core::AvailabilityRule;

use super::{CliResult, Session};

const WEEKDAYS: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

#[derive(Subcommand)]
pub enum AvailabilityAction {
    /// Add a weekly window
    Add {
        /// Day of week: sun..sat or 0-6 (0 = Sunday)
        #[arg(value_parser = parse_weekday)]
        weekday: u8,
        /// Start time (HH:MM)
        start: String,
        /// End time (HH:MM), same day
        end: String,
        /// UTC offset of the window (defaults to config `utc_offset`)
        #[arg(long, allow_hyphen_values = true)]
        offset: Option<String>,
    },
    /// List weekly windows
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a weekly window
    Remove {
        /// Rule ID (from `availability list`)
        id: i64,
    },
}

#[derive(Serialize)]
struct RuleRow {
    id: i64,
    #[serde(flatten)]
    rule: AvailabilityRule,
}

fn parse_weekday(s: &str) -> Result<u8, String> {
    let lower = s.trim().to_ascii_lowercase();
    if let Some(idx) = WEEKDAYS.iter().position(|d| lower.starts_with(d)) {
        return Ok(idx as u8);
    }
    match lower.parse::<u8>() {
        Ok(n) if n <= 6 => Ok(n),
        _ => Err(format!("invalid weekday '{s}' (expected sun..sat or 0-6)")),
    }
}

fn format_offset(minutes: i32) -> String {
    let sign = if minutes < 0 { '-' } else { '+' };
    let abs = minutes.abs();
    format!("{sign}{:02}:{:02}", abs / 60, abs % 60)
}

pub fn run(user: Option<String>, action: AvailabilityAction) -> CliResult {
    let session = Session::load(user)?;
    let db = session.open_db()?;
    let user_id = session.user_id.as_str();

    match action {
        AvailabilityAction::Add {
            weekday,
            start,
            end,
            offset,
        } => {
            let offset = offset.as_deref().unwrap_or(&session.config.utc_offset);
            let rule = AvailabilityRule::new(
                user_id,
                weekday,
                parse_time_of_day(&start)?,
                parse_time_of_day(&end)?,
                parse_utc_offset(offset)?,
            )?;
            let id = db.add_availability_rule(&rule)?;
            println!("Availability added: {id}");
        }
        AvailabilityAction::List { json } => {
            let rules = db.list_availability_rules(user_id)?;
            if json {
                let rows: Vec<RuleRow> = rules
                    .into_iter()
                    .map(|(id, rule)| RuleRow { id, rule })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else if rules.is_empty() {
                println!("No availability rules.");
            } else {
                for (id, rule) in &rules {
                    println!(
                        "{id:>4}  {}  {}-{}  UTC{}",
                        WEEKDAYS[usize::from(rule.weekday)],
                        rule.start_time.format("%H:%M"),
                        rule.end_time.format("%H:%M"),
                        format_offset(rule.tz_offset_minutes)
                    );
                }
            }
        }
        AvailabilityAction::Remove { id } => {
            if !db.delete_availability_rule(user_id, id)? {
                return Err(format!("availability rule not found: {id}").into());
            }
            println!("Availability removed: {id}");
        }
    }
    Ok(())
}
