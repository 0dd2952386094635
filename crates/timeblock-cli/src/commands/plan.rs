//! `plan`: propose a schedule without writing it.

use std::path::PathBuf;

use clap::Args;
use timeblock_core::{PlanWarning, ScheduleProposal};

use super::{CliResult, Session};

#[derive(Args)]
pub struct PlanArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
    /// Days to plan ahead (defaults to config `scheduler.horizon_days`)
    #[arg(long)]
    pub days: Option<u32>,
    /// Also save the proposal as JSON for `commit --file`
    #[arg(long)]
    pub output: Option<PathBuf>,
}

pub fn run(user: Option<String>, args: PlanArgs) -> CliResult {
    let session = Session::load(user)?;
    let db = session.open_db()?;
    let days = args.days.unwrap_or(session.config.scheduler.horizon_days);

    let proposal = session.manager(&db, days).plan(&session.user_id)?;

    if let Some(path) = &args.output {
        std::fs::write(path, serde_json::to_string_pretty(&proposal)?)?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&proposal)?);
    } else {
        print_proposal(&session, &proposal);
    }
    Ok(())
}

pub fn print_proposal(session: &Session, proposal: &ScheduleProposal) {
    for warning in &proposal.warnings {
        match warning {
            PlanWarning::AvailabilityMissing { user_id } => {
                println!("warning: no availability rules for {user_id}");
            }
        }
    }

    if proposal.blocks.is_empty() {
        println!("Nothing to schedule.");
    }
    for block in &proposal.blocks {
        println!(
            "{} - {}  {:<4}  {}",
            session.local(block.start_time),
            session.local(block.end_time),
            block.priority.as_str(),
            block.task_title
        );
    }

    for task in &proposal.unscheduled {
        println!(
            "unscheduled: {} ({} min left)",
            task.task_id, task.remaining_minutes
        );
    }
}
