//! `commit`: replace auto-scheduled blocks with a proposal.

use std::path::PathBuf;

use clap::Args;
use timeblock_core::ScheduleProposal;

use super::{plan::print_proposal, CliResult, Session};

#[derive(Args)]
pub struct CommitArgs {
    /// Proposal saved by `plan --output`; plans afresh when omitted
    #[arg(long)]
    pub file: Option<PathBuf>,
}

pub fn run(user: Option<String>, args: CommitArgs) -> CliResult {
    let session = Session::load(user)?;
    let db = session.open_db()?;
    let manager = session.manager(&db, session.config.scheduler.horizon_days);

    let proposal = match &args.file {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            let proposal: ScheduleProposal = serde_json::from_str(&content)?;
            if proposal.user_id != session.user_id {
                return Err(format!(
                    "proposal belongs to user '{}', not '{}'",
                    proposal.user_id, session.user_id
                )
                .into());
            }
            proposal
        }
        None => {
            // current auto blocks are about to be replaced, so plan over them
            let proposal = manager.replan(&session.user_id)?;
            print_proposal(&session, &proposal);
            proposal
        }
    };

    let summary = manager.commit(&session.user_id, &proposal.blocks)?;
    println!("Committed {} blocks", summary.committed_count);
    Ok(())
}
