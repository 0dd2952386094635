//! Calendar block commands for CLI.

use clap::Subcommand;
use timeblock_core::storage::BlockStore;
use timeblock_core::{Interval, Provenance};

use super::{parse_datetime, CliResult, Session};

#[derive(Subcommand)]
pub enum BlockAction {
    /// Add a manual block; the scheduler plans around it
    Add {
        /// Task ID (or any label) the block belongs to
        #[arg(long)]
        task: String,
        /// Start (RFC 3339 or "YYYY-MM-DD HH:MM" in your timezone)
        start: String,
        /// End (same formats as start)
        end: String,
    },
    /// List blocks
    List {
        /// Only show blocks of this provenance (auto or manual)
        #[arg(long)]
        provenance: Option<Provenance>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(user: Option<String>, action: BlockAction) -> CliResult {
    let session = Session::load(user)?;
    let db = session.open_db()?;
    let user_id = session.user_id.as_str();

    match action {
        BlockAction::Add { task, start, end } => {
            let interval = Interval::new(
                parse_datetime(&start, &session.timezone)?,
                parse_datetime(&end, &session.timezone)?,
            )?;
            let block = db.create_manual_block(user_id, &task, interval)?;
            println!("Block created: {}", block.id.unwrap_or_default());
        }
        BlockAction::List { provenance, json } => {
            let blocks = db.list_blocks(user_id, provenance)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&blocks)?);
            } else if blocks.is_empty() {
                println!("No blocks.");
            } else {
                for block in &blocks {
                    println!(
                        "{} - {}  {:<6}  {}",
                        session.local(block.start_time()),
                        session.local(block.end_time()),
                        block.provenance.as_str(),
                        block.task_id
                    );
                }
            }
        }
    }
    Ok(())
}
