use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "timeblock", version, about = "Automatic time-blocking for your task list")]
struct Cli {
    /// User to act for (defaults to `user_id` from the config)
    #[arg(long, global = true)]
    user: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Task management
    Task {
        #[command(subcommand)]
        action: commands::task::TaskAction,
    },
    /// Weekly availability rules
    Availability {
        #[command(subcommand)]
        action: commands::availability::AvailabilityAction,
    },
    /// Calendar blocks
    Block {
        #[command(subcommand)]
        action: commands::block::BlockAction,
    },
    /// Propose a schedule without saving it
    Plan(commands::plan::PlanArgs),
    /// Replace auto-scheduled blocks with a proposal
    Commit(commands::commit::CommitArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let user = cli.user;
    let result = match cli.command {
        Commands::Task { action } => commands::task::run(user, action),
        Commands::Availability { action } => commands::availability::run(user, action),
        Commands::Block { action } => commands::block::run(user, action),
        Commands::Plan(args) => commands::plan::run(user, args),
        Commands::Commit(args) => commands::commit::run(user, args),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
