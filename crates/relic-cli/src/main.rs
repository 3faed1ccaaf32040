#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::OutputMode;
use std::env;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "relic: canonical item database for MUD identify text",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags.
    const fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Lifecycle",
        about = "Initialize a relic project",
        long_about = "Initialize a relic project in the current directory.",
        after_help = "EXAMPLES:\n    # Initialize a project in the current directory\n    relic init\n\n    # Emit machine-readable output\n    relic init --json"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Submit raw identify text",
        long_about = "Submit one item's identify text; creates or merges the canonical item.",
        after_help = "EXAMPLES:\n    # Submit from a file\n    relic submit dagger.txt --submitter alice --origin \"Old Keep\"\n\n    # Submit from stdin, delayed visibility\n    cat dagger.txt | relic submit --submitter alice --delayed\n\n    # Emit machine-readable output\n    relic submit dagger.txt --json"
    )]
    Submit(cmd::submit::SubmitArgs),

    #[command(
        next_help_heading = "Read",
        about = "List canonical items",
        long_about = "List canonical items; hidden and embargoed items are withheld by default.",
        after_help = "EXAMPLES:\n    # List visible items\n    relic list\n\n    # Include hidden items\n    relic list --hidden\n\n    # Emit machine-readable output\n    relic list --json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one canonical item",
        long_about = "Show full details for a single canonical item by slug.",
        after_help = "EXAMPLES:\n    # Show an item\n    relic show rusty-dagger\n\n    # Emit machine-readable output\n    relic show rusty-dagger --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Read",
        about = "Search items by name or modifiers",
        long_about = "Case-insensitive substring search over item names and modifier text.",
        after_help = "EXAMPLES:\n    # Find items that modify strength\n    relic search \"strength +\"\n\n    # Emit machine-readable output\n    relic search dagger --json"
    )]
    Search(cmd::search::SearchArgs),

    #[command(
        next_help_heading = "Moderation",
        about = "Hide or restore an item",
        long_about = "Append a hide/restore decision to the visibility ledger.",
        after_help = "EXAMPLES:\n    # Hide an item\n    relic moderate hide rusty-dagger --actor warden\n\n    # Restore it later\n    relic moderate restore rusty-dagger --actor warden"
    )]
    Moderate(cmd::moderate::ModerateArgs),

    #[command(
        next_help_heading = "Moderation",
        about = "Show an item's moderation history",
        long_about = "List the visibility ledger entries for one item, most recent first.",
        after_help = "EXAMPLES:\n    # Show the ledger for an item\n    relic history rusty-dagger\n\n    # Emit machine-readable output\n    relic history rusty-dagger --json"
    )]
    History(cmd::history::HistoryArgs),

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Rebuild the catalog from raw submissions",
        long_about = "Wipe the canonical items and refold them from the raw submission log, then replay the moderation ledger.",
        after_help = "EXAMPLES:\n    # Rebuild after a parser fix\n    relic reparse\n\n    # Emit machine-readable output\n    relic reparse --json"
    )]
    Reparse(cmd::reparse::ReparseArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("RELIC_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "relic=debug,info"
        } else {
            "relic=info,warn"
        })
    });

    let format = env::var("RELIC_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    if format == "json" {
        registry.with(fmt::layer().json().with_ansi(false)).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let root = std::env::current_dir()?;
    let output = cli.output_mode();

    match cli.command {
        Commands::Init(args) => cmd::init::run_init(&args, &root, output),
        Commands::Submit(args) => cmd::submit::run_submit(&args, &root, output),
        Commands::List(args) => cmd::list::run_list(&args, &root, output),
        Commands::Show(args) => cmd::show::run_show(&args, &root, output),
        Commands::Search(args) => cmd::search::run_search(&args, &root, output),
        Commands::Moderate(args) => cmd::moderate::run_moderate(&args, &root, output),
        Commands::History(args) => cmd::history::run_history(&args, &root, output),
        Commands::Reparse(args) => cmd::reparse::run_reparse(&args, &root, output),
    }
}
