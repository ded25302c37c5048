//! Bramble CLI - Command-line interface for Bramble
//!
//! Indexes, searches and maintains a directory of markdown pages.

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "bramble")]
#[command(author = "Bramble Contributors")]
#[command(version)]
#[command(about = "Backlinks, search and renames for a folder of markdown pages", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Content directory
    #[arg(short, long, global = true, env = "BRAMBLE_CONTENT", default_value = ".")]
    content: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default settings file to the content directory
    Init,

    /// Build the backlink index
    Index {
        /// Write the index as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the pages linking to this page
        #[arg(short, long)]
        page: Option<String>,
    },

    /// Search page names and content
    Search {
        /// Search query
        query: String,

        /// Maximum results to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Print progress, result and done events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Rename a page and update links to it
    Mv {
        /// Page or file to rename
        src: String,

        /// New page or file name
        dest: String,

        /// Only print what would be done
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Print an event whenever a page changes
    Watch {
        /// Page or file to watch
        page: String,

        /// Last known fingerprint of the page
        #[arg(long)]
        hash: Option<String>,
    },

    /// List the most recently modified pages
    Recent {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// List pages, optionally below a directory
    Browse {
        /// Directory to list
        dir: Option<String>,

        /// Sort key
        #[arg(short, long, value_enum, default_value = "name")]
        sort: SortArg,

        /// Reverse the order
        #[arg(short, long)]
        desc: bool,
    },

    /// Save a page from standard input
    Save {
        /// Page name
        page: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Name,
    Mtime,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let content = cli.content.as_path();
    let result = match cli.command {
        Commands::Init => commands::init(content),
        Commands::Index { output, page } => {
            commands::index(content, output.as_deref(), page.as_deref())
        }
        Commands::Search { query, limit, json } => commands::search(content, &query, limit, json),
        Commands::Mv { src, dest, dry_run } => commands::mv(content, &src, &dest, dry_run),
        Commands::Watch { page, hash } => commands::watch(content, &page, hash).await,
        Commands::Recent { limit } => commands::recent(content, limit),
        Commands::Browse { dir, sort, desc } => {
            let sort = match sort {
                SortArg::Name => bramble_watcher::SortKey::Name,
                SortArg::Mtime => bramble_watcher::SortKey::ModTime,
            };
            commands::browse(content, dir, sort, desc)
        }
        Commands::Save { page } => commands::save(content, &page),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
