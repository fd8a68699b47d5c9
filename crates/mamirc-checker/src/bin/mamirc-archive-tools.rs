//! Companion tools for MamIRC archives
//!
//! ```bash
//! # Connection statistics as an HTML table
//! mamirc-archive-tools stats MamircArchive.sqlite stats.html
//!
//! # Configuration database
//! mamirc-archive-tools config Config.sqlite list
//! mamirc-archive-tools config Config.sqlite set "web port" 11972
//! mamirc-archive-tools config Config.sqlite delete "web port"
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mamirc_checker::{stats, CheckerConfig};
use mamirc_logging::{LogConfig, MamircSubscriberBuilder};
use mamirc_storage::{ConfigStore, SqliteEventStore};
use tracing::info;

#[derive(Parser)]
#[command(name = "mamirc-archive-tools")]
#[command(about = "Statistics and configuration tools for MamIRC")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write per-connection statistics as an HTML table
    Stats {
        /// Archive database to read
        archive: PathBuf,
        /// HTML file to write
        output: PathBuf,
    },
    /// Read or edit a configuration database
    Config {
        /// Configuration database
        database: PathBuf,
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print all key-value pairs
    List,
    /// Print the value of one key
    Get { key: String },
    /// Set a new or existing key
    Set { key: String, value: String },
    /// Delete a key
    Delete { key: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _guard = MamircSubscriberBuilder::new()
        .with_config(LogConfig::command_line())
        .with_level(&cli.level)
        .init()?;

    match cli.command {
        Command::Stats { archive, output } => {
            let options = CheckerConfig::default().open_options();
            let store = SqliteEventStore::open(&archive, options)
                .with_context(|| format!("Failed to open archive {}", archive.display()))?;
            let file = File::create(&output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            let rows = stats::write_html_report(&store, BufWriter::new(file))?;
            info!(rows, output = %output.display(), "Wrote connection statistics");
        }
        Command::Config { database, action } => run_config(database, action)?,
    }
    Ok(())
}

fn run_config(database: PathBuf, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::List => {
            let store = ConfigStore::open_read_only(&database)?;
            for (key, value) in store.list()? {
                println!("{key} = {value}");
            }
        }
        ConfigAction::Get { key } => {
            let store = ConfigStore::open_read_only(&database)?;
            match store.get(&key)? {
                Some(value) => println!("{value}"),
                None => anyhow::bail!("No such key: {key:?}"),
            }
        }
        ConfigAction::Set { key, value } => {
            ConfigStore::check_writable_key(&key)?;
            ConfigStore::open_or_create(&database)?.set(&key, &value)?;
        }
        ConfigAction::Delete { key } => {
            ConfigStore::check_writable_key(&key)?;
            if !ConfigStore::open_or_create(&database)?.delete(&key)? {
                info!(key, "Key was not set");
            }
        }
    }
    Ok(())
}
