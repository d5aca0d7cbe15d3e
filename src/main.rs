//! ferry - copy, move and remove files through the ferryfile engine.
//!
//! Usage:
//!   ferry copy <PATHS>... --to <DIR>   Copy items into a directory
//!   ferry move <PATHS>... --to <DIR>   Move items into a directory
//!   ferry remove <PATHS>...            Remove items
//!   ferry --json ...                   Print notifications as JSON lines

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result};
use humansize::{DECIMAL, format_size};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use ferryfile_core::{EngineConfig, EngineEvent};
use ferryfile_ops::{Clipboard, expand};

#[derive(Parser)]
#[command(
    name = "ferry",
    version,
    about = "Cooperative copy, move and remove with progress notifications",
    long_about = "ferry queues file operations on the ferryfile engine and prints \
                  its notifications as they happen.\n\n\
                  Set FERRY_LOG (e.g. FERRY_LOG=debug) to see engine logs on stderr."
)]
struct Cli {
    /// Print notifications as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Engine configuration file (JSON); missing fields use defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Skip the free space check before copying
    #[arg(long, global = true)]
    no_space_check: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Copy items into a directory
    Copy {
        /// Items to copy
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Destination directory
        #[arg(short, long)]
        to: PathBuf,
    },

    /// Move items into a directory
    Move {
        /// Items to move
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Destination directory
        #[arg(short, long)]
        to: PathBuf,
    },

    /// Remove items
    Remove {
        /// Items to remove
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("FERRY_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.no_space_check)?;

    let (handle, events) = ferryfile_ops::spawn(config, Clipboard::global());
    let printer = tokio::spawn(print_events(events, cli.json));

    match cli.command {
        Command::Copy { paths, to } => {
            let paths = absolute_all(&paths)?;
            announce("Copying", &paths, &to, cli.json);
            handle.copy(paths);
            handle.path_changed(absolute(&to)?);
            handle.paste();
        }
        Command::Move { paths, to } => {
            let paths = absolute_all(&paths)?;
            announce("Moving", &paths, &to, cli.json);
            handle.cut(paths);
            handle.path_changed(absolute(&to)?);
            handle.paste();
        }
        Command::Remove { paths } => {
            handle.remove(absolute_all(&paths)?);
        }
    }

    handle.wait_idle().await;
    handle.shutdown().await;

    let failed = printer.await.context("Event printer stopped unexpectedly")?;
    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn load_config(path: Option<&Path>, no_space_check: bool) -> Result<EngineConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid configuration in {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    if no_space_check {
        config.check_disk_space = false;
    }
    Ok(config)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Invalid path: {}", path.display()))
}

fn absolute_all(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    paths.iter().map(|p| absolute(p)).collect()
}

/// Print a one-line summary of what is about to happen.
fn announce(verb: &str, paths: &[PathBuf], to: &Path, json: bool) {
    if json {
        return;
    }
    // Unreadable paths are reported by the engine itself.
    let (items, bytes) = paths
        .iter()
        .filter_map(|p| expand(p).ok())
        .fold((0, 0), |(items, bytes), e| {
            (items + e.records.len(), bytes + e.bytes)
        });
    println!(
        "{verb} {items} items ({}) to {}",
        format_size(bytes, DECIMAL),
        to.display()
    );
}

/// Print notifications until the engine goes away. Returns true if any
/// error was reported.
async fn print_events(mut events: mpsc::UnboundedReceiver<EngineEvent>, json: bool) -> bool {
    let mut failed = false;
    while let Some(event) = events.recv().await {
        failed |= event.is_error();
        if json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(err) => tracing::warn!(error = %err, "could not serialize event"),
            }
            continue;
        }
        match event {
            EngineEvent::Error { title, message } => eprintln!("error: {title}: {message}"),
            EngineEvent::Removed { path } => println!("removed {}", path.display()),
            EngineEvent::Added { path } => println!("added   {}", path.display()),
            EngineEvent::Changed { path } => println!("changed {}", path.display()),
            EngineEvent::Progress {
                current,
                total,
                percent,
            } => println!("[{percent:>3}%] {current}/{total}"),
            EngineEvent::ClipboardChanged => {}
        }
    }
    failed
}
