//! Gwent Tracker - Main Binary
//!
//! Command-line front end: shows which Gwent cards a savegame has collected

use anyhow::Context;
use clap::{Parser, Subcommand};
use gwent_tracker::{
    catalog::{Catalog, CatalogConfig, Deck},
    collection::{CardFilter, Collection},
    savegame::{self, container, extract_inventory, SaveGame, Variable},
    tracker::{ApplyOutcome, LogNotifier, Tracker},
    watch::{SaveWatcher, DEFAULT_POLL_INTERVAL},
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gwent")]
#[command(about = "Gwent Tracker - Witcher 3 Gwent card collection tracker", long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory holding cards.yml and missable.yml
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show obtained and missing cards for a savegame
    Status {
        /// Savegame file, or a folder to pick the newest .sav from
        #[arg(value_name = "SAVE")]
        save: PathBuf,

        /// Only list cards that are not obtained yet
        #[arg(long)]
        missing: bool,

        /// Only list cards from this deck (e.g. "Monsters", "Scoia'tael")
        #[arg(long)]
        deck: Option<Deck>,

        /// Only list cards whose name contains this text
        #[arg(long)]
        name: Option<String>,
    },

    /// Print the raw (card index, copies) pairs stored in a savegame
    Inventory {
        #[arg(value_name = "SAVE")]
        save: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the decoded variable tree of a savegame
    Dump {
        #[arg(value_name = "SAVE")]
        save: PathBuf,

        /// Maximum block depth to print
        #[arg(long)]
        depth: Option<usize>,

        /// Print JSON instead of an indented tree
        #[arg(long)]
        json: bool,
    },

    /// Re-read the savegame whenever the game writes it
    Watch {
        #[arg(value_name = "SAVE")]
        save: PathBuf,

        /// Polling interval in milliseconds
        #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
        interval_ms: u64,
    },

    /// Write the decompressed variable stream of a savegame
    Unpack {
        #[arg(value_name = "SAVE")]
        save: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },

    /// Wrap an uncompressed variable stream in the game's LZ4 container
    Pack {
        #[arg(value_name = "STREAM")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let catalog_config = CatalogConfig::from_data_dir(&cli.data_dir);
    let result = match cli.command {
        Commands::Status {
            save,
            missing,
            deck,
            name,
        } => {
            let filter = CardFilter {
                name,
                deck,
                obtained: missing.then_some(false),
            };
            run_status(&catalog_config, &save, &filter).await
        }
        Commands::Inventory { save, json } => run_inventory(&save, json),
        Commands::Dump { save, depth, json } => run_dump(&save, depth, json),
        Commands::Watch { save, interval_ms } => {
            run_watch(&catalog_config, save, Duration::from_millis(interval_ms)).await
        }
        Commands::Unpack { save, output } => run_unpack(&save, &output),
        Commands::Pack { input, output } => run_pack(&input, &output),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

/// Accept either a savegame file or a folder of saves
fn resolve_save(path: &Path) -> anyhow::Result<PathBuf> {
    if !path.is_dir() {
        return Ok(path.to_path_buf());
    }
    let latest = savegame::latest_save(path)?.with_context(|| {
        format!(
            "no .{} files in {}",
            savegame::SAVE_EXTENSION,
            path.display()
        )
    })?;
    println!("Using newest savegame: {}", latest.display());
    Ok(latest)
}

fn load_tracker(config: &CatalogConfig) -> anyhow::Result<Tracker<LogNotifier>> {
    let catalog = Catalog::load(config).with_context(|| {
        format!(
            "failed to load card catalog from {} and {}",
            config.cards_path.display(),
            config.missables_path.display()
        )
    })?;
    Ok(Tracker::new(Collection::new(catalog), LogNotifier))
}

fn print_status(tracker: &Tracker<LogNotifier>, filter: &CardFilter) {
    let collection = tracker.collection();

    println!("{:>5}  {:<4} {:<18} {:<40}", "Index", "Own", "Deck", "Name");
    for card in collection.filter(filter) {
        let owned = match card.owned {
            Some(copies) => format!("x{copies}"),
            None => "-".to_string(),
        };
        println!(
            "{:>5}  {:<4} {:<18} {:<40}",
            card.index,
            owned,
            card.deck.to_string(),
            card.name
        );
    }

    println!();
    println!(
        "Obtained {} of {} cards",
        collection.obtained_count(),
        collection.cards().len()
    );

    if !collection.missables().is_empty() {
        println!("\nMissable cards:");
        for group in collection.missables() {
            println!("  [{}] {}", group.status, group.name);
        }
    }
}

async fn run_status(
    config: &CatalogConfig,
    save: &Path,
    filter: &CardFilter,
) -> anyhow::Result<()> {
    let mut tracker = load_tracker(config)?;
    let save = resolve_save(save)?;

    match tracker.load(save.clone()).await {
        ApplyOutcome::Applied(summary) => {
            if summary.unknown > 0 {
                println!(
                    "({} cards in the savegame are not in the catalog)\n",
                    summary.unknown
                );
            }
            print_status(&tracker, filter);
            Ok(())
        }
        ApplyOutcome::Failed => anyhow::bail!("could not read cards from {}", save.display()),
        ApplyOutcome::Stale { .. } => Ok(()),
    }
}

fn run_inventory(save: &Path, json: bool) -> anyhow::Result<()> {
    let save = resolve_save(save)?;
    let entries = savegame::read_inventory(&save)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        println!("{:>5}  {:>6}", "Index", "Copies");
        for entry in &entries {
            println!("{:>5}  {:>6}", entry.index, entry.copies);
        }
        println!("\n{} cards", entries.len());
    }
    Ok(())
}

fn print_variable(variable: &Variable, depth: usize, max_depth: Option<usize>) {
    let indent = "  ".repeat(depth);
    match variable {
        Variable::Block { name, children } => {
            println!("{indent}{name} [{} children]", children.len());
            if max_depth.map_or(true, |max| depth < max) {
                for child in children {
                    print_variable(child, depth + 1, max_depth);
                }
            }
        }
        Variable::Leaf { name, value, .. } => {
            println!("{indent}{name}: {} = {value}", value.type_name());
        }
    }
}

fn run_dump(save: &Path, depth: Option<usize>, json: bool) -> anyhow::Result<()> {
    let save_path = resolve_save(save)?;
    let save = SaveGame::load(&save_path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&save)?);
        return Ok(());
    }

    println!(
        "{}: type codes {:?}, {} sections, {} variables",
        save_path.display(),
        save.type_codes,
        save.sections.len(),
        save.node_count()
    );
    for (position, section) in save.sections.iter().enumerate() {
        print!("#{position:<3} ");
        print_variable(section, 0, depth);
    }

    match extract_inventory(&save) {
        Ok(entries) => println!("\nCard collection: {} cards", entries.len()),
        Err(e) => println!("\nCard collection not found: {e}"),
    }
    Ok(())
}

async fn run_watch(
    config: &CatalogConfig,
    save: PathBuf,
    period: Duration,
) -> anyhow::Result<()> {
    let mut tracker = load_tracker(config)?;
    let save = resolve_save(&save)?;

    if let ApplyOutcome::Applied(_) = tracker.load(save.clone()).await {
        print_status(&tracker, &CardFilter::default());
    }

    println!("\nWatching {} (Ctrl-C to stop)", save.display());
    let mut watcher = SaveWatcher::new(save.clone(), period).await;
    loop {
        tokio::select! {
            _ = watcher.changed() => {
                let handle = tracker.request_decode(save.clone());
                let result = handle.await?;
                if let ApplyOutcome::Applied(_) = tracker.apply_decode_result(result) {
                    println!();
                    print_status(&tracker, &CardFilter::default());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("Stopped watching");
                return Ok(());
            }
        }
    }
}

fn run_unpack(save: &Path, output: &Path) -> anyhow::Result<()> {
    let data = std::fs::read(save).with_context(|| format!("reading {}", save.display()))?;
    let stream = container::unpack(&data)?;
    std::fs::write(output, stream.as_ref())?;
    println!(
        "Wrote {} bytes ({} compressed) to {}",
        stream.len(),
        data.len(),
        output.display()
    );
    Ok(())
}

fn run_pack(input: &Path, output: &Path) -> anyhow::Result<()> {
    let stream =
        std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    // Refuse to wrap something the reader would reject
    SaveGame::from_bytes(&stream)?;
    let packed = container::compress(&stream, container::DEFAULT_CHUNK_SIZE);
    std::fs::write(output, &packed)?;
    println!("Wrote {} bytes to {}", packed.len(), output.display());
    Ok(())
}
