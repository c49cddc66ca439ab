//! Foxy CLI
//!
//! Headless driver for the companion brain. `run` ticks the state machine at
//! the configured frame rate and treats every line on stdin as a click;
//! `stats` and `reset` inspect or clear the saved brain.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use foxy_brain::action_selector::report;
use foxy_brain::{
    Action, ActionReport, BrainState, BrainStore, ClickOutcome, Companion, CompanionConfig,
    JsonFileStore, Phase,
};
use std::io::BufRead;
use std::path::PathBuf;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::MissedTickBehavior;

#[derive(Parser)]
#[command(name = "foxy")]
#[command(about = "Foxy - a desktop companion that learns what you like", long_about = None)]
struct Cli {
    /// Path to configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Brain file to load and save
    #[arg(short, long, value_name = "FILE")]
    brain: Option<PathBuf>,

    /// Probability of ignoring learned weights (0.0 - 1.0)
    #[arg(short = 'e', long)]
    exploration_rate: Option<f64>,

    /// Tick clock frame rate
    #[arg(long)]
    fps: Option<u32>,

    /// Seed the random generator for a reproducible run
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the companion; press Enter to click on it
    Run {
        /// Stop after this many ticks (0 = until Ctrl-C)
        #[arg(short = 'n', long, default_value = "0")]
        ticks: u64,

        /// Do not wait for the frame clock between ticks
        #[arg(long)]
        turbo: bool,

        /// Simulated user who clicks every time this action plays
        #[arg(long, value_name = "ACTION")]
        auto_click: Option<Action>,
    },

    /// Show learned weights and feedback statistics
    Stats {
        /// Print as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Forget everything and write a fresh brain
    Reset,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        log::info!("Loading config from: {}", config_path.display());
        CompanionConfig::from_toml_file(config_path)?
    } else {
        CompanionConfig::default()
    };

    // Override with CLI options
    if let Some(brain) = cli.brain {
        config.brain_path = brain;
    }
    if let Some(rate) = cli.exploration_rate {
        config.exploration_rate = rate;
    }
    if let Some(fps) = cli.fps {
        config.fps = fps;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }

    match cli.command {
        Commands::Run {
            ticks,
            turbo,
            auto_click,
        } => run(config, ticks, turbo, auto_click).await,
        Commands::Stats { json } => show_stats(&config, json),
        Commands::Reset => {
            JsonFileStore::new(&config.brain_path).save(&BrainState::fresh())?;
            println!("Brain reset: {}", config.brain_path.display());
            Ok(())
        }
    }
}

async fn run(config: CompanionConfig, max_ticks: u64, turbo: bool, auto_click: Option<Action>) -> Result<()> {
    if turbo && max_ticks == 0 {
        anyhow::bail!("--turbo needs a tick limit (--ticks N)");
    }

    let mut interval = tokio::time::interval(config.frame_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut companion = Companion::open(config)?;

    // Clicks arrive between ticks, never during one.
    let mut click_rx = spawn_click_reader(std::io::BufReader::new(std::io::stdin()))?;

    println!("\n=== Foxy Started ===");
    println!("Press Enter while Foxy does something you like!");
    println!("Foxy will learn what gets your attention over time.\n");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut ticks = 0u64;
    loop {
        if !turbo {
            tokio::select! {
                _ = interval.tick() => {}
                _ = &mut ctrl_c => {
                    log::info!("Shutdown signal received");
                    break;
                }
            }
        }

        while click_rx.try_recv().is_ok() {
            match companion.on_click() {
                ClickOutcome::Recorded(action) => println!("♥ You liked '{}'", action),
                ClickOutcome::AlreadyRecorded(_) => {}
                ClickOutcome::IgnoredIdle => println!("(Foxy is resting)"),
            }
        }

        if let Some(phase) = companion.tick() {
            println!("▶ {}", phase);
        }

        if let Phase::Performing(action) = companion.current_phase() {
            if auto_click == Some(action) && !companion.instance().feedback_recorded() {
                companion.on_click();
            }
        }

        ticks += 1;
        if max_ticks > 0 && ticks >= max_ticks {
            break;
        }
    }

    companion.shutdown()?;
    print_table(&companion.stats());
    Ok(())
}

/// Forward every input line as a click.
///
/// The reader lives on a plain thread rather than the runtime's blocking
/// pool: a read parked on an open terminal must not hold up runtime shutdown.
fn spawn_click_reader<R>(reader: R) -> Result<UnboundedReceiver<()>>
where
    R: BufRead + Send + 'static,
{
    let (click_tx, click_rx) = mpsc::unbounded_channel();

    std::thread::Builder::new()
        .name("foxy-clicks".into())
        .spawn(move || {
            for line in reader.lines() {
                if line.is_err() || click_tx.send(()).is_err() {
                    break;
                }
            }
        })
        .context("Failed to start click reader")?;

    Ok(click_rx)
}

fn show_stats(config: &CompanionConfig, json: bool) -> Result<()> {
    let store = JsonFileStore::new(&config.brain_path);
    let state = store
        .load()
        .with_context(|| format!("Failed to read brain {}", config.brain_path.display()))?;

    let state = match state {
        Some(state) => state,
        None => {
            println!("No brain at {} yet; showing defaults.", config.brain_path.display());
            BrainState::fresh()
        }
    };

    let rows = report(&state);
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print_table(&rows);
    }
    Ok(())
}

fn print_table(rows: &[ActionReport]) {
    println!("\n=== Action Weights ===");
    println!(
        "{:<10} {:>8} {:>8} {:>8} {:>8} {:>8}",
        "action", "weight", "prob", "chosen", "clicks", "rate"
    );
    for row in rows {
        println!(
            "{:<10} {:>8.2} {:>7.1}% {:>8} {:>8} {:>7.1}%",
            row.action.name(),
            row.weight,
            row.probability * 100.0,
            row.times_chosen,
            row.positive_feedback,
            row.click_rate * 100.0
        );
    }
}
