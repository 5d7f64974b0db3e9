//! Synheart Activity Sentinel CLI
//!
//! Detects scripted input activity and prints explainable decision reports.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use crossbeam_channel::{bounded, Sender};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use synheart_activity_sentinel::{
    collector::{channel_hook, Collector, SensorEvent, Timestamped, DEFAULT_CHANNEL_CAPACITY},
    config::Config,
    detection::{DecisionReport, RuleEngine},
    monitor::Monitor,
    simulate::Scenario,
    transparency::{create_shared_log, create_shared_log_with_persistence, TransparencyLog},
    PRIVACY_DECLARATION, VERSION,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const TRANSPARENCY_FILE: &str = "transparency.json";

#[derive(Parser)]
#[command(name = "activity-sentinel")]
#[command(author = "Synheart")]
#[command(version = VERSION)]
#[command(about = "Detects scripted versus genuine human input activity", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one window of a synthetic scenario and print the report
    Analyze {
        /// Scenario to generate (human, key-repeater, mouse-mover, shortcut-spammer, idle-gamer)
        #[arg(long)]
        scenario: Scenario,

        /// Seed for the scenario generator
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Window length in seconds (defaults to the configured window)
        #[arg(long)]
        window: Option<u64>,

        /// Print the report on a single line
        #[arg(long)]
        compact: bool,
    },

    /// Replay a scenario in real time and analyze it periodically
    Monitor {
        /// Scenario to replay
        #[arg(long)]
        scenario: Scenario,

        /// Seconds between analyses (defaults to the configured interval)
        #[arg(long)]
        interval: Option<u64>,

        /// Stop after this many analyses
        #[arg(long)]
        ticks: Option<u64>,

        /// Seed for the scenario generator
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Also append reports to this JSON Lines file
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Show the detection rules and their thresholds
    Rules,

    /// Show monitoring status and cumulative statistics
    Status,

    /// Display the monitoring declaration
    Privacy,

    /// Show configuration
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            scenario,
            seed,
            window,
            compact,
        } => cmd_analyze(scenario, seed, window, compact),
        Commands::Monitor {
            scenario,
            interval,
            ticks,
            seed,
            output,
        } => cmd_monitor(scenario, interval, ticks, seed, output),
        Commands::Rules => cmd_rules(),
        Commands::Status => cmd_status(),
        Commands::Privacy => {
            println!("{PRIVACY_DECLARATION}");
            Ok(())
        }
        Commands::Config => cmd_config(),
    }
}

fn cmd_analyze(scenario: Scenario, seed: u64, window: Option<u64>, compact: bool) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(secs) = window {
        config.window_duration = Duration::from_secs(secs);
    }
    config.validate()?;

    let mut collector = Collector::new(&config.stores)?;
    collector.start()?;

    let now = Utc::now();
    let window = chrono::Duration::from_std(config.window_duration)
        .context("window duration out of range")?;
    let sinks = collector.sinks();
    let mut routed = 0usize;
    for event in scenario.generate(now, window, seed) {
        if sinks.route(event) {
            routed += 1;
        }
    }
    info!(%scenario, seed, events = routed, "scenario generated");

    let mut monitor =
        Monitor::from_config(collector, &config)?.with_transparency_log(create_shared_log());
    let report = monitor.tick_at(now);

    let json = if compact {
        serde_json::to_string(&report)?
    } else {
        serde_json::to_string_pretty(&report)?
    };
    println!("{json}");
    Ok(())
}

fn cmd_monitor(
    scenario: Scenario,
    interval: Option<u64>,
    ticks: Option<u64>,
    seed: u64,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(secs) = interval {
        config.analysis_interval = Duration::from_secs(secs);
    }
    config.validate()?;

    let transparency_log =
        create_shared_log_with_persistence(config.data_path.join(TRANSPARENCY_FILE));

    let (events_tx, hook) = channel_hook("replay", DEFAULT_CHANNEL_CAPACITY);
    let collector = Collector::new(&config.stores)?.with_hook(hook);

    let mut monitor = Monitor::from_config(collector, &config)?
        .with_transparency_log(Arc::clone(&transparency_log));
    if let Some(ticks) = ticks {
        monitor = monitor.with_max_ticks(ticks);
    }

    let running = Arc::new(AtomicBool::new(true));
    let (shutdown_tx, shutdown_rx) = bounded(1);
    ctrlc_handler(Arc::clone(&running), shutdown_tx);

    let window = chrono::Duration::from_std(config.window_duration)
        .context("window duration out of range")?;
    let producer = spawn_replay(scenario, seed, window, events_tx, Arc::clone(&running))?;

    let mut writer = match &output {
        Some(path) => Some(BufWriter::new(
            File::options()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening {}", path.display()))?,
        )),
        None => None,
    };

    eprintln!(
        "Monitoring '{scenario}' every {}s over a {}s window. Press Ctrl+C to stop.",
        config.analysis_interval.as_secs(),
        config.window_duration.as_secs()
    );

    let result = monitor.run(&shutdown_rx, |report| {
        emit(&report, writer.as_mut());
        ControlFlow::Continue(())
    });

    running.store(false, Ordering::SeqCst);
    if producer.join().is_err() {
        warn!("replay thread panicked");
    }
    if let Some(mut writer) = writer {
        writer.flush()?;
    }

    result?;

    if let Err(e) = transparency_log.save() {
        warn!(error = %e, "could not save transparency stats");
    }
    eprintln!();
    eprintln!("{}", transparency_log.summary());
    Ok(())
}

/// Print a report as one JSON line, mirroring it to the output file if any.
fn emit(report: &DecisionReport, writer: Option<&mut BufWriter<File>>) {
    let line = match serde_json::to_string(report) {
        Ok(line) => line,
        Err(e) => {
            warn!(error = %e, "could not serialize report");
            return;
        }
    };
    println!("{line}");
    if let Some(writer) = writer {
        if let Err(e) = writeln!(writer, "{line}") {
            warn!(error = %e, "could not write report");
        }
    }
}

/// Replay a scenario in real time, one window after another, until `running`
/// is cleared.
fn spawn_replay(
    scenario: Scenario,
    seed: u64,
    window: chrono::Duration,
    events: Sender<SensorEvent>,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("scenario-replay".to_string())
        .spawn(move || {
            let mut round = 0u64;
            while running.load(Ordering::SeqCst) {
                let end = Utc::now() + window;
                for event in scenario.generate(end, window, seed.wrapping_add(round)) {
                    while running.load(Ordering::SeqCst) && Utc::now() < event.timestamp() {
                        let remaining = (event.timestamp() - Utc::now())
                            .to_std()
                            .unwrap_or_default()
                            .min(Duration::from_millis(100));
                        thread::sleep(remaining);
                    }
                    if !running.load(Ordering::SeqCst) || events.send(event).is_err() {
                        return;
                    }
                }
                // Wait out the rest of the window before the next round
                while running.load(Ordering::SeqCst) && Utc::now() < end {
                    thread::sleep(Duration::from_millis(100));
                }
                round += 1;
            }
        })
        .context("spawning replay thread")?;
    Ok(handle)
}

fn cmd_rules() -> Result<()> {
    let config = Config::load()?;
    let engine = RuleEngine::new(&config.rules)?;

    println!("Detection Rules");
    println!("===============");
    println!();
    println!("{:<28} {:<26} {:>10}", "Rule", "Key", "Threshold");
    for rule in engine.rules() {
        println!(
            "{:<28} {:<26} {:>1} {:>8.2}",
            rule.id().name(),
            rule.id().key(),
            rule.comparison().symbol(),
            rule.threshold()
        );
    }
    println!();
    println!(
        "Windows with fewer than {} events are not judged.",
        engine.min_events()
    );
    println!("Scoring policy: {:?}", config.scoring);
    Ok(())
}

fn cmd_status() -> Result<()> {
    let config = Config::load()?;

    println!("Synheart Activity Sentinel Status");
    println!("=================================");
    println!();
    println!("Configuration:");
    println!("  Subject: {}", config.subject_id);
    println!("  Window duration: {}s", config.window_duration.as_secs());
    println!("  Analysis interval: {}s", config.analysis_interval.as_secs());
    println!(
        "  Store capacities: keyboard {}, pointer {}, window {}",
        config.stores.keyboard_capacity,
        config.stores.pointer_capacity,
        config.stores.window_capacity
    );
    println!();

    let stats_path = config.data_path.join(TRANSPARENCY_FILE);
    if stats_path.exists() {
        let stats = TransparencyLog::with_persistence(stats_path).stats();
        println!("Cumulative Statistics:");
        println!("  Keyboard events: {}", stats.keyboard_events);
        println!("  Pointer events: {}", stats.pointer_events);
        println!("  Window events: {}", stats.window_events);
        println!("  Analyses completed: {}", stats.analyses_completed);
        println!(
            "  Decisions: {} genuine, {} suspicious, {} fake",
            stats.genuine_decisions, stats.suspicious_decisions, stats.fake_decisions
        );
        println!("  Degraded reports: {}", stats.degraded_reports);
    } else {
        println!("No previous session data found.");
    }
    Ok(())
}

fn cmd_config() -> Result<()> {
    let config = Config::load()?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>, shutdown: Sender<()>) {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        let _ = shutdown.try_send(());
    })
    .expect("Error setting Ctrl+C handler");
}
