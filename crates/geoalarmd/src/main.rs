//! geoalarmd - location alarm service
//!
//! Wires together:
//! - Configuration loading
//! - Store initialization
//! - Core engine
//! - Console host adapters (position feed, notifier, bell)
//! - NDJSON event output on stdout

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use geoalarm_api::{Coordinate, Event, ZoneView};
use geoalarm_config::{Settings, load_config_or_default};
use geoalarm_core::{CoreEngine, ZoneChange};
use geoalarm_host_api::{AlarmSink, AlertRefresher};
use geoalarm_store::{SqliteStore, ZoneStore};
use geoalarm_util::{ZoneId, default_config_path, format_datetime_full};
use geoalarmd::Service;
use geoalarmd::host::{ConsoleNotifier, NdjsonPositionSource, TerminalBell};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Time between bell rings while a zone is ringing
const BELL_PERIOD: Duration = Duration::from_secs(2);

/// geoalarmd - Rings when you arrive somewhere
#[derive(Parser, Debug)]
#[command(name = "geoalarmd")]
#[command(about = "Location alarm: rings when you enter a zone", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/geoalarm/config.toml)
    #[arg(short, long, env = "GEOALARM_CONFIG", default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set GEOALARM_DATA_DIR env var)
    #[arg(short, long, env = "GEOALARM_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a position feed and ring on arrival
    Run {
        /// NDJSON position samples (default: stdin)
        #[arg(short, long)]
        positions: Option<PathBuf>,

        /// Exit when the position feed ends instead of waiting for a signal
        #[arg(long)]
        exit_on_end: bool,
    },

    /// Manage zones
    #[command(subcommand)]
    Zones(ZoneCommand),

    /// Show recent audit events
    Audit {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Subcommand, Debug)]
enum ZoneCommand {
    /// List zones and their state
    List,

    /// Create an armed zone
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
        /// Radius in meters
        #[arg(long, default_value_t = 500.0)]
        radius: f64,
    },

    Rename { id: String, name: String },

    /// Change the radius in meters
    Resize { id: String, meters: f64 },

    /// Recreate the zone at a new center (the zone gets a new id)
    Move {
        id: String,
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
    },

    Enable { id: String },

    Disable { id: String },

    /// Dismiss a ringing zone (switches it off)
    Stop { id: String },

    /// Silence a ringing zone for a while
    Snooze {
        id: String,
        /// Snooze length (default from config)
        #[arg(long)]
        seconds: Option<u64>,
    },

    Remove { id: String },
}

fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = load_config_or_default(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    if let Some(data_dir) = &args.data_dir {
        settings.service.data_dir = data_dir.clone();
    }

    info!(
        config_path = %args.config.display(),
        seed_zones = settings.seed_zones.len(),
        "Configuration loaded"
    );

    Ok(settings)
}

fn open_store(settings: &Settings) -> Result<Arc<dyn ZoneStore>> {
    let data_dir = &settings.service.data_dir;
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

    let db_path = settings.service.database_path();
    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open database {:?}", db_path))?;

    info!(db_path = %db_path.display(), "Store initialized");
    Ok(Arc::new(store))
}

async fn run(
    settings: Settings,
    store: Arc<dyn ZoneStore>,
    positions: Option<PathBuf>,
    exit_on_end: bool,
) -> Result<()> {
    let source = match positions {
        Some(path) => NdjsonPositionSource::open(&path)
            .with_context(|| format!("Failed to open position feed {:?}", path))?,
        None => NdjsonPositionSource::stdin(),
    };

    let refresher = Arc::new(AlertRefresher::new(settings.alarm.refresh_interval));
    let alarm = Arc::new(AlarmSink::new(
        Arc::new(ConsoleNotifier::new()),
        Arc::new(TerminalBell::new(BELL_PERIOD)),
        refresher.clone(),
    ));
    let refresh_task = refresher.spawn(alarm.clone());

    // NDJSON events on stdout
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(event) = event_rx.recv().await {
            let mut line = match serde_json::to_string(&event) {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize event");
                    continue;
                }
            };
            line.push('\n');
            if let Err(e) = stdout.write_all(line.as_bytes()).await {
                warn!(error = %e, "Failed to write event");
                break;
            }
            let _ = stdout.flush().await;
        }
    });

    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
    let shutdown = async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
        }
    };

    let engine = CoreEngine::new(settings, store);
    let mut service =
        Service::new(engine, alarm.clone(), event_tx).exit_on_source_end(exit_on_end);
    service.start().await?;
    service.run(&source, shutdown).await?;

    if let Some(task) = refresh_task {
        task.abort();
    }
    alarm.silence_all();

    // The service dropped its sender; drain what is left
    if let Err(e) = writer.await {
        warn!(error = %e, "Event writer task failed");
    }

    Ok(())
}

fn print_zone(view: &ZoneView) {
    let mut line = format!(
        "{}  {:<20} {:<8} {} r={}m",
        view.zone_id, view.name, view.state, view.center, view.radius_meters
    );
    if let Some(until) = &view.snoozed_until {
        line.push_str(&format!(" until {}", format_datetime_full(until)));
    }
    if let Some(distance) = view.distance_meters {
        line.push_str(&format!(" ({:.0}m away)", distance));
    }
    println!("{}", line);
}

fn print_change(change: &ZoneChange) {
    let zone = &change.zone;
    println!(
        "{}  {} {} r={}m [{}]",
        zone.id,
        zone.name,
        zone.center,
        zone.radius_meters,
        zone.state(geoalarm_util::now())
    );
}

fn zones(engine: &CoreEngine, command: ZoneCommand) -> Result<()> {
    let now = geoalarm_util::now();

    let change = match command {
        ZoneCommand::List => {
            let views = engine.list_zones(now)?;
            if views.is_empty() {
                println!("No zones");
            }
            for view in &views {
                print_zone(view);
            }
            return Ok(());
        }
        ZoneCommand::Add {
            name,
            lat,
            lng,
            radius,
        } => engine.create_zone(&name, Coordinate::new(lat, lng), radius)?,
        ZoneCommand::Rename { id, name } => engine.rename_zone(&ZoneId::new(id), &name)?,
        ZoneCommand::Resize { id, meters } => engine.resize_zone(&ZoneId::new(id), meters)?,
        ZoneCommand::Move { id, lat, lng } => {
            engine.move_zone(&ZoneId::new(id), Coordinate::new(lat, lng))?
        }
        ZoneCommand::Enable { id } => engine.set_active(&ZoneId::new(id), true)?,
        ZoneCommand::Disable { id } => engine.set_active(&ZoneId::new(id), false)?,
        ZoneCommand::Stop { id } => engine.stop_zone(&ZoneId::new(id))?,
        ZoneCommand::Snooze { id, seconds } => engine.snooze_zone(
            &ZoneId::new(id),
            seconds.map(Duration::from_secs),
            now,
        )?,
        ZoneCommand::Remove { id } => {
            let change = engine.delete_zone(&ZoneId::new(id))?;
            println!("Removed {} ({})", change.zone.id, change.zone.name);
            return Ok(());
        }
    };

    print_change(&change);
    Ok(())
}

fn audit(engine: &CoreEngine, limit: usize) -> Result<()> {
    for event in engine.recent_audits(limit)? {
        let detail = serde_json::to_string(&event.event)?;
        println!(
            "{:>6}  {}  {}",
            event.id,
            format_datetime_full(&event.timestamp),
            detail
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the event stream
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "geoalarmd starting");

    let settings = load_settings(&args)?;
    let store = open_store(&settings)?;

    match args.command {
        Command::Run {
            positions,
            exit_on_end,
        } => run(settings, store, positions, exit_on_end).await,
        Command::Zones(command) => zones(&CoreEngine::new(settings, store), command),
        Command::Audit { limit } => audit(&CoreEngine::new(settings, store), limit),
    }
}
