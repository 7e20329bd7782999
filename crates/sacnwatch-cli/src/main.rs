use std::io::{self, Write};
use std::ops::RangeInclusive;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use sacnwatch_core::{
    MonitorSnapshot, Receiver, ReceiverConfig, ReceiverError, SACN_PORT, SnapshotOptions,
    StatsTracker, UniverseManager, build_snapshot, now_rfc3339, spawn_ingest,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("SACNWATCH_BUILD_COMMIT"),
    " ",
    env!("SACNWATCH_BUILD_DATE"),
    ")"
);

const EXAMPLES: &str = "Examples:\n  sacnwatch listen\n  sacnwatch listen --universes 1-4 --json --duration-secs 10\n  sacnwatch -v listen --prune-stale --stale-secs 10";

#[derive(Parser, Debug)]
#[command(name = "sacnwatch")]
#[command(version, long_version = LONG_VERSION)]
#[command(
    about = "Live monitor for E1.31 (sACN) lighting-control traffic.",
    long_about = None,
    after_help = EXAMPLES
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Receive sACN from the network and print universe status periodically.
    Listen {
        /// UDP port to bind
        #[arg(long, default_value_t = SACN_PORT)]
        port: u16,

        /// Universes whose multicast groups are joined, e.g. `1-63` or `7`
        #[arg(long, default_value = "1-63", value_parser = parse_universe_range)]
        universes: RangeInclusive<u16>,

        /// Refresh interval in milliseconds
        #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(10..))]
        interval_ms: u64,

        /// Seconds without packets before a universe counts as stale
        #[arg(long, default_value_t = 5)]
        stale_secs: u64,

        /// Drop stale universes from the display
        #[arg(long)]
        prune_stale: bool,

        /// Emit one JSON snapshot per line instead of a table
        #[arg(long)]
        json: bool,

        /// Include channel levels in JSON snapshots
        #[arg(long, requires = "json")]
        include_channels: bool,

        /// Stop after this many seconds (runs until Ctrl-C otherwise)
        #[arg(long)]
        duration_secs: Option<u64>,

        /// Decoded packets buffered before new ones are dropped
        #[arg(long, default_value_t = 1000)]
        queue_capacity: usize,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Listen {
            port,
            universes,
            interval_ms,
            stale_secs,
            prune_stale,
            json,
            include_channels,
            duration_secs,
            queue_capacity,
        } => cmd_listen(ListenArgs {
            receiver: ReceiverConfig {
                port,
                join_universes: universes,
                queue_capacity,
                ..ReceiverConfig::default()
            },
            interval: Duration::from_millis(interval_ms),
            stale_timeout: Duration::from_secs(stale_secs),
            prune_stale,
            json,
            include_channels,
            duration: duration_secs.map(Duration::from_secs),
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {}", err.message);
            if let Some(hint) = err.hint {
                eprintln!("hint: {}", hint);
            }
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

#[derive(Debug)]
struct CliError {
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::new(format!("{err:#}"), None)
    }
}

struct ListenArgs {
    receiver: ReceiverConfig,
    interval: Duration,
    stale_timeout: Duration,
    prune_stale: bool,
    json: bool,
    include_channels: bool,
    duration: Option<Duration>,
}

fn cmd_listen(args: ListenArgs) -> Result<(), CliError> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
        .context("Failed to install Ctrl-C handler")?;

    let port = args.receiver.port;
    let receiver = Receiver::new(args.receiver);
    receiver.start().map_err(|err| {
        if matches!(err, ReceiverError::Bind { .. }) {
            CliError::new(
                err.to_string(),
                Some(format!("is another listener holding UDP {port}? try --port")),
            )
        } else {
            CliError::new(format!("failed to start receiver: {err}"), None)
        }
    })?;

    let universes = Arc::new(UniverseManager::new());
    let stats = Arc::new(StatsTracker::new());
    let ingest = spawn_ingest(receiver.packets(), Arc::clone(&universes), Arc::clone(&stats))
        .context("Failed to spawn ingestion thread")?;

    let options = SnapshotOptions {
        stale_timeout: args.stale_timeout,
        include_channels: args.include_channels,
        ..SnapshotOptions::default()
    };
    let deadline = args.duration.map(|d| Instant::now() + d);
    let mut out = io::stdout().lock();
    let mut result = Ok(());

    while wait_tick(&running, args.interval, deadline) {
        if args.prune_stale {
            universes.prune_stale(args.stale_timeout);
        }
        let mut snapshot = build_snapshot(
            &universes,
            &stats,
            &SnapshotOptions {
                generated_at: now_rfc3339(),
                ..options.clone()
            },
            Instant::now(),
        );
        snapshot.dropped_packets = Some(receiver.dropped_packets());

        let written = if args.json {
            serde_json::to_string(&snapshot)
                .context("JSON serialization failed")
                .and_then(|line| writeln!(out, "{line}").context("Failed to write snapshot"))
        } else {
            write_table(&mut out, &snapshot).context("Failed to write table")
        };
        if let Err(err) = written.and_then(|()| out.flush().context("Failed to flush output")) {
            result = Err(err.into());
            break;
        }
    }

    receiver.stop();
    match ingest.join() {
        Ok(Ok(applied)) => info!(applied, "listener finished"),
        Ok(Err(err)) => warn!(error = %err, "ingestion ended with an error"),
        Err(_) => warn!("ingestion thread panicked"),
    }
    result
}

/// Sleep until the next tick. Returns false once Ctrl-C was pressed or the
/// deadline passed.
fn wait_tick(running: &AtomicBool, interval: Duration, deadline: Option<Instant>) -> bool {
    const STEP: Duration = Duration::from_millis(50);
    let tick = Instant::now() + interval;
    loop {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if deadline.is_some_and(|d| now >= d) {
            return false;
        }
        if now >= tick {
            return true;
        }
        thread::sleep(STEP.min(tick - now));
    }
}

fn write_table(out: &mut impl Write, snapshot: &MonitorSnapshot) -> io::Result<()> {
    writeln!(out, "{}", snapshot.generated_at)?;
    writeln!(
        out,
        "{:>5}  {:<24} {:>3} {:>9} {:>7} {:>6} {:>7} {:>6}  {}",
        "UNIV", "SOURCE", "PRI", "PACKETS", "PPS", "LOSS%", "RECENT%", "ACTIVE", "STATE"
    )?;
    for universe in &snapshot.universes {
        writeln!(
            out,
            "{:>5}  {:<24} {:>3} {:>9} {:>7.1} {:>6.2} {:>7.2} {:>6}  {}",
            universe.universe,
            truncate(&universe.source_name, 24),
            universe.priority,
            universe.packets_total,
            universe.packets_per_second,
            universe.loss_percent,
            universe.recent_loss_percent,
            universe.active_channels,
            if universe.stale { "stale" } else { "live" },
        )?;
    }
    if snapshot.universes.is_empty() {
        writeln!(out, "  (no universes seen yet)")?;
    }
    if let Some(dropped) = snapshot.dropped_packets.filter(|&n| n > 0) {
        writeln!(out, "  queue overflow: {dropped} packets dropped")?;
    }
    writeln!(out)
}

fn truncate(name: &str, max: usize) -> String {
    name.chars().take(max).collect()
}

fn parse_universe_range(value: &str) -> Result<RangeInclusive<u16>, String> {
    let parse = |s: &str| {
        s.trim()
            .parse::<u16>()
            .map_err(|_| format!("'{s}' is not a universe number"))
    };
    let range = match value.split_once('-') {
        Some((start, end)) => parse(start)?..=parse(end)?,
        None => {
            let single = parse(value)?;
            single..=single
        }
    };
    if range.is_empty() {
        return Err(format!("empty universe range '{value}'"));
    }
    Ok(range)
}
