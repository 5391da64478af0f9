// avrlib test application -- CLI tool for exercising a Denon or Marantz
// receiver over its telnet control port.
//
// Usage:
//   avrlib-test-app --host 192.168.1.20 power get
//   avrlib-test-app --host 192.168.1.20 --zone Z2 volume set 35.5
//   avrlib-test-app --host 192.168.1.20 input set MPLAY
//   avrlib-test-app --host 192.168.1.20 zones
//   avrlib-test-app --host 192.168.1.20 raw "PSTONE CTRL ?"
//   avrlib-test-app --host 192.168.1.20 -v stress --count 20
//
// Logging goes to stderr. RUST_LOG overrides the default filter; -v raises
// it to debug and -vv to trace.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

use avrlib::denon::{DenonBuilder, DenonReceiver};
use avrlib::{AvReceiver, ZoneId};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// avrlib test application -- controls a receiver from the command line.
#[derive(Parser)]
#[command(name = "avrlib-test-app", version, about)]
struct Cli {
    /// Receiver host name or IP address (e.g. 192.168.1.20).
    #[arg(long)]
    host: String,

    /// Control port.
    #[arg(long, default_value_t = 23)]
    port: u16,

    /// Zone to address: ZM (main), Z2 .. Z9.
    #[arg(long, default_value = "ZM")]
    zone: ZoneId,

    /// How long to wait for the answer to a query, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    query_timeout_ms: u64,

    /// Connect timeout in milliseconds.
    #[arg(long, default_value_t = 3000)]
    connect_timeout_ms: u64,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Global power (all zones).
    Power {
        #[command(subcommand)]
        action: SwitchAction,
    },

    /// Power of the zone selected with --zone.
    ZonePower {
        #[command(subcommand)]
        action: SwitchAction,
    },

    /// Volume of the zone selected with --zone.
    Volume {
        #[command(subcommand)]
        action: VolumeAction,
    },

    /// Mute of the zone selected with --zone.
    Mute {
        #[command(subcommand)]
        action: SwitchAction,
    },

    /// Input source of the zone selected with --zone.
    Input {
        #[command(subcommand)]
        action: InputAction,
    },

    /// List the zones the receiver has, with their names.
    Zones,

    /// Send a raw protocol command and print every line it produced.
    Raw {
        /// Command text without terminator (e.g. "PW?", "PSTONE CTRL ?").
        text: String,
    },

    /// Stress test: fire many concurrent queries through the command queue.
    Stress {
        /// Number of queries.
        #[arg(long, default_value_t = 20)]
        count: u32,
    },
}

#[derive(Subcommand)]
enum SwitchAction {
    /// Read the current state.
    Get,
    /// Switch on.
    On,
    /// Switch off (standby for global power).
    Off,
}

#[derive(Subcommand)]
enum VolumeAction {
    /// Read the current volume (0-100).
    Get,
    /// Set the volume (0-100, half steps allowed).
    Set {
        /// Target volume, e.g. 45 or 45.5.
        volume: f32,
    },
}

#[derive(Subcommand)]
enum InputAction {
    /// Read the selected input and video source.
    Get,
    /// Select an input by its protocol name.
    Set {
        /// Input name, e.g. MPLAY, TUNER, NET, BD, GAME.
        input: String,
    },
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn on_off(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}

async fn connect(cli: &Cli) -> Result<DenonReceiver> {
    DenonBuilder::new(&cli.host)
        .port(cli.port)
        .connect_timeout(Duration::from_millis(cli.connect_timeout_ms))
        .query_timeout(Duration::from_millis(cli.query_timeout_ms))
        .build()
        .await
        .with_context(|| format!("failed to set up receiver at {}:{}", cli.host, cli.port))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn cmd_power(rx: &dyn AvReceiver, action: &SwitchAction) -> Result<()> {
    match action {
        SwitchAction::Get => {
            let on = rx.get_power().await.context("failed to read power")?;
            println!("Power: {}", if on { "ON" } else { "STANDBY" });
        }
        SwitchAction::On | SwitchAction::Off => {
            let on = matches!(action, SwitchAction::On);
            rx.set_power(on).await.context("failed to set power")?;
            println!("Power: set {}", if on { "ON" } else { "STANDBY" });
        }
    }
    Ok(())
}

async fn cmd_zone_power(rx: &dyn AvReceiver, zone: ZoneId, action: &SwitchAction) -> Result<()> {
    match action {
        SwitchAction::Get => {
            let on = rx
                .get_zone_power(zone)
                .await
                .with_context(|| format!("failed to read {zone} power"))?;
            println!("{zone} power: {}", on_off(on));
        }
        SwitchAction::On | SwitchAction::Off => {
            let on = matches!(action, SwitchAction::On);
            rx.set_zone_power(zone, on)
                .await
                .with_context(|| format!("failed to set {zone} power"))?;
            println!("{zone} power: set {}", on_off(on));
        }
    }
    Ok(())
}

async fn cmd_volume(rx: &dyn AvReceiver, zone: ZoneId, action: &VolumeAction) -> Result<()> {
    match action {
        VolumeAction::Get => {
            let volume = rx
                .get_volume(zone)
                .await
                .with_context(|| format!("failed to read {zone} volume"))?;
            println!("{zone} volume: {volume:.1}");
        }
        VolumeAction::Set { volume } => {
            if !(0.0..=avrlib::MAX_VOLUME).contains(volume) {
                bail!("volume must be between 0 and {}", avrlib::MAX_VOLUME);
            }
            rx.set_volume(zone, *volume)
                .await
                .with_context(|| format!("failed to set {zone} volume"))?;
            println!("{zone} volume: set to {volume:.1}");
        }
    }
    Ok(())
}

async fn cmd_mute(rx: &dyn AvReceiver, zone: ZoneId, action: &SwitchAction) -> Result<()> {
    match action {
        SwitchAction::Get => {
            let muted = rx
                .get_mute(zone)
                .await
                .with_context(|| format!("failed to read {zone} mute"))?;
            println!("{zone} mute: {}", on_off(muted));
        }
        SwitchAction::On | SwitchAction::Off => {
            let muted = matches!(action, SwitchAction::On);
            rx.set_mute(zone, muted)
                .await
                .with_context(|| format!("failed to set {zone} mute"))?;
            println!("{zone} mute: set {}", on_off(muted));
        }
    }
    Ok(())
}

async fn cmd_input(rx: &dyn AvReceiver, zone: ZoneId, action: &InputAction) -> Result<()> {
    match action {
        InputAction::Get => {
            let info = rx
                .get_input_info(zone)
                .await
                .with_context(|| format!("failed to read {zone} input"))?;
            match info.video {
                Some(video) => println!("{zone} input: {} (video: {video})", info.source),
                None => println!("{zone} input: {}", info.source),
            }
        }
        InputAction::Set { input } => {
            rx.set_input(zone, input)
                .await
                .with_context(|| format!("failed to select {zone} input {input}"))?;
            println!("{zone} input: set to {input}");
        }
    }
    Ok(())
}

async fn cmd_zones(rx: &dyn AvReceiver) -> Result<()> {
    let zones = rx.get_zones().await.context("failed to list zones")?;
    if zones.is_empty() {
        println!("No zones reported.");
        return Ok(());
    }
    println!("Zone  Name");
    for (zone, name) in &zones {
        println!("{:<6}{name}", zone.to_string());
    }
    Ok(())
}

async fn cmd_raw(rx: &dyn AvReceiver, text: &str) -> Result<()> {
    let lines = rx
        .command(text)
        .await
        .with_context(|| format!("command {text:?} failed"))?;
    if lines.is_empty() {
        println!("(no response)");
    }
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

/// Issue `count` power queries at once and report how the queue drained.
async fn cmd_stress(rx: Arc<DenonReceiver>, count: u32) -> Result<()> {
    println!("Queueing {count} concurrent power queries...");
    let start = Instant::now();

    let mut set = JoinSet::new();
    for i in 0..count {
        let rx = Arc::clone(&rx);
        set.spawn(async move { (i, rx.get_power().await) });
    }

    let mut ok = 0u32;
    let mut failed = 0u32;
    while let Some(joined) = set.join_next().await {
        let (i, result) = joined.context("stress task panicked")?;
        match result {
            Ok(_) => ok += 1,
            Err(e) => {
                failed += 1;
                eprintln!("  query {i}: {e}");
            }
        }
    }

    let elapsed = start.elapsed();
    println!(
        "{ok} ok, {failed} failed in {:.2}s ({:.1} ms/command)",
        elapsed.as_secs_f64(),
        elapsed.as_secs_f64() * 1000.0 / f64::from(count.max(1))
    );
    if failed > 0 {
        bail!("{failed} of {count} queries failed");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let receiver = Arc::new(connect(&cli).await?);
    tracing::debug!(addr = receiver.address(), zone = %cli.zone, "receiver ready");

    let zone = cli.zone;
    let result = match &cli.command {
        Command::Power { action } => cmd_power(receiver.as_ref(), action).await,
        Command::ZonePower { action } => cmd_zone_power(receiver.as_ref(), zone, action).await,
        Command::Volume { action } => cmd_volume(receiver.as_ref(), zone, action).await,
        Command::Mute { action } => cmd_mute(receiver.as_ref(), zone, action).await,
        Command::Input { action } => cmd_input(receiver.as_ref(), zone, action).await,
        Command::Zones => cmd_zones(receiver.as_ref()).await,
        Command::Raw { text } => cmd_raw(receiver.as_ref(), text).await,
        Command::Stress { count } => cmd_stress(Arc::clone(&receiver), *count).await,
    };

    if let Ok(receiver) = Arc::try_unwrap(receiver) {
        receiver.shutdown().await.ok();
    }
    result
}
