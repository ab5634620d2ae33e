//! zone-clock CLI
//!
//! Lists the zones a time service accepts, or runs a live clock for one of
//! them in the terminal.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use zone_clock::{
    ClockConfig, ClockHandle, ClockSnapshot, HttpOffsetResolver, RunMode, RuntimeError,
    SyncHealth, TimezoneId,
};

#[derive(Parser)]
#[command(name = "zone-clock")]
#[command(author, version, about = "Remote-synchronized timezone clock", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Time service root, overriding the configuration
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the zones the time service accepts
    Zones,

    /// Run a live clock (p = pause/resume, tz <zone> = switch, q = quit)
    Watch {
        /// Zone to start with (default: from configuration)
        #[arg(long, short)]
        timezone: Option<String>,
    },
}

fn load_config(cli: &Cli) -> Result<ClockConfig> {
    let mut config = match &cli.config {
        Some(path) => ClockConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ClockConfig::default(),
    };
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn render(snapshot: &ClockSnapshot) -> String {
    let zone = snapshot
        .timezone
        .as_ref()
        .map(|tz| tz.to_string())
        .unwrap_or_else(|| "-".to_string());

    let time = match (snapshot.display_text(), snapshot.sync_health) {
        (Some(text), _) => text,
        (None, SyncHealth::ResolveFailed) => "unavailable".to_string(),
        (None, _) if snapshot.run_mode == RunMode::Resolving => "loading...".to_string(),
        (None, _) => "--:--:--".to_string(),
    };

    let mut line = format!("{} {}", zone, time);
    if snapshot.run_mode == RunMode::Paused {
        line.push_str(" [paused]");
    }
    if snapshot.sync_health == SyncHealth::Stale {
        line.push_str(" (stale)");
    }
    line
}

async fn handle_input<R>(clock: &ClockHandle<R>, line: &str) -> Result<bool>
where
    R: zone_clock::OffsetResolver<tokio::time::Instant>,
{
    let line = line.trim();
    let outcome = match line.split_once(' ') {
        _ if line == "q" => return Ok(false),
        _ if line == "p" => clock.toggle().await,
        Some(("tz", zone)) => match TimezoneId::new(zone.trim()) {
            Ok(zone) => clock.select_timezone(zone).await,
            Err(err) => {
                eprintln!("{}", err);
                return Ok(true);
            }
        },
        _ if line.is_empty() => return Ok(true),
        _ => {
            eprintln!("commands: p | tz <zone> | q");
            return Ok(true);
        }
    };

    match outcome {
        Ok(()) => Ok(true),
        Err(RuntimeError::Engine(err)) => {
            eprintln!("{}", err);
            Ok(true)
        }
        Err(err) => Err(err.into()),
    }
}

async fn watch(config: ClockConfig, timezone: Option<String>) -> Result<()> {
    let zone = timezone.unwrap_or_else(|| config.default_timezone.clone());
    let zone = TimezoneId::new(zone).context("Invalid timezone")?;

    let resolver = HttpOffsetResolver::from_config(&config).context("Failed to build resolver")?;
    let clock = ClockHandle::spawn(&config, resolver);
    clock.select_timezone(zone).await?;

    let mut snapshots = clock.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", render(&snapshots.borrow_and_update()));
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("{}", render(&snapshots.borrow_and_update()));
            }
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(line) => {
                        if !handle_input(&clock, &line).await? {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    clock.dispose().await?;
    Ok(())
}

async fn zones(config: ClockConfig) -> Result<()> {
    let resolver = HttpOffsetResolver::from_config(&config).context("Failed to build resolver")?;
    let clock = ClockHandle::spawn(&config, resolver);
    let zones = clock
        .list_timezones()
        .await
        .context("Failed to list timezones")?;
    for zone in zones {
        println!("{}", zone);
    }
    clock.dispose().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Zones => zones(config).await,
        Commands::Watch { timezone } => watch(config, timezone).await,
    }
}
