//! Portwatch refresh binary
//!
//! Runs refresh cycles over the feeds listed in `portwatch.toml` and prints
//! each cycle's output as JSON on stdout.
//!
//! # Usage
//!
//! ```bash
//! # One cycle using the default config locations
//! cargo run --bin portwatch-refresh
//!
//! # Explicit config, Peak Season berth plan, refresh every interval
//! cargo run --bin portwatch-refresh -- portwatch.toml --scenario "Peak Season" --watch
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Log level (default: info)

use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;

use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use portwatch::config::PortwatchConfig;
use portwatch::services::refresh::RefreshService;

#[derive(Debug, Default)]
struct Args {
    config_path: Option<PathBuf>,
    scenario: Option<String>,
    watch: bool,
    pretty: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut iter = env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--scenario" | "-s" => {
                let name = iter.next().context("--scenario requires a scenario name")?;
                args.scenario = Some(name);
            }
            "--watch" | "-w" => args.watch = true,
            "--pretty" => args.pretty = true,
            "--help" | "-h" => {
                println!("Usage: portwatch-refresh [CONFIG] [--scenario NAME] [--watch] [--pretty]");
                std::process::exit(0);
            }
            other if other.starts_with('-') => bail!("Unknown option: {}", other),
            path => {
                if args.config_path.is_some() {
                    bail!("Only one config path may be given");
                }
                args.config_path = Some(PathBuf::from(path));
            }
        }
    }

    Ok(args)
}

fn print_cycle(service: &RefreshService, pretty: bool) -> Result<()> {
    let output = service.refresh()?;
    let json = if pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", json);
    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;

    let mut config = match &args.config_path {
        Some(path) => PortwatchConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => PortwatchConfig::from_default_location()?,
    };
    if let Some(scenario) = args.scenario {
        config.refresh.active_scenario = scenario;
    }

    let service = RefreshService::from_config(&config).context("Invalid configuration")?;
    info!(
        "Refreshing {} feed(s), active scenario '{}'",
        service.feed_count(),
        service.options().active_scenario
    );

    if !args.watch {
        return print_cycle(&service, args.pretty);
    }

    let interval = config.interval();
    info!("Watching feeds every {} minute(s)", config.refresh.interval_minutes);
    loop {
        if let Err(e) = print_cycle(&service, args.pretty) {
            error!("Refresh cycle failed: {:#}", e);
        }
        std::thread::sleep(interval);
    }
}
