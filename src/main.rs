//! Roborock Exporter Binary
//!
//! Serves the vacuum's state as Prometheus metrics, or queries it once.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use prometheus::Registry;
use roborock_exporter::{
    device::miio::MIIO_PORT, metrics::DEFINITIONS, web, DeviceSnapshot, ExporterConfig, Poller,
    RoborockMetrics, RoborockVacuum, WebConfig, DEFAULT_DEVICE_TIMEOUT_SECS,
    DEFAULT_EXPORTER_PORT, DEFAULT_POLLING_INTERVAL_SECS,
};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "roborock_exporter")]
#[command(about = "Prometheus exporter for Roborock vacuums")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = "Polls a Roborock vacuum over the local miIO protocol and serves its state as Prometheus metrics")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Address of the vacuum
    #[arg(long, env = "IP_ADDRESS")]
    ip_address: Option<String>,

    /// Device token, 32 hex characters
    #[arg(long, env = "TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Seconds between two polls
    #[arg(short, long, env = "POLLING_INTERVAL_SECONDS", default_value_t = DEFAULT_POLLING_INTERVAL_SECS)]
    interval: u64,

    /// Metrics server bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Metrics server port
    #[arg(short, long, env = "EXPORTER_PORT", default_value_t = DEFAULT_EXPORTER_PORT)]
    port: u16,

    /// Seconds to wait for each device reply
    #[arg(long, env = "DEVICE_TIMEOUT_SECONDS", default_value_t = DEFAULT_DEVICE_TIMEOUT_SECS)]
    timeout: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve metrics and poll the vacuum (default)
    Serve,

    /// Poll the vacuum once, print the result and exit
    Snapshot(SnapshotArgs),

    /// Show model and firmware of the vacuum
    Info,
}

#[derive(Args)]
struct SnapshotArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    // Validate before any socket is opened
    let config = match ExporterConfig::new(
        cli.ip_address.as_deref(),
        cli.token.as_deref(),
        cli.interval,
        cli.timeout,
        WebConfig::new(&cli.host, cli.port),
    ) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    match &cli.command {
        None | Some(Commands::Serve) => serve_command(config).await,
        Some(Commands::Snapshot(args)) => snapshot_command(config, args).await,
        Some(Commands::Info) => info_command(config).await,
    }
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let directives = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(level, &directives))
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

/// `RUST_LOG` directives win; without any, `level` applies to everything.
fn log_filter(level: Level, directives: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .parse_lossy(directives)
}

fn vacuum(config: &ExporterConfig) -> RoborockVacuum {
    let addr = SocketAddr::new(config.ip_address, MIIO_PORT);
    RoborockVacuum::new(addr, &config.token, config.device_timeout)
}

async fn serve_command(config: ExporterConfig) -> anyhow::Result<()> {
    println!("Roborock Exporter {}", env!("CARGO_PKG_VERSION"));

    let registry = Registry::new();
    let metrics = RoborockMetrics::new(&registry)?;
    info!("Registered {} metrics", DEFINITIONS.len());

    info!("Configuration:");
    info!("  - Vacuum: {}:{}", config.ip_address, MIIO_PORT);
    info!("  - Metrics port: {}", config.web.port);
    info!("  - Polling interval: {}s", config.polling_interval.as_secs());
    info!("  - Device timeout: {}s", config.device_timeout.as_secs());

    let listener = web::bind(&config.web).await?;
    let cancel = CancellationToken::new();
    let mut server = tokio::spawn(web::serve(listener, registry, cancel.clone()));
    tokio::spawn(shutdown_on_ctrl_c(cancel.clone()));

    let mut poller = Poller::new(vacuum(&config), metrics, config.polling_interval);
    tokio::select! {
        () = poller.run(cancel.clone()) => {}
        result = &mut server => {
            cancel.cancel();
            result.context("metrics server task failed")??;
            return Ok(());
        }
    }

    server.await.context("metrics server task failed")??;
    info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown requested");
            cancel.cancel();
        }
        Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
    }
}

async fn snapshot_command(config: ExporterConfig, args: &SnapshotArgs) -> anyhow::Result<()> {
    let metrics = RoborockMetrics::new(&Registry::new())?;
    let mut poller = Poller::new(vacuum(&config), metrics, config.polling_interval);
    let snapshot = poller
        .poll_once()
        .await
        .with_context(|| format!("failed to query vacuum at {}", config.ip_address))?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        OutputFormat::Pretty => print_pretty_snapshot(&snapshot),
    }

    Ok(())
}

async fn info_command(config: ExporterConfig) -> anyhow::Result<()> {
    let mut vacuum = vacuum(&config);
    let info = vacuum
        .info()
        .await
        .with_context(|| format!("failed to query vacuum at {}", vacuum.addr()))?;

    println!("Vacuum at {}", vacuum.addr());
    println!("  Model: {}", info.model);
    println!("  Firmware: {}", info.firmware_version);
    println!("  Hardware: {}", info.hardware_version);
    println!("  MAC: {}", info.mac_address);

    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn print_pretty_snapshot(snapshot: &DeviceSnapshot) {
    println!(
        "Vacuum Snapshot ({})",
        chrono::DateTime::from_timestamp_millis(snapshot.timestamp as i64)
            .unwrap_or_default()
            .format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("==========================================");
    println!();

    let status = &snapshot.status;
    println!("Status:");
    println!("  State: {}", status.state);
    println!("  Battery: {}%", status.battery);
    println!("  Error code: {}", status.error_code);
    println!("  Fan speed: {}", status.fanspeed);
    println!("  Cleaning: {}", yes_no(status.is_on));
    println!("  Paused: {}", yes_no(status.is_paused));
    println!("  Zone cleaning: {}", yes_no(status.in_zone_cleaning));
    println!("  Segment cleaning: {}", yes_no(status.in_segment_cleaning));
    println!(
        "  Last run: {:.2} m2 in {} s",
        status.clean_area,
        status.clean_time.as_secs()
    );
    println!("  Water box attached: {}", yes_no(status.is_water_box_attached));
    println!(
        "  Water box carriage attached: {}",
        yes_no(status.is_water_box_carriage_attached)
    );
    println!("  Water shortage: {}", yes_no(status.is_water_shortage));
    println!();

    let history = &snapshot.history;
    println!("History:");
    println!("  Cleanings: {}", history.count);
    println!("  Dust collections: {}", history.dust_collection_count);
    println!("  Total area: {:.2} m2", history.total_area);
    println!(
        "  Total duration: {:.1} h",
        history.total_duration.as_secs_f64() / 3600.0
    );
    println!();

    let consumables = &snapshot.consumables;
    let hours = |left: std::time::Duration| left.as_secs_f64() / 3600.0;
    println!("Consumables left:");
    println!("  Filter: {:.1} h", hours(consumables.filter_left));
    println!("  Main brush: {:.1} h", hours(consumables.main_brush_left));
    println!("  Side brush: {:.1} h", hours(consumables.side_brush_left));
    println!("  Sensors: {:.1} h", hours(consumables.sensor_dirty_left));
}
