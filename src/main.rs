use clap::Parser;
use log::{error, info};
use plugwise_bridge::config::{Config, GatewayType, load_dotenv};
use plugwise_bridge::coordinator::UpdateCoordinator;
use plugwise_bridge::error::Result;
use plugwise_bridge::gateway::{GatewayClient, SimulatedGateway};
use plugwise_bridge::publish::{LogPublisher, MqttPublisher, StatePublisher};
use plugwise_bridge::setup::discover_entities;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Bridge Plugwise gateway devices to host entities.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Gateway snapshot document to serve
    #[arg(long, env = "PLUGWISE_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// Gateway type: thermostat, power or stretch
    #[arg(long, env = "PLUGWISE_GATEWAY_TYPE")]
    gateway_type: Option<GatewayType>,

    /// Poll interval in seconds
    #[arg(long, env = "PLUGWISE_SCAN_INTERVAL")]
    scan_interval: Option<u64>,

    /// Publish states to the configured MQTT broker
    #[arg(long)]
    mqtt: bool,

    /// Poll once, print every state as JSON and exit
    #[arg(long)]
    once: bool,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    // Before the runtime starts, while the process is single-threaded.
    load_dotenv();
    init_logger();
    let args = Args::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = runtime.block_on(run(args)) {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    info!("Starting Plugwise bridge");

    let mut config = Config::from_env();
    if let Some(snapshot) = args.snapshot {
        config.gateway.snapshot = snapshot;
    }
    if let Some(gateway_type) = args.gateway_type {
        config.gateway.gateway_type = gateway_type;
    }
    if let Some(interval) = args.scan_interval {
        config.gateway.scan_interval_secs = Some(interval);
    }
    if args.mqtt {
        config.mqtt.enabled = true;
    }
    config.validate()?;

    info!("Configuration loaded:");
    info!("  Snapshot: {}", config.gateway.snapshot.display());
    info!("  Gateway type: {}", config.gateway.gateway_type);
    info!("  Scan interval: {:?}", config.gateway.scan_interval());
    info!(
        "  Temperature bounds: {} - {}",
        config.climate.min_temp, config.climate.max_temp
    );

    let gateway = Arc::new(SimulatedGateway::from_file(&config.gateway.snapshot)?);
    gateway.update().await?;
    let entities = discover_entities(gateway.as_ref(), &config.climate);

    let shutdown = CancellationToken::new();
    let (tx, rx) = mpsc::channel(32);

    let publisher: Arc<dyn StatePublisher> = if config.mqtt.enabled && !args.once {
        let (publisher, listener) = MqttPublisher::connect(&config.mqtt);
        tokio::spawn(listener.run(tx.clone(), shutdown.clone()));
        Arc::new(publisher)
    } else {
        Arc::new(LogPublisher)
    };

    let mut coordinator = UpdateCoordinator::new(
        gateway,
        entities,
        publisher,
        config.gateway.scan_interval(),
    );

    if args.once {
        coordinator.refresh().await?;
        let states = serde_json::to_string_pretty(&coordinator.states())?;
        println!("{}", states);
        return Ok(());
    }

    let coordinator_task = tokio::spawn(coordinator.run(rx, shutdown.clone()));
    info!("Plugwise bridge is running, press Ctrl+C to exit");

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    shutdown.cancel();
    drop(tx);
    if let Err(e) = coordinator_task.await {
        error!("Coordinator task failed: {}", e);
    }

    info!("Plugwise bridge stopped");
    Ok(())
}
