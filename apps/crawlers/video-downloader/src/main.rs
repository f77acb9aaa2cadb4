//! Video Downloader Worker - Entry Point
//!
//! Crawler worker that consumes ready-to-process orders for its
//! (service, provider) identity, downloads the referenced videos and
//! uploads them to the object store, feeding results back onto the
//! services exchange.

use amqp_broker::BrokerConnection;
use clap::Parser;
use config_vault_client::ConfigVaultClient;
use core_config::discovery::ServiceDiscovery;
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::{Environment, FromEnv, WorkerIdentity, env_or_default};
use event_worker::{
    DebugSink, EventController, EventPublisher, HandlerRegistry, HealthState, InFlightCounter,
    Listener, ListenerSupervisor, SchemaStore, loader, metrics, serve_health,
};
use eyre::{Result, WrapErr};
use object_store_client::MinioStore;
use schema_vault_client::SchemaVaultClient;
use std::sync::Arc;
use tracing::{error, info, warn};
use video_downloader_job::{HttpVideoFetcher, VideoDownloaderFactory};

#[derive(Parser)]
#[command(name = "video-downloader")]
#[command(about = "Message-driven crawler worker: download videos, upload to object storage")]
struct Cli {
    /// Enable on-disk capture of intermediate artifacts
    #[arg(long, default_value_t = false)]
    enable_debug_storage: bool,

    /// Base directory for debug storage
    #[arg(long, default_value = "/app/tests/debug/storage")]
    debug_storage_dir: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let environment = Environment::from_env();
    init_tracing(&environment);
    metrics::init_metrics();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!(error = %e, "Worker terminated with error");
        return Err(e);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let identity = WorkerIdentity::from_env()?;
    info!(
        service = %identity.service,
        provider = %identity.provider,
        "Starting worker"
    );

    // CLI flag wins; otherwise fall back to the environment toggles.
    let debug_enabled = cli.enable_debug_storage
        || env_or_default("DEBUG_STORAGE_ENABLED", "false").eq_ignore_ascii_case("true");
    let debug_dir = if cli.enable_debug_storage {
        cli.debug_storage_dir
    } else {
        env_or_default("DEBUG_STORAGE_DIR", "/app/tests/debug/storage")
    };
    let debug = Arc::new(
        DebugSink::new(debug_enabled, &debug_dir).wrap_err("failed to set up debug storage")?,
    );

    let sd = ServiceDiscovery::from_env();
    let config_vault = Arc::new(ConfigVaultClient::from_discovery(&sd)?);
    let schema_vault: Arc<dyn SchemaStore> = Arc::new(SchemaVaultClient::from_discovery(&sd)?);
    let store = Arc::new(MinioStore::from_discovery(&sd)?);

    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(VideoDownloaderFactory::new(
        Arc::new(HttpVideoFetcher::new()),
        store,
    )))?;

    let configs = loader::fetch_configs(config_vault, &identity.service, &identity.provider)
        .await
        .wrap_err("failed to load configs from the vault")?;
    if configs.is_empty() {
        warn!("No configs registered for this worker; nothing to consume");
    }

    // Resolve every parser module before any message flows. Unknown names
    // are a startup failure, never a message-time one.
    for config in configs.values() {
        registry.resolve(&config.job_parameters.parser_module)?;
    }

    let connection = BrokerConnection::connect(&sd.rabbitmq_endpoint()?).await?;
    let exchange = sd.services_exchange();
    let in_flight = Arc::new(InFlightCounter::new(configs.len().max(1)));

    // Pause between output validation and feedback publish, off by default.
    let feedback_delay_secs: u64 = env_or_default("FEEDBACK_PUBLISH_DELAY_SECS", "0")
        .parse()
        .wrap_err("FEEDBACK_PUBLISH_DELAY_SECS is not a valid number of seconds")?;
    let feedback_delay = std::time::Duration::from_secs(feedback_delay_secs);

    let mut supervisor = ListenerSupervisor::new();
    for config in configs.into_values() {
        info!(config_id = %config.config_id, "Creating listener for config");
        let factory = registry.resolve(&config.job_parameters.parser_module)?;

        let mut publish_channel = connection.create_channel().await?;
        publish_channel.declare_exchange(exchange).await?;
        let publisher: Arc<dyn EventPublisher> = Arc::new(publish_channel);

        let controller = EventController::new(
            config.clone(),
            factory,
            Arc::clone(&schema_vault),
            publisher,
            Arc::clone(&in_flight),
            Arc::clone(&debug),
        )
        .with_feedback_delay(feedback_delay);
        let listener = Listener::bind(&connection, exchange, &config, controller).await?;
        supervisor.spawn(listener);
    }

    let health_state = HealthState {
        service: identity.service.clone(),
        provider: identity.provider.clone(),
        listeners: supervisor.listener_count(),
        in_flight: Arc::clone(&in_flight),
    };
    let health_port: u16 = env_or_default("HEALTH_PORT", "8080")
        .parse()
        .wrap_err("HEALTH_PORT is not a valid port number")?;
    tokio::spawn(async move {
        if let Err(e) = serve_health(health_port, health_state).await {
            warn!(error = %e, "Health endpoint server stopped");
        }
    });

    let shutdown = supervisor.shutdown_handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received termination signal, shutting down listeners");
        let _ = shutdown.send(true);
    });

    supervisor.join().await?;

    // Connection goes last, after every listener has closed its channel.
    connection.close().await?;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
