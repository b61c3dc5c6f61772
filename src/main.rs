use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use clashtrack::api::{routes, SharedStore};
use clashtrack::backend::{BackendClient, ConnectionPoller};
use clashtrack::engine::ConnectionStore;
use clashtrack::latency::LatencyTester;
use clashtrack::models::config::{AppConfig, DEFAULT_LATENCY_TEST_URL};
use clashtrack::storage::{FileStore, KeyValueStore, MemoryStore};
use clashtrack::utils::logging;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Real-time connection tracking for Clash/Mihomo backends")]
struct Args {
    /// Base URL of the backend's external controller
    #[clap(short, long, default_value = "http://127.0.0.1:9090")]
    backend: String,

    /// Secret of the backend's external controller
    #[clap(short, long)]
    secret: Option<String>,

    /// Port for the REST API server
    #[clap(short, long, default_value = "3000")]
    port: u16,

    /// Connection polling interval in milliseconds
    #[clap(long, default_value = "1000")]
    poll_interval: u64,

    /// Directory for persisted data usage
    #[clap(long, default_value = "data")]
    data_dir: PathBuf,

    /// Do not persist data usage
    #[clap(long)]
    ephemeral: bool,

    /// URL probed by latency tests
    #[clap(long, default_value = DEFAULT_LATENCY_TEST_URL)]
    latency_url: String,

    /// Latency test timeout in milliseconds
    #[clap(long, default_value = "5000")]
    latency_timeout: u64,

    /// Log level (trace, debug, info, warn, error, off)
    #[clap(long, default_value = "info")]
    log_level: String,
}

#[actix_web::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger with specified level
    logging::init_logger(logging::get_log_level(&args.log_level));

    info!("Starting clashtrack v{}", env!("CARGO_PKG_VERSION"));

    // Create application config
    let config = AppConfig {
        backend_url: args.backend,
        secret: args.secret,
        port: args.port,
        poll_interval_ms: args.poll_interval.max(100),
        data_dir: args.data_dir,
        ephemeral: args.ephemeral,
        latency_test_url: args.latency_url,
        latency_timeout_ms: args.latency_timeout,
    };

    let storage: Arc<dyn KeyValueStore> = if config.ephemeral {
        info!("Running without persistence");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(
            FileStore::open(&config.data_dir)
                .with_context(|| format!("Failed to open data directory {:?}", config.data_dir))?,
        )
    };

    let client = BackendClient::new(&config.backend_url, config.secret.as_deref())
        .context("Failed to create backend client")?;

    // Shared state
    let store: SharedStore = Arc::new(RwLock::new(ConnectionStore::new(storage)));
    let tester = LatencyTester::new(Arc::new(client.clone()));

    // Start feeding the store
    let poller = ConnectionPoller::new(
        client.clone(),
        store.clone(),
        Duration::from_millis(config.poll_interval_ms),
    );
    let poller_running = poller.running_flag();
    let poller_task = tokio::spawn(poller.run());

    let store_data = web::Data::new(store);
    let client_data = web::Data::new(client);
    let tester_data = web::Data::new(tester);
    let config_data = web::Data::new(config.clone());

    info!("Starting clashtrack API server on port {}", config.port);

    // Start the HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(store_data.clone())
            .app_data(client_data.clone())
            .app_data(tester_data.clone())
            .app_data(config_data.clone())
            .configure(routes::configure)
    })
    .bind(format!("127.0.0.1:{}", config.port))?
    .run()
    .await?;

    // Server stopped, stop polling too
    poller_running.store(false, Ordering::SeqCst);
    poller_task.abort();
    info!("Shut down");

    Ok(())
}
