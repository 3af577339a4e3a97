use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pokevalue_core::{
    build_capabilities, load_config, validate_config, ImageValidator, InMemorySubmissionStore,
    LifecycleManager, RetentionPolicy, RetentionSweeper, SqliteSubmissionStore, StoreBackend,
    SubmissionStatus, SubmissionStore, SubmissionUpdateCallback,
};
use pokevalue_server::{api::create_router, state::AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("POKEVALUE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!(
        "LLM provider: {} (model {})",
        config.llm.provider.as_str(),
        config.llm.model
    );

    // Create submission store
    let store: Arc<dyn SubmissionStore> = match config.database.backend {
        StoreBackend::Sqlite => {
            info!("Database path: {:?}", config.database.path);
            Arc::new(
                SqliteSubmissionStore::new(&config.database.path)
                    .context("Failed to create submission store")?,
            )
        }
        StoreBackend::Memory => {
            info!("Using in-memory submission store (contents are lost on restart)");
            Arc::new(InMemorySubmissionStore::new())
        }
    };
    info!("Submission store initialized");

    // Create identification and valuation capabilities
    let capabilities =
        build_capabilities(&config.llm).context("Failed to configure LLM capabilities")?;

    let update_callback: SubmissionUpdateCallback =
        Arc::new(|submission_id: &str, status: SubmissionStatus| {
            debug!(submission_id, %status, "Submission updated");
        });

    let manager = LifecycleManager::new(
        Arc::clone(&store),
        capabilities,
        ImageValidator::from_config(&config.submissions),
        &config.lifecycle,
    )
    .with_update_callback(update_callback);

    // Close submissions a previous process left mid-chain
    if config.lifecycle.reconcile_on_startup {
        let reconciled = manager
            .reconcile_interrupted(config.lifecycle.reconcile_after())
            .context("Failed to reconcile interrupted submissions")?;
        info!("Startup reconciliation closed {} submissions", reconciled);
    }

    // Start retention sweeper if configured
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let sweeper_handle = match RetentionPolicy::from_config(&config.submissions) {
        Some(policy) => {
            info!(
                "Retention enabled: finished submissions are kept for {:?}",
                policy.max_age
            );
            let sweeper = RetentionSweeper::new(
                Arc::clone(&store),
                policy,
                Duration::from_secs(config.submissions.sweep_interval_secs),
            );
            Some(sweeper.spawn(shutdown_tx.subscribe()))
        }
        None => {
            info!("Retention disabled, submissions are kept indefinitely");
            None
        }
    };

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), manager));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");

    // Stop retention sweeper if running
    let _ = shutdown_tx.send(());
    if let Some(handle) = sweeper_handle {
        match handle.await {
            Ok(()) => info!("Retention sweeper stopped"),
            Err(e) => error!("Retention sweeper task failed: {}", e),
        }
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
