use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use charades_core::{CategoryWordBank, WordBank};
use charades_server::{
    config::Config, create_routes, registry::RoomRegistry,
    websocket::{ConnectionManager, RateLimiter},
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting charades server...");

    let config = Config::new();
    let connection_manager = Arc::new(ConnectionManager::new());

    let word_bank: Arc<dyn WordBank> = match &config.words_directory {
        Some(words_dir) => {
            info!("Loading words from directory: {}", words_dir);
            match CategoryWordBank::from_directory(words_dir) {
                Ok(bank) => Arc::new(bank),
                Err(e) => {
                    tracing::error!("Failed to load words from directory '{}': {:#}", words_dir, e);
                    tracing::error!("Unset WORDS_DIRECTORY to use the built-in word lists.");
                    std::process::exit(1);
                }
            }
        }
        None => {
            info!("WORDS_DIRECTORY not set, using built-in word lists");
            Arc::new(CategoryWordBank::builtin())
        }
    };

    let registry = Arc::new(RoomRegistry::new(
        config.game_settings(),
        word_bank,
        connection_manager.clone(),
    ));

    let routes = create_routes(
        registry.clone(),
        RateLimiter::new_with_limits(config.rate_limit_burst, config.rate_limit_per_second),
    );

    // Start cleanup task
    let cleanup_registry = registry.clone();
    let cleanup_interval = config.cleanup_interval();
    let connection_timeout = config.connection_timeout();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_interval);
        loop {
            interval.tick().await;
            let evicted = cleanup_registry.evict_idle(connection_timeout).await;
            if evicted > 0 {
                info!(
                    "Evicted {} idle players, {} rooms open",
                    evicted,
                    cleanup_registry.room_count()
                );
            }
        }
    });

    info!("Server starting on {}:{}", config.host, config.port);

    let host = match config.host.parse::<std::net::IpAddr>() {
        Ok(host) => host,
        Err(e) => {
            tracing::error!("Invalid HOST '{}': {}", config.host, e);
            std::process::exit(1);
        }
    };

    let (addr, server) =
        warp::serve(routes).bind_with_graceful_shutdown((host, config.port), shutdown_signal());

    info!("Server started successfully on {}. Press Ctrl+C to stop.", addr);
    server.await;
    info!("Server shutdown complete.");
}

/// Resolves on SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .expect("Failed to listen for SIGINT");
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to listen for SIGTERM");

        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.expect("Failed to listen for ctrl+c");
        info!("Received Ctrl+C, shutting down gracefully...");
    }
}
