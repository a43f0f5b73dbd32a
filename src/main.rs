use project_portal::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{MongoRepository, RepositoryState},
    schema,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Boots the portal: configuration, logging, the MongoDB connection, model
/// registration, then the HTTP server. Any startup failure terminates the process.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading
    dotenv::dotenv().ok();
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // 2. Logging. RUST_LOG wins over the defaults.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "project_portal=debug,tower_http=info".into());

    match config.env {
        Env::Development => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);
    if config.uses_placeholder_secret() {
        tracing::warn!("SESSION_SECRET is not set; signing sessions with the placeholder secret");
    }

    // 3. Database connection
    let repo = match MongoRepository::connect(&config.mongodb_uri).await {
        Ok(repo) => {
            tracing::info!("MongoDB Connected");
            repo
        }
        Err(e) => {
            tracing::error!("MongoDB Connection Error: {}", e);
            std::process::exit(1);
        }
    };

    // 4. Model registration, in dependency order.
    match schema::register_schemas(repo.database()).await {
        Ok(models) => tracing::info!(models = ?models, "Registered Models"),
        Err(e) => {
            tracing::error!("Model registration failed: {}", e);
            std::process::exit(1);
        }
    }

    // 5. State assembly
    let app_state = match AppState::new(Arc::new(repo) as RepositoryState, config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Template compilation failed: {}", e);
            std::process::exit(1);
        }
    };
    let port = app_state.config.port;

    // 6. Router and Server Startup
    let app = create_router(app_state);

    let listener = match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind port {}: {}", port, e);
            std::process::exit(1);
        }
    };
    tracing::info!("Server running on port {}", port);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received, draining connections");
}
