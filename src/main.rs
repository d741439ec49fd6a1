use axum::{Extension, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use channel_auth::config::OAuthConfig;
use channel_auth::oauth::manager::OAuthManager;
use channel_auth::oauth::provider::GoogleProvider;
use channel_auth::oauth::store::PgCredentialStore;
use channel_auth::{db, handlers, middleware, AppState};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize production-grade logging
    init_logging().expect("Failed to initialize logging");

    // Create the database connection pool and bring the schema up to date
    let db_pool = db::create_pool()
        .await
        .expect("Failed to create database pool.");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations.");

    // Assemble the OAuth lifecycle manager
    let oauth_config = OAuthConfig::from_env();
    if oauth_config.fallback_client.is_some() {
        tracing::info!("✅ Fallback Google OAuth client loaded");
    } else {
        tracing::warn!(
            "No fallback OAuth client. Channels must carry their own client_id/client_secret."
        );
    }

    let provider = Arc::new(GoogleProvider::new(&oauth_config));
    let store = Arc::new(PgCredentialStore::new(db_pool.clone()));
    let oauth = Arc::new(OAuthManager::new(oauth_config, provider, store));

    // Create the shared state
    let shared_state = Arc::new(AppState {
        db_pool,
        oauth: oauth.clone(),
    });

    // Build our application with all routes and shared state
    let app = Router::new()
        .merge(handlers::oauth::oauth_routes())
        .merge(handlers::channels::channel_routes())
        .route("/api/status", axum::routing::get(api_status))
        .layer(axum::middleware::from_fn(
            middleware::logging::request_logging_middleware,
        ))
        .layer(CorsLayer::permissive())
        .layer(Extension(shared_state));

    // Sweep abandoned authorization sessions in the background
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(600)).await;
            oauth.sweep_sessions().await;
        }
    });

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .expect("Failed to bind listen address.");
    tracing::info!("listening on {}", listener.local_addr().expect("local_addr"));
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await
    .expect("Server error.");
}

// Production-grade logging configuration
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Get log level from environment or default to INFO for production
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug,channel_auth=trace,sqlx=info,reqwest=info,hyper=info,tower=info".to_string()
        } else {
            "info,channel_auth=info,sqlx=warn,reqwest=warn,hyper=warn,tower=warn".to_string()
        }
    });

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&log_level))?;

    // Configure structured logging for production
    let fmt_layer = if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        // JSON logging for production (easier for log aggregation)
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed()
    } else {
        // Human-readable logging for development
        fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("🔐 ChannelAuth starting up...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Build mode: {}",
        if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        }
    );

    let db_configured = std::env::var("DATABASE_URL").is_ok();
    let oauth_configured = std::env::var("GOOGLE_OAUTH_CLIENT_ID").is_ok()
        && std::env::var("GOOGLE_OAUTH_CLIENT_SECRET").is_ok();
    tracing::info!(
        "Configuration - Database: {}, Fallback OAuth client: {}",
        if db_configured { "✅" } else { "❌" },
        if oauth_configured { "✅" } else { "❌" }
    );

    Ok(())
}

// API Status endpoint
async fn api_status(
    Extension(state): Extension<Arc<AppState>>,
) -> axum::response::Json<serde_json::Value> {
    use serde_json::json;

    let db_status = match sqlx::query("SELECT 1").fetch_one(&state.db_pool).await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    axum::response::Json(json!({
        "status": "operational",
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "database": db_status
        },
        "endpoints": {
            "status": "/api/status",
            "channels": "/api/channels",
            "oauth": "/api/oauth/*"
        }
    }))
}
