use rim_server::{
    app::{self, AccessOptions, AppState, Backends},
    config::ServerConfig,
    db::{PgDirectory, PgSettings, PgUserRepository},
    session_store::RedisSessionStore,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!(?config, "Loaded configuration");

    // Create database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("failed to run migrations");

    tracing::info!("Connecting to session store...");
    let sessions = RedisSessionStore::connect(&config.redis_url)
        .await
        .expect("failed to connect to redis");

    let directory = Arc::new(PgDirectory::new(db_pool.clone()));
    let backends = Backends {
        sessions: Arc::new(sessions),
        users: Arc::new(PgUserRepository::new(db_pool.clone())),
        settings: Arc::new(PgSettings::new(db_pool)),
        contacts: directory.clone(),
        groups: directory.clone(),
        lookup: directory,
    };
    let options = AccessOptions {
        bot_token: config.bot_token.clone(),
        force_debug: config.debug_mode,
        admin_group: config.admin_group(),
        policy: config.session.policy(),
        secure_cookies: config.session.secure_cookies,
    };

    let state = Arc::new(AppState::new(backends, options));
    state
        .system
        .ensure_initialized()
        .await
        .expect("failed to initialize system settings");

    let app = app::router(state, &config.cors_origins());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.listen_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
