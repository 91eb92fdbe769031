//! Bookclub Server - community book sharing
//!
//! REST API for shelves, clubs, lending, direct messages and cover analysis.

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use bookclub_server::{
    api,
    config::{AppConfig, LoggingConfig},
    repository::Repository,
    services::{redis::RedisService, Services},
    AppState,
};

/// Multipart framing overhead allowed on top of the image size limit
const BODY_LIMIT_SLACK: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_tracing(&config.logging);

    tracing::info!("Starting Bookclub Server v{}", env!("CARGO_PKG_VERSION"));

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!("Database migrations completed");

    let redis = RedisService::new(&config.redis.url).await?;

    tracing::info!("Connected to Redis");

    let repository = Repository::new(pool);
    let services = Services::new(repository, &config, redis)?;

    let providers = services.covers.provider_names();
    if providers.is_empty() {
        tracing::warn!("No vision provider configured, cover analysis will return empty results");
    } else {
        tracing::info!("Cover analysis strands: {}", providers.join(", "));
    }

    tokio::fs::create_dir_all(&config.uploads.directory).await?;

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("bookclub_server={},tower_http=debug", config.level).into());

    let (json_layer, pretty_layer) = if config.format.eq_ignore_ascii_case("json") {
        (Some(fmt::layer().json()), None)
    } else {
        (None, Some(fmt::layer()))
    };

    let (file_layer, guard) = match config.directory.as_deref() {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "bookclub-server.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(pretty_layer)
        .with(file_layer)
        .init();

    guard
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.config.uploads.max_bytes + BODY_LIMIT_SLACK;
    let uploads_path = format!("/{}", state.config.uploads.public_path.trim_matches('/'));
    let uploads = ServeDir::new(&state.config.uploads.directory);

    let api_v1 = Router::new()
        // Health
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Authentication
        .route("/auth/register", post(api::auth::register))
        .route("/auth/login", post(api::auth::login))
        .route(
            "/auth/me",
            get(api::auth::me)
                .put(api::auth::update_me)
                .delete(api::auth::delete_me),
        )
        // Users
        .route("/users/:id", get(api::users::get_user))
        // Books
        .route("/books", get(api::books::list_books).post(api::books::create_book))
        .route("/books/analyze-cover", post(api::books::analyze_cover))
        .route(
            "/books/:id",
            get(api::books::get_book)
                .put(api::books::update_book)
                .delete(api::books::delete_book),
        )
        .route("/books/:id/lend", post(api::books::lend_book))
        .route("/books/:id/return", post(api::books::return_book))
        .route("/books/:id/cover", post(api::books::upload_cover))
        // Clubs
        .route("/clubs", get(api::clubs::list_my_clubs).post(api::clubs::create_club))
        .route("/clubs/discover", get(api::clubs::discover_clubs))
        .route("/clubs/join", post(api::clubs::join_club))
        .route(
            "/clubs/:id",
            get(api::clubs::get_club)
                .put(api::clubs::update_club)
                .delete(api::clubs::delete_club),
        )
        .route("/clubs/:id/members", get(api::clubs::list_members))
        .route("/clubs/:id/members/:user_id", delete(api::clubs::remove_member))
        .route("/clubs/:id/requests", get(api::clubs::list_requests))
        .route(
            "/clubs/:id/requests/:user_id/approve",
            post(api::clubs::approve_request),
        )
        .route(
            "/clubs/:id/requests/:user_id/reject",
            post(api::clubs::reject_request),
        )
        .route("/clubs/:id/invite-code", post(api::clubs::regenerate_invite_code))
        // Notifications
        .route("/notifications", get(api::notifications::list_notifications))
        .route("/notifications/unread-count", get(api::notifications::unread_count))
        .route("/notifications/read-all", post(api::notifications::mark_all_read))
        .route("/notifications/:id", delete(api::notifications::delete_notification))
        .route("/notifications/:id/read", post(api::notifications::mark_read))
        // Messages
        .route(
            "/messages/conversations",
            get(api::messages::list_conversations).post(api::messages::start_conversation),
        )
        .route(
            "/messages/conversations/:id/messages",
            get(api::messages::list_messages).post(api::messages::send_message),
        )
        .route("/messages/conversations/:id/read", post(api::messages::mark_read))
        // Metadata
        .route("/metadata/isbn/:isbn", get(api::metadata::lookup_isbn))
        .route("/metadata/search", get(api::metadata::search))
        // OCR
        .route("/ocr/candidates", post(api::ocr::candidates))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .nest_service(&uploads_path, uploads)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
