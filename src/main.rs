use std::sync::Arc;

use axum::routing::{get, patch, post, put};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use gigbook::config::AppConfig;
use gigbook::db::Store;
use gigbook::handlers;
use gigbook::services::chat::{ChatProvider, HttpChatService, NoopChat};
use gigbook::services::ratings::{HttpRatingsService, NoopRatings, RatingsProvider};
use gigbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let store = Store::open(&config.database_url)?;

    let chat: Box<dyn ChatProvider> = if config.chat_service_url.is_empty() {
        tracing::info!("CHAT_SERVICE_URL not set, using local noop chat provider");
        Box::new(NoopChat)
    } else {
        tracing::info!("using chat service at {}", config.chat_service_url);
        Box::new(HttpChatService::new(config.chat_service_url.clone()))
    };

    let ratings: Box<dyn RatingsProvider> = if config.ratings_service_url.is_empty() {
        tracing::info!("RATINGS_SERVICE_URL not set, using local noop ratings provider");
        Box::new(NoopRatings)
    } else {
        tracing::info!("using ratings service at {}", config.ratings_service_url);
        Box::new(HttpRatingsService::new(config.ratings_service_url.clone()))
    };

    let (events_tx, _) = broadcast::channel(256);

    let state = Arc::new(AppState {
        store,
        config: config.clone(),
        chat,
        ratings,
        events_tx,
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/bookings", get(handlers::bookings::list_bookings))
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/api/bookings/:id/request",
            post(handlers::bookings::request_to_book),
        )
        .route(
            "/api/bookings/:id/instant-book",
            post(handlers::bookings::instant_book),
        )
        .route(
            "/api/bookings/:id/approve",
            post(handlers::bookings::approve_booking),
        )
        .route(
            "/api/bookings/:id/confirm-payment",
            post(handlers::bookings::confirm_payment),
        )
        .route(
            "/api/bookings/:id/check-in",
            post(handlers::bookings::check_in),
        )
        .route(
            "/api/bookings/:id/check-out",
            post(handlers::bookings::check_out),
        )
        .route(
            "/api/bookings/:id/cancel",
            post(handlers::bookings::cancel_booking),
        )
        .route(
            "/api/bookings/:id/reviews",
            get(handlers::reviews::get_booking_reviews),
        )
        .route("/api/reviews", post(handlers::reviews::submit_review))
        .route("/api/reviews/:id", patch(handlers::reviews::update_review))
        .route("/api/listings/:id", put(handlers::listings::upsert_listing))
        .route("/api/profiles/:id", put(handlers::listings::upsert_profile))
        .route(
            "/calendar/:booking_id",
            get(handlers::calendar::download_ics),
        )
        .route("/api/events", get(handlers::events::events_stream))
        .route(
            "/internal/sweeps/expire-bookings",
            post(handlers::ops::run_expire_bookings),
        )
        .route(
            "/internal/sweeps/publish-reviews",
            post(handlers::ops::run_publish_reviews),
        )
        .route("/api/ops/stats", get(handlers::ops::get_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
