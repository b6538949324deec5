use mimalloc::MiMalloc;
use route_animator::{config, state};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "route_animator=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::Config::from_env();
    if config.mapbox_access_token.is_none() {
        tracing::warn!("MAPBOX_ACCESS_TOKEN is not set; route lookups will fail");
    }
    if config.openaq_api_key.is_none() {
        tracing::warn!("OPENAQ_API_KEY is not set; the measurement proxy is disabled");
    }
    let port = config.port;
    let cache_ttl = config.cache_ttl;
    let state = state::AppState::new(config);

    // Drop stale proxy responses every 5 minutes
    let eviction_state = state.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(300)).await;
            eviction_state.evict_expired(cache_ttl);
        }
    });

    let serve_dir = ServeDir::new("assets/web")
        .not_found_service(ServeFile::new("assets/web/index.html"));

    let app = route_animator::api_router()
        .fallback_service(serve_dir)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("Failed to bind {}: {}", addr, err);
            std::process::exit(1);
        }
    };

    tracing::info!("Route animator listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);
    tracing::info!("Route: GET http://{}/api/route?start=lng,lat&end=lng,lat", addr);
    tracing::info!("Samples: POST http://{}/api/samples", addr);
    tracing::info!("Measurement proxy: GET http://{}/api/openaq?url=...", addr);

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", err);
    }
}
