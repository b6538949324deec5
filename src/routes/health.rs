use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let config = state.config();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "directions_configured": config.mapbox_access_token.is_some(),
        "measurements_configured": config.openaq_api_key.is_some(),
        "cached_responses": state.cache_len()
    }))
}
