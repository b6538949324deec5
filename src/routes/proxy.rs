use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::fetch::Transport;
use crate::state::AppState;

pub const CACHE_HEADER: &str = "x-cache";

pub fn router() -> Router<AppState> {
    Router::new().route("/api/openaq", get(proxy))
}

#[derive(Debug, Deserialize)]
struct ProxyQuery {
    url: Option<String>,
}

async fn proxy(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
) -> Result<Response, AppError> {
    if state.config().openaq_api_key.is_none() {
        return Err(AppError::Internal("API key not set".to_string()));
    }

    let url = query
        .url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| AppError::BadRequest("No URL provided".to_string()))?;

    let allowed_prefix = format!("{}/", state.config().openaq_base_url.trim_end_matches('/'));
    if !url.starts_with(&allowed_prefix) {
        return Err(AppError::BadRequest(
            "Invalid URL. Must be an OpenAQ API URL.".to_string(),
        ));
    }

    if let Some(body) = state.cache_get(&url) {
        tracing::debug!("Cache hit for {}", url);
        return Ok(json_response(StatusCode::OK, body, Some("HIT")));
    }

    let upstream = state
        .transport()
        .get(&url)
        .await
        .map_err(|err| AppError::Upstream(err.to_string()))?;

    let status = StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
    if status.is_success() {
        state.cache_insert(url, upstream.body.clone());
        Ok(json_response(status, upstream.body, Some("MISS")))
    } else {
        tracing::warn!("Upstream returned HTTP {} for {}", upstream.status, url);
        Ok(json_response(status, upstream.body, None))
    }
}

fn json_response(status: StatusCode, body: String, cache: Option<&'static str>) -> Response {
    let mut response = (status, body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(cache) = cache {
        headers.insert(CACHE_HEADER, HeaderValue::from_static(cache));
    }
    response
}
