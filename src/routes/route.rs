use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::endpoints::{parse_lng_lat, RouteEndpoints};
use crate::error::AppError;
use crate::geo::Coordinate;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/route", get(route))
}

#[derive(Debug, Deserialize)]
struct RouteQuery {
    start: Option<String>,
    end: Option<String>,
    /// Semicolon-separated `lng,lat` pairs visited between start and end.
    waypoints: Option<String>,
}

#[derive(Debug, Serialize)]
struct RouteResponse {
    start: Coordinate,
    end: Coordinate,
    coordinates: Vec<Coordinate>,
    length_km: f64,
}

async fn route(
    State(state): State<AppState>,
    Query(query): Query<RouteQuery>,
) -> Result<Json<RouteResponse>, AppError> {
    let endpoints = RouteEndpoints::from_params(query.start.as_deref(), query.end.as_deref())?
        .ok_or_else(|| AppError::BadRequest("Please select both start and end points".to_string()))?;

    let waypoints = query
        .waypoints
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| raw.split(';').map(parse_lng_lat).collect::<Result<Vec<_>, _>>())
        .transpose()?
        .unwrap_or_default();

    let route = state
        .directions()
        .route(endpoints.start, endpoints.end, &waypoints)
        .await
        .inspect_err(|err| tracing::error!("Route lookup failed: {}", err))?;

    Ok(Json(RouteResponse {
        start: endpoints.start,
        end: endpoints.end,
        length_km: route.length_km(),
        coordinates: route.points().to_vec(),
    }))
}
