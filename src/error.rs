use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeoError {
    #[error("Distance {distance_km} km is outside the route (0 to {length_km} km)")]
    OutOfRange { distance_km: f64, length_km: f64 },
    #[error("Route needs at least 2 points, got {0}")]
    TooFewPoints(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error {status} after {attempts} attempt(s)")]
    Status { status: u16, attempts: u32 },
    #[error("Network error after {attempts} attempt(s): {message}")]
    Network { message: String, attempts: u32 },
    #[error("Invalid JSON after {attempts} attempt(s): {message}")]
    Decode { message: String, attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeasurementError {
    #[error("Invalid measurement URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnimationError {
    #[error("Please generate a route first")]
    NoRoute,
    #[error("Animation player is no longer running")]
    PlayerStopped,
    #[error(transparent)]
    Geo(#[from] GeoError),
}

#[derive(Debug, thiserror::Error)]
pub enum DirectionsError {
    #[error("MAPBOX_ACCESS_TOKEN is not configured")]
    NotConfigured,
    #[error("Directions request failed: {0}")]
    Request(String),
    #[error("Directions service returned HTTP {0}")]
    Status(u16),
    #[error("Directions service returned no route")]
    NoRoute,
    #[error(transparent)]
    InvalidGeometry(#[from] GeoError),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EndpointError {
    #[error("Invalid coordinates '{0}', expected \"lng,lat\"")]
    InvalidCoordinates(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Geo(#[from] GeoError),
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    #[error(transparent)]
    Directions(#[from] DirectionsError),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Upstream error: {0}")]
    Upstream(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Geo(_)
            | AppError::Endpoint(_)
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Directions(DirectionsError::NotConfigured) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Directions(DirectionsError::NoRoute) => StatusCode::NOT_FOUND,
            AppError::Directions(_) | AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
