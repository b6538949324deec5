use axum::{extract::State, routing::{get, post}, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::geo::{Coordinate, Route};
use crate::openaq::{fetch_parameters, Parameter, DEFAULT_PARAMETER};
use crate::sampler::{average_by_parameter, ParameterAverage, SamplePoint};
use crate::state::AppState;

const MAX_SAMPLE_POINTS: usize = 50;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/samples", post(samples))
        .route("/api/parameters", get(parameters))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SamplesRequest {
    coordinates: Vec<Coordinate>,
    #[serde(default)]
    parameter: Option<String>,
    #[serde(default)]
    num_points: Option<usize>,
}

#[derive(Debug, Serialize)]
struct SamplesResponse {
    parameter: String,
    length_km: f64,
    samples: Vec<SamplePoint>,
    averages: Vec<ParameterAverage>,
}

async fn samples(
    State(state): State<AppState>,
    Json(payload): Json<SamplesRequest>,
) -> Result<Json<SamplesResponse>, AppError> {
    let num_points = payload.num_points.unwrap_or(state.config().sample_points);
    if num_points == 0 || num_points > MAX_SAMPLE_POINTS {
        return Err(AppError::BadRequest(format!(
            "num_points must be between 1 and {}",
            MAX_SAMPLE_POINTS
        )));
    }
    if payload.coordinates.iter().any(|c| !c.is_finite()) {
        return Err(AppError::BadRequest("Route contains non-finite coordinates".to_string()));
    }

    let parameter = payload
        .parameter
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| DEFAULT_PARAMETER.to_string());
    let route = Route::new(payload.coordinates)?;

    let samples = state.sampler().sample(&route, &parameter, num_points).await;
    let averages = average_by_parameter(&samples);

    Ok(Json(SamplesResponse {
        parameter,
        length_km: route.length_km(),
        samples,
        averages,
    }))
}

async fn parameters(State(state): State<AppState>) -> Json<Vec<Parameter>> {
    let fetcher = state.fetcher();
    Json(fetch_parameters(&fetcher, &state.config().openaq_base_url).await)
}
