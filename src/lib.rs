pub mod animation;
pub mod config;
pub mod directions;
pub mod endpoints;
pub mod error;
pub mod fetch;
pub mod geo;
pub mod openaq;
pub mod routes;
pub mod sampler;
pub mod session;
pub mod state;

use axum::Router;

use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::route::router())
        .merge(routes::samples::router())
        .merge(routes::proxy::router())
}
