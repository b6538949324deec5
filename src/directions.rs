use serde::Deserialize;

use crate::error::DirectionsError;
use crate::geo::{Coordinate, Route};

pub const PROFILE: &str = "driving";

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    coordinates: Vec<Coordinate>,
}

#[derive(Debug, Clone)]
pub struct DirectionsClient {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl DirectionsClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            access_token,
        }
    }

    pub fn url(
        &self,
        start: Coordinate,
        end: Coordinate,
        waypoints: &[Coordinate],
    ) -> Result<String, DirectionsError> {
        let token = self.access_token.as_deref().ok_or(DirectionsError::NotConfigured)?;
        let path = std::iter::once(start)
            .chain(waypoints.iter().copied())
            .chain(std::iter::once(end))
            .map(|c| format!("{},{}", c.lng, c.lat))
            .collect::<Vec<_>>()
            .join(";");
        let endpoint = format!(
            "{}/directions/v5/mapbox/{}/{}",
            self.base_url.trim_end_matches('/'),
            PROFILE,
            path
        );
        let url = reqwest::Url::parse_with_params(
            &endpoint,
            &[("geometries", "geojson"), ("access_token", token)],
        )
        .map_err(|err| DirectionsError::Request(err.to_string()))?;
        Ok(url.to_string())
    }

    pub async fn route(
        &self,
        start: Coordinate,
        end: Coordinate,
        waypoints: &[Coordinate],
    ) -> Result<Route, DirectionsError> {
        let url = self.url(start, end, waypoints)?;

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| DirectionsError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!("Directions request failed with HTTP {}", status);
            return Err(DirectionsError::Status(status.as_u16()));
        }

        let body: DirectionsResponse = response
            .json()
            .await
            .map_err(|err| DirectionsError::Request(format!("Invalid directions response: {}", err)))?;

        let route = route_from_response(body)?;
        tracing::info!(
            "Fetched {} route with {} points ({:.2} km)",
            PROFILE,
            route.points().len(),
            route.length_km()
        );
        Ok(route)
    }
}

fn route_from_response(body: DirectionsResponse) -> Result<Route, DirectionsError> {
    let first = body.routes.into_iter().next().ok_or(DirectionsError::NoRoute)?;
    Ok(Route::new(first.geometry.coordinates)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeoError;

    fn client(token: Option<&str>) -> DirectionsClient {
        DirectionsClient::new(
            reqwest::Client::new(),
            "https://api.mapbox.com/",
            token.map(str::to_string),
        )
    }

    #[test]
    fn url_lists_waypoints_in_order() {
        let url = client(Some("pk.test"))
            .url(
                Coordinate::new(-74.0, 40.7),
                Coordinate::new(-73.9, 40.8),
                &[Coordinate::new(-73.95, 40.75)],
            )
            .unwrap();
        assert_eq!(
            url,
            "https://api.mapbox.com/directions/v5/mapbox/driving/-74,40.7;-73.95,40.75;-73.9,40.8?geometries=geojson&access_token=pk.test"
        );
    }

    #[test]
    fn url_requires_access_token() {
        let err = client(None)
            .url(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 1.0), &[])
            .unwrap_err();
        assert!(matches!(err, DirectionsError::NotConfigured));
    }

    #[test]
    fn first_route_geometry_is_used() {
        let body: DirectionsResponse = serde_json::from_str(
            r#"{"code":"Ok","routes":[
                {"distance":1200.0,"geometry":{"type":"LineString","coordinates":[[0,0],[0,0.01]]}},
                {"geometry":{"type":"LineString","coordinates":[[5,5],[6,6]]}}
            ]}"#,
        )
        .unwrap();
        let route = route_from_response(body).unwrap();
        assert_eq!(route.points(), &[Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 0.01)]);
    }

    #[test]
    fn empty_or_degenerate_responses_are_errors() {
        let none: DirectionsResponse = serde_json::from_str(r#"{"code":"NoRoute","routes":[]}"#).unwrap();
        assert!(matches!(route_from_response(none), Err(DirectionsError::NoRoute)));

        let missing: DirectionsResponse = serde_json::from_str(r#"{"code":"NoSegment"}"#).unwrap();
        assert!(matches!(route_from_response(missing), Err(DirectionsError::NoRoute)));

        let short: DirectionsResponse =
            serde_json::from_str(r#"{"routes":[{"geometry":{"coordinates":[[1,1]]}}]}"#).unwrap();
        assert!(matches!(
            route_from_response(short),
            Err(DirectionsError::InvalidGeometry(GeoError::TooFewPoints(1)))
        ));
    }
}
