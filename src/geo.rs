use serde::{Deserialize, Serialize};

use crate::error::GeoError;

pub const EARTH_RADIUS_KM: f64 = 6371.0088;

const LENGTH_TOLERANCE_KM: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinate {
    pub lng: f64,
    pub lat: f64,
}

impl Coordinate {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    pub fn is_finite(&self) -> bool {
        self.lng.is_finite() && self.lat.is_finite()
    }

    pub fn rounded(&self, decimals: i32) -> Self {
        let factor = 10f64.powi(decimals);
        Self {
            lng: (self.lng * factor).round() / factor,
            lat: (self.lat * factor).round() / factor,
        }
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from([lng, lat]: [f64; 2]) -> Self {
        Self { lng, lat }
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(coord: Coordinate) -> Self {
        [coord.lng, coord.lat]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    points: Vec<Coordinate>,
    length_km: f64,
}

impl Route {
    pub fn new(points: Vec<Coordinate>) -> Result<Self, GeoError> {
        if points.len() < 2 {
            return Err(GeoError::TooFewPoints(points.len()));
        }
        let length_km = total_length(&points);
        Ok(Self { points, length_km })
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn length_km(&self) -> f64 {
        self.length_km
    }

    pub fn start(&self) -> Coordinate {
        self.points[0]
    }

    pub fn end(&self) -> Coordinate {
        self.points[self.points.len() - 1]
    }

    pub fn clamp_distance(&self, distance_km: f64) -> f64 {
        if distance_km.is_nan() {
            return 0.0;
        }
        distance_km.clamp(0.0, self.length_km)
    }

    pub fn point_at(&self, distance_km: f64) -> Result<Coordinate, GeoError> {
        point_at_distance(&self.points, distance_km)
    }
}

pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

pub fn total_length(points: &[Coordinate]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_km(pair[0], pair[1]))
        .sum()
}

pub fn bearing_between(a: Coordinate, b: Coordinate) -> f64 {
    let lon1 = a.lng.to_radians();
    let lon2 = b.lng.to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let y = (lon2 - lon1).sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * (lon2 - lon1).cos();

    y.atan2(x).to_degrees()
}

pub fn destination(origin: Coordinate, distance_km: f64, bearing_deg: f64) -> Coordinate {
    let lat1 = origin.lat.to_radians();
    let lon1 = origin.lng.to_radians();
    let bearing = bearing_deg.to_radians();
    let delta = distance_km / EARTH_RADIUS_KM;

    let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * bearing.cos()).asin();
    let lon2 = lon1
        + (bearing.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

    Coordinate {
        lng: lon2.to_degrees(),
        lat: lat2.to_degrees(),
    }
}

/// Point at arc length `distance_km` from the first vertex.
///
/// Callers clamp first: anything negative or past the end is an error.
pub fn point_at_distance(points: &[Coordinate], distance_km: f64) -> Result<Coordinate, GeoError> {
    let length_km = total_length(points);
    if points.is_empty() {
        return Err(GeoError::TooFewPoints(0));
    }
    if distance_km.is_nan() || distance_km < 0.0 || distance_km > length_km + LENGTH_TOLERANCE_KM {
        return Err(GeoError::OutOfRange {
            distance_km,
            length_km,
        });
    }

    let mut travelled = 0.0;
    for pair in points.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let segment_km = haversine_km(start, end);
        if segment_km <= f64::EPSILON {
            continue;
        }
        if distance_km < travelled + segment_km {
            let overshoot = distance_km - travelled;
            if overshoot <= 0.0 {
                return Ok(start);
            }
            return Ok(destination(start, overshoot, bearing_between(start, end)));
        }
        travelled += segment_km;
    }

    Ok(points[points.len() - 1])
}

pub fn lerp(a: Coordinate, b: Coordinate, t: f64) -> Coordinate {
    Coordinate {
        lng: a.lng + (b.lng - a.lng) * t,
        lat: a.lat + (b.lat - a.lat) * t,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lng: f64, lat: f64) -> Coordinate {
        Coordinate::new(lng, lat)
    }

    fn meridian_route() -> Vec<Coordinate> {
        vec![c(0.0, 0.0), c(0.0, 1.0), c(0.0, 2.0)]
    }

    fn on_polyline(points: &[Coordinate], p: Coordinate) -> bool {
        points.windows(2).any(|pair| {
            let direct = haversine_km(pair[0], pair[1]);
            let via = haversine_km(pair[0], p) + haversine_km(p, pair[1]);
            (via - direct).abs() < 1e-6
        })
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let length = total_length(&[c(0.0, 0.0), c(0.0, 1.0)]);
        assert!((length - 111.195).abs() < 0.01, "got {length}");
    }

    #[test]
    fn points_at_valid_distances_lie_on_route() {
        let points = vec![c(13.40, 52.52), c(13.41, 52.53), c(13.45, 52.53), c(13.46, 52.50)];
        let length = total_length(&points);
        for step in 0..=40 {
            let distance = length * step as f64 / 40.0;
            let point = point_at_distance(&points, distance).expect("in range");
            assert!(on_polyline(&points, point), "{point:?} at {distance}");
        }
    }

    #[test]
    fn endpoints_map_to_first_and_last_vertex() {
        let points = meridian_route();
        let length = total_length(&points);
        assert_eq!(point_at_distance(&points, 0.0).unwrap(), c(0.0, 0.0));
        assert_eq!(point_at_distance(&points, length).unwrap(), c(0.0, 2.0));
    }

    #[test]
    fn midpoint_of_meridian_route_is_middle_vertex() {
        let points = meridian_route();
        let half = total_length(&points) / 2.0;
        let mid = point_at_distance(&points, half).unwrap();
        assert!(mid.lng.abs() < 1e-9);
        assert!((mid.lat - 1.0).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_distances_are_rejected() {
        let points = meridian_route();
        let length = total_length(&points);
        assert!(matches!(
            point_at_distance(&points, -0.001),
            Err(GeoError::OutOfRange { .. })
        ));
        assert!(matches!(
            point_at_distance(&points, length + 1.0),
            Err(GeoError::OutOfRange { .. })
        ));
        assert!(point_at_distance(&points, f64::NAN).is_err());
    }

    #[test]
    fn duplicate_vertices_are_skipped() {
        let points = vec![c(0.0, 0.0), c(0.0, 0.0), c(0.0, 1.0)];
        let length = total_length(&points);
        let point = point_at_distance(&points, length / 2.0).unwrap();
        assert!((point.lat - 0.5).abs() < 1e-9);
    }

    #[test]
    fn total_length_grows_as_vertices_are_appended() {
        let mut points = vec![c(2.35, 48.85)];
        let mut previous = total_length(&points);
        for next in [c(2.36, 48.86), c(2.36, 48.86), c(2.30, 48.80), c(2.40, 48.90)] {
            points.push(next);
            let length = total_length(&points);
            assert!(length >= previous);
            previous = length;
        }
    }

    #[test]
    fn bearings_follow_compass_directions() {
        assert!((bearing_between(c(0.0, 0.0), c(0.0, 1.0)) - 0.0).abs() < 1e-9);
        assert!((bearing_between(c(0.0, 0.0), c(1.0, 0.0)) - 90.0).abs() < 1e-9);
        assert!((bearing_between(c(0.0, 1.0), c(0.0, 0.0)).abs() - 180.0).abs() < 1e-9);
        assert!((bearing_between(c(0.0, 0.0), c(-1.0, 0.0)) + 90.0).abs() < 1e-9);
    }

    #[test]
    fn bearing_of_identical_points_is_zero() {
        let p = c(-74.5, 40.0);
        assert_eq!(bearing_between(p, p), 0.0);
    }

    #[test]
    fn lerp_weights_endpoints() {
        let behind = c(0.0, 0.0);
        let along = c(10.0, 20.0);
        let target = lerp(behind, along, 0.7);
        assert!((target.lng - 7.0).abs() < 1e-12);
        assert!((target.lat - 14.0).abs() < 1e-12);
    }

    #[test]
    fn route_requires_two_points() {
        assert_eq!(
            Route::new(vec![c(0.0, 0.0)]).unwrap_err(),
            GeoError::TooFewPoints(1)
        );
        let route = Route::new(meridian_route()).unwrap();
        assert!((route.length_km() - total_length(route.points())).abs() < 1e-12);
        assert_eq!(route.clamp_distance(-3.0), 0.0);
        assert_eq!(route.clamp_distance(1e9), route.length_km());
    }

    #[test]
    fn coordinates_serialize_as_pairs() {
        let json = serde_json::to_string(&c(13.405, 52.52)).unwrap();
        assert_eq!(json, "[13.405,52.52]");
        let back: Coordinate = serde_json::from_str("[1.5,2.5]").unwrap();
        assert_eq!(back, c(1.5, 2.5));
    }
}
