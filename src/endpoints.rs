use reqwest::Url;

use crate::error::EndpointError;
use crate::geo::Coordinate;

pub const START_PARAM: &str = "start";
pub const END_PARAM: &str = "end";

pub fn is_coordinates(input: &str) -> bool {
    let parts: Vec<&str> = input.split(',').collect();
    parts.len() == 2 && parts.iter().all(|part| part.trim().parse::<f64>().is_ok())
}

pub fn parse_lng_lat(input: &str) -> Result<Coordinate, EndpointError> {
    let invalid = || EndpointError::InvalidCoordinates(input.to_string());
    let (lng, lat) = input.split_once(',').ok_or_else(invalid)?;
    let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let coord = Coordinate::new(lng, lat);
    if !coord.is_finite() || !(-180.0..=180.0).contains(&lng) || !(-90.0..=90.0).contains(&lat) {
        return Err(invalid());
    }
    Ok(coord)
}

pub fn format_lng_lat(coord: Coordinate) -> String {
    format!("{},{}", coord.lng, coord.lat)
}

pub fn geocoder_label(coord: Coordinate) -> String {
    format!("{}, {}", coord.lat, coord.lng)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteEndpoints {
    pub start: Coordinate,
    pub end: Coordinate,
}

impl RouteEndpoints {
    pub fn new(start: Coordinate, end: Coordinate) -> Self {
        Self { start, end }
    }

    pub fn from_params(start: Option<&str>, end: Option<&str>) -> Result<Option<Self>, EndpointError> {
        match (start, end) {
            (Some(start), Some(end)) => Ok(Some(Self {
                start: parse_lng_lat(start)?,
                end: parse_lng_lat(end)?,
            })),
            _ => Ok(None),
        }
    }

    pub fn from_url(url: &Url) -> Result<Option<Self>, EndpointError> {
        let mut start = None;
        let mut end = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                START_PARAM => start = Some(value.into_owned()),
                END_PARAM => end = Some(value.into_owned()),
                _ => {}
            }
        }
        Self::from_params(start.as_deref(), end.as_deref())
    }

    pub fn write_to_url(&self, url: &mut Url) {
        let others: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != START_PARAM && key != END_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        url.query_pairs_mut()
            .clear()
            .extend_pairs(others)
            .append_pair(START_PARAM, &format_lng_lat(self.start))
            .append_pair(END_PARAM, &format_lng_lat(self.end));
    }
}
