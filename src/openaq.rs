use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MeasurementError;
use crate::fetch::{RetryingFetcher, Transport};
use crate::geo::Coordinate;

pub const SEARCH_RADIUS_M: u32 = 25_000;
pub const LOOKBACK_DAYS: i64 = 7;
pub const DEFAULT_PARAMETER: &str = "pm25";

#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementQuery {
    pub parameter: String,
    pub center: Coordinate,
    pub radius_m: u32,
    pub date_from: DateTime<Utc>,
    pub date_to: DateTime<Utc>,
    pub limit: u32,
}

impl MeasurementQuery {
    pub fn latest_near(parameter: &str, center: Coordinate, now: DateTime<Utc>) -> Self {
        Self {
            parameter: parameter.to_string(),
            center,
            radius_m: SEARCH_RADIUS_M,
            date_from: now - Duration::days(LOOKBACK_DAYS),
            date_to: now,
            limit: 1,
        }
    }

    pub fn url(&self, base_url: &str) -> Result<String, MeasurementError> {
        let endpoint = format!("{}/v2/measurements", base_url.trim_end_matches('/'));
        let coordinates = format!("{},{}", self.center.lat, self.center.lng);
        let url = reqwest::Url::parse_with_params(
            &endpoint,
            &[
                ("date_from", iso_timestamp(self.date_from)),
                ("date_to", iso_timestamp(self.date_to)),
                ("parameter_id", self.parameter.clone()),
                ("coordinates", coordinates),
                ("radius", self.radius_m.to_string()),
                ("limit", self.limit.to_string()),
            ],
        )
        .map_err(|err| MeasurementError::InvalidUrl {
            url: endpoint.clone(),
            message: err.to_string(),
        })?;
        Ok(url.to_string())
    }
}

fn iso_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Deserialize)]
pub struct Measurement {
    pub parameter: String,
    pub value: f64,
    pub unit: String,
    pub date: MeasurementDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeasurementDate {
    pub utc: DateTime<Utc>,
}

pub fn first_measurement(body: &Value) -> Result<Option<Measurement>, serde_json::Error> {
    match body.get("results").and_then(Value::as_array).and_then(|r| r.first()) {
        Some(entry) => serde_json::from_value(entry.clone()).map(Some),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterId {
    Numeric(u64),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub id: ParameterId,
    pub name: String,
    #[serde(default, rename = "displayName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, rename = "preferredUnit", skip_serializing_if = "Option::is_none")]
    pub preferred_unit: Option<String>,
}

pub fn fallback_parameters() -> Vec<Parameter> {
    vec![Parameter {
        id: ParameterId::Name(DEFAULT_PARAMETER.to_string()),
        name: "PM2.5".to_string(),
        display_name: None,
        preferred_unit: None,
    }]
}

pub async fn fetch_parameters<T: Transport>(
    fetcher: &RetryingFetcher<T>,
    base_url: &str,
) -> Vec<Parameter> {
    let url = format!("{}/v2/parameters", base_url.trim_end_matches('/'));
    let body = match fetcher.fetch(&url).await {
        Ok(body) => body,
        Err(err) => {
            tracing::error!("Error fetching parameters: {}", err);
            return fallback_parameters();
        }
    };

    let results = body.get("results").cloned().unwrap_or(Value::Null);
    match serde_json::from_value::<Vec<Parameter>>(results) {
        Ok(parameters) if !parameters.is_empty() => parameters,
        Ok(_) => fallback_parameters(),
        Err(err) => {
            tracing::error!("Unexpected parameters payload: {}", err);
            fallback_parameters()
        }
    }
}
