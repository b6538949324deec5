use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fetch::{RetryingFetcher, Transport};
use crate::geo::{Coordinate, Route};
use crate::openaq::{first_measurement, MeasurementQuery};

pub const DEFAULT_SAMPLE_POINTS: usize = 10;
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(300);

const COORDINATE_DECIMALS: i32 = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    pub coordinates: Coordinate,
    pub distance_km: f64,
    pub value: f64,
    pub unit: String,
    pub parameter: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterAverage {
    pub parameter: String,
    pub unit: String,
    pub average: f64,
    pub count: usize,
}

pub fn sample_distances(length_km: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => {
            let interval = length_km / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { length_km } else { i as f64 * interval })
                .collect()
        }
    }
}

pub struct RouteSampler<T> {
    fetcher: RetryingFetcher<T>,
    base_url: String,
    request_delay: Duration,
}

impl<T: Transport> RouteSampler<T> {
    pub fn new(fetcher: RetryingFetcher<T>, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            request_delay: DEFAULT_REQUEST_DELAY,
        }
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub async fn sample(&self, route: &Route, parameter: &str, num_points: usize) -> Vec<SamplePoint> {
        let now = Utc::now();
        let distances = sample_distances(route.length_km(), num_points);
        let total = distances.len();
        let mut samples = Vec::with_capacity(total);

        for (idx, distance_km) in distances.into_iter().enumerate() {
            if idx > 0 {
                tokio::time::sleep(self.request_delay).await;
            }

            let coordinates = match route.point_at(route.clamp_distance(distance_km)) {
                Ok(point) => point.rounded(COORDINATE_DECIMALS),
                Err(err) => {
                    tracing::error!("Skipping sample point {}/{}: {}", idx + 1, total, err);
                    continue;
                }
            };

            let query = MeasurementQuery::latest_near(parameter, coordinates, now);
            let url = match query.url(&self.base_url) {
                Ok(url) => url,
                Err(err) => {
                    tracing::error!("Skipping sample point {}/{}: {}", idx + 1, total, err);
                    continue;
                }
            };

            let body = match self.fetcher.fetch(&url).await {
                Ok(body) => body,
                Err(err) => {
                    tracing::error!("Failed to fetch data for point {}/{}: {}", idx + 1, total, err);
                    continue;
                }
            };

            match first_measurement(&body) {
                Ok(Some(measurement)) => samples.push(SamplePoint {
                    coordinates,
                    distance_km,
                    value: measurement.value,
                    unit: measurement.unit,
                    parameter: measurement.parameter,
                    date: measurement.date.utc,
                }),
                Ok(None) => {
                    tracing::debug!("No {} reading near point {}/{}", parameter, idx + 1, total);
                }
                Err(err) => {
                    tracing::warn!("Unreadable measurement for point {}/{}: {}", idx + 1, total, err);
                }
            }
        }

        tracing::info!(
            "Sampled {} of {} points for {} along {:.2} km route",
            samples.len(),
            total,
            parameter,
            route.length_km()
        );

        samples
    }
}

pub fn average_by_parameter(samples: &[SamplePoint]) -> Vec<ParameterAverage> {
    let mut groups: Vec<(String, String, f64, usize)> = Vec::new();
    for sample in samples {
        match groups
            .iter_mut()
            .find(|(parameter, unit, _, _)| *parameter == sample.parameter && *unit == sample.unit)
        {
            Some(group) => {
                group.2 += sample.value;
                group.3 += 1;
            }
            None => groups.push((sample.parameter.clone(), sample.unit.clone(), sample.value, 1)),
        }
    }

    groups
        .into_iter()
        .map(|(parameter, unit, sum, count)| ParameterAverage {
            parameter,
            unit,
            average: sum / count as f64,
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tokio::time::Instant;

    use super::*;
    use crate::fetch::mock::{status, ScriptedTransport};
    use crate::fetch::RetryPolicy;

    fn meridian_route() -> Route {
        Route::new(vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 1.0),
            Coordinate::new(0.0, 2.0),
        ])
        .unwrap()
    }

    fn reading(value: f64) -> String {
        format!(
            r#"{{"results":[{{"parameter":"pm25","value":{value},"unit":"µg/m³","date":{{"utc":"2026-03-07T10:00:00Z"}}}}]}}"#
        )
    }

    fn sample(parameter: &str, unit: &str, value: f64) -> SamplePoint {
        SamplePoint {
            coordinates: Coordinate::new(0.0, 0.0),
            distance_km: 0.0,
            value,
            unit: unit.to_string(),
            parameter: parameter.to_string(),
            date: Utc.with_ymd_and_hms(2026, 3, 7, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn distances_span_route_inclusive() {
        let route = meridian_route();
        let length = route.length_km();
        assert_eq!(sample_distances(length, 3), vec![0.0, length / 2.0, length]);
        assert_eq!(sample_distances(length, 1), vec![0.0]);
        assert!(sample_distances(length, 0).is_empty());

        let ten = sample_distances(length, 10);
        assert_eq!(ten.len(), 10);
        assert_eq!(ten[9], length);
        assert!(ten.windows(2).all(|w| w[1] > w[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn samples_follow_route_order() {
        let transport = ScriptedTransport::new(|_, index| status(200, &reading(index as f64)));
        let sampler = RouteSampler::new(
            RetryingFetcher::new(transport.clone(), RetryPolicy::default()),
            "https://api.openaq.org",
        );
        let route = meridian_route();

        let samples = sampler.sample(&route, "pm25", 3).await;

        assert_eq!(samples.len(), 3);
        let distances: Vec<f64> = samples.iter().map(|s| s.distance_km).collect();
        assert_eq!(distances, vec![0.0, route.length_km() / 2.0, route.length_km()]);
        assert!((samples[1].coordinates.lat - 1.0).abs() < 1e-8);
        assert_eq!(samples[2].coordinates, Coordinate::new(0.0, 2.0));
        assert_eq!(samples[2].value, 2.0);

        let calls = transport.calls();
        assert!(calls[0].1.contains("coordinates=0%2C0"));
        assert!(calls[2].1.contains("coordinates=2%2C0"));
    }

    #[tokio::test(start_paused = true)]
    async fn unusable_base_url_skips_every_point() {
        let transport = ScriptedTransport::new(|_, _| status(200, &reading(1.0)));
        let sampler = RouteSampler::new(
            RetryingFetcher::new(transport.clone(), RetryPolicy::default()),
            "api.openaq.org",
        );

        let samples = sampler.sample(&meridian_route(), "pm25", 3).await;

        assert!(samples.is_empty());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn requests_are_spaced_at_least_300ms_apart() {
        let transport = ScriptedTransport::new(|_, index| {
            if index % 3 == 1 {
                status(429, "")
            } else {
                status(200, &reading(1.0))
            }
        });
        let sampler = RouteSampler::new(
            RetryingFetcher::new(transport.clone(), RetryPolicy::default()),
            "https://api.openaq.org",
        );

        sampler.sample(&meridian_route(), "pm25", 10).await;

        let calls = transport.calls();
        assert!(calls.len() >= 10);
        for pair in calls.windows(2) {
            assert!(pair[1].0 - pair[0].0 >= Duration::from_millis(300));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_and_empty_points_are_dropped() {
        let transport = ScriptedTransport::new(|url, _| {
            if url.contains("coordinates=0%2C0") {
                status(404, "{}")
            } else if url.contains("coordinates=2%2C0") {
                status(200, r#"{"results":[]}"#)
            } else {
                status(200, &reading(7.0))
            }
        });
        let sampler = RouteSampler::new(
            RetryingFetcher::new(transport.clone(), RetryPolicy::default()),
            "https://api.openaq.org",
        );

        let started = Instant::now();
        let samples = sampler.sample(&meridian_route(), "pm25", 3).await;

        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, 7.0);
        // first point exhausts its retries: 1 + 3 attempts, then two more points
        assert_eq!(transport.calls().len(), 6);
        assert!(started.elapsed() >= Duration::from_millis(7000 + 600));
    }

    #[test]
    fn averages_group_by_parameter_and_unit() {
        let samples = vec![
            sample("pm25", "µg/m³", 10.0),
            sample("pm25", "µg/m³", 20.0),
            sample("pm25", "ppm", 1.0),
            sample("o3", "ppm", 0.5),
            sample("pm25", "µg/m³", 30.0),
        ];
        let averages = average_by_parameter(&samples);

        assert_eq!(averages.len(), 3);
        assert_eq!(averages[0].parameter, "pm25");
        assert_eq!(averages[0].unit, "µg/m³");
        assert_eq!(averages[0].average, 20.0);
        assert_eq!(averages[0].count, 3);
        assert_eq!(averages[1].unit, "ppm");
        assert_eq!(averages[2].parameter, "o3");
        assert!(average_by_parameter(&[]).is_empty());
    }
}
