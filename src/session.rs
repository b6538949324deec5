use std::sync::Arc;

use crate::endpoints::RouteEndpoints;
use crate::geo::{Coordinate, Route};
use crate::sampler::{average_by_parameter, ParameterAverage, SamplePoint};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    EndpointsChanged {
        start: Option<Coordinate>,
        end: Option<Coordinate>,
    },
    RouteChanged {
        generation: u64,
        length_km: f64,
    },
    SamplesUpdated {
        generation: u64,
        samples: usize,
    },
}

#[derive(Debug, Clone)]
pub struct SamplingTicket {
    pub generation: u64,
    pub route: Arc<Route>,
}

type Observer = Box<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Default)]
pub struct Session {
    start: Option<Coordinate>,
    end: Option<Coordinate>,
    route: Option<Arc<Route>>,
    generation: u64,
    samples: Vec<SamplePoint>,
    averages: Vec<ParameterAverage>,
    observers: Vec<Observer>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    pub fn start(&self) -> Option<Coordinate> {
        self.start
    }

    pub fn end(&self) -> Option<Coordinate> {
        self.end
    }

    pub fn route(&self) -> Option<&Arc<Route>> {
        self.route.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn samples(&self) -> &[SamplePoint] {
        &self.samples
    }

    pub fn averages(&self) -> &[ParameterAverage] {
        &self.averages
    }

    pub fn set_start(&mut self, start: Coordinate) {
        self.start = Some(start);
        self.emit_endpoints();
    }

    pub fn set_end(&mut self, end: Coordinate) {
        self.end = Some(end);
        self.emit_endpoints();
    }

    pub fn endpoints(&self) -> Option<RouteEndpoints> {
        Some(RouteEndpoints::new(self.start?, self.end?))
    }

    pub fn set_route(&mut self, route: Arc<Route>) -> u64 {
        self.generation += 1;
        let length_km = route.length_km();
        self.route = Some(route);
        self.samples.clear();
        self.averages.clear();
        self.emit(SessionEvent::RouteChanged {
            generation: self.generation,
            length_km,
        });
        self.generation
    }

    pub fn begin_sampling(&self) -> Option<SamplingTicket> {
        self.route.as_ref().map(|route| SamplingTicket {
            generation: self.generation,
            route: Arc::clone(route),
        })
    }

    /// Replaces the sample overlay. Returns false, and changes nothing, when
    /// the samples belong to a route that has since been replaced.
    pub fn apply_samples(&mut self, generation: u64, samples: Vec<SamplePoint>) -> bool {
        if generation != self.generation {
            tracing::debug!(
                "Discarding samples for route generation {} (current {})",
                generation,
                self.generation
            );
            return false;
        }
        self.averages = average_by_parameter(&samples);
        self.samples = samples;
        self.emit(SessionEvent::SamplesUpdated {
            generation,
            samples: self.samples.len(),
        });
        true
    }

    fn emit_endpoints(&self) {
        self.emit(SessionEvent::EndpointsChanged {
            start: self.start,
            end: self.end,
        });
    }

    fn emit(&self, event: SessionEvent) {
        for observer in &self.observers {
            observer(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;

    fn route(lat: f64) -> Arc<Route> {
        Arc::new(Route::new(vec![Coordinate::new(0.0, 0.0), Coordinate::new(0.0, lat)]).unwrap())
    }

    fn reading(value: f64) -> SamplePoint {
        SamplePoint {
            coordinates: Coordinate::new(0.0, 0.0),
            distance_km: 0.0,
            value,
            unit: "µg/m³".to_string(),
            parameter: "pm25".to_string(),
            date: Utc::now(),
        }
    }

    fn recording(session: &mut Session) -> Arc<Mutex<Vec<SessionEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        session.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        events
    }

    #[test]
    fn endpoints_notify_observers() {
        let mut session = Session::new();
        let events = recording(&mut session);

        session.set_start(Coordinate::new(1.0, 2.0));
        assert!(session.endpoints().is_none());
        session.set_end(Coordinate::new(3.0, 4.0));

        let endpoints = session.endpoints().unwrap();
        assert_eq!(endpoints.end, Coordinate::new(3.0, 4.0));
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            SessionEvent::EndpointsChanged {
                start: Some(Coordinate::new(1.0, 2.0)),
                end: Some(Coordinate::new(3.0, 4.0)),
            }
        );
    }

    #[test]
    fn samples_for_current_route_are_applied() {
        let mut session = Session::new();
        assert!(session.begin_sampling().is_none());

        session.set_route(route(1.0));
        let ticket = session.begin_sampling().unwrap();
        assert!(session.apply_samples(ticket.generation, vec![reading(10.0), reading(20.0)]));

        assert_eq!(session.samples().len(), 2);
        assert_eq!(session.averages()[0].average, 15.0);
    }

    #[test]
    fn stale_samples_are_discarded() {
        let mut session = Session::new();
        let events = recording(&mut session);

        session.set_route(route(1.0));
        let stale = session.begin_sampling().unwrap();
        let generation = session.set_route(route(2.0));
        assert!(generation > stale.generation);

        assert!(!session.apply_samples(stale.generation, vec![reading(99.0)]));
        assert!(session.samples().is_empty());
        assert!(session.averages().is_empty());

        let fresh = session.begin_sampling().unwrap();
        assert_eq!(fresh.route.points()[1].lat, 2.0);
        assert!(session.apply_samples(fresh.generation, vec![reading(5.0)]));

        let events = events.lock().unwrap();
        assert!(matches!(events.last(), Some(SessionEvent::SamplesUpdated { samples: 1, .. })));
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn new_route_clears_previous_samples() {
        let mut session = Session::new();
        let generation = session.set_route(route(1.0));
        session.apply_samples(generation, vec![reading(1.0)]);
        session.set_route(route(1.5));
        assert!(session.samples().is_empty());
    }
}
