use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{AnimationError, GeoError};
use crate::geo::{bearing_between, lerp, Coordinate, Route};

pub const SPEED_KM_PER_SEC: f64 = 0.4;
pub const LOOKAHEAD_KM: f64 = 0.0005;
pub const CAMERA_WEIGHT: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Stopped,
    Playing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraFrame {
    pub progress_km: f64,
    pub marker_position: Coordinate,
    pub camera_target: Coordinate,
    pub bearing: f64,
}

pub trait FrameSink {
    fn emit(&mut self, frame: &CameraFrame);
}

impl FrameSink for Vec<CameraFrame> {
    fn emit(&mut self, frame: &CameraFrame) {
        self.push(frame.clone());
    }
}

impl FrameSink for mpsc::UnboundedSender<CameraFrame> {
    fn emit(&mut self, frame: &CameraFrame) {
        // a closed receiver just means nobody is watching any more
        let _ = self.send(frame.clone());
    }
}

pub fn camera_frame(route: &Route, progress_km: f64) -> Result<CameraFrame, GeoError> {
    let length = route.length_km();
    let point_along = route.point_at(progress_km)?;
    let point_ahead = route.point_at((progress_km + LOOKAHEAD_KM).min(length))?;
    let point_behind = route.point_at((progress_km - LOOKAHEAD_KM).max(0.0))?;

    let bearing = if point_ahead != point_along {
        bearing_between(point_along, point_ahead)
    } else {
        // at the end of the route, keep the last travel heading instead of snapping to north
        bearing_between(point_behind, point_along)
    };

    Ok(CameraFrame {
        progress_km,
        marker_position: point_along,
        camera_target: lerp(point_behind, point_along, CAMERA_WEIGHT),
        bearing,
    })
}

/// Playback state machine for one route.
///
/// Progress during playback is derived from wall-clock time since the last
/// anchor, so late or skipped ticks never slow the simulated drive down.
pub struct AnimationDriver<S> {
    route: Option<Arc<Route>>,
    progress_km: f64,
    playback: PlaybackState,
    anchor: Option<(Instant, f64)>,
    speed_km_per_sec: f64,
    sink: S,
}

impl<S: FrameSink> AnimationDriver<S> {
    pub fn new(sink: S) -> Self {
        Self {
            route: None,
            progress_km: 0.0,
            playback: PlaybackState::Stopped,
            anchor: None,
            speed_km_per_sec: SPEED_KM_PER_SEC,
            sink,
        }
    }

    pub fn with_speed(mut self, speed_km_per_sec: f64) -> Self {
        self.speed_km_per_sec = speed_km_per_sec;
        self
    }

    pub fn route(&self) -> Option<&Arc<Route>> {
        self.route.as_ref()
    }

    pub fn progress_km(&self) -> f64 {
        self.progress_km
    }

    pub fn playback(&self) -> PlaybackState {
        self.playback
    }

    pub fn is_playing(&self) -> bool {
        self.playback == PlaybackState::Playing
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn set_route(&mut self, route: Arc<Route>) -> Result<CameraFrame, AnimationError> {
        self.playback = PlaybackState::Stopped;
        self.anchor = None;
        self.progress_km = 0.0;
        self.route = Some(route);
        self.emit_current()
    }

    pub fn seek(&mut self, distance_km: f64, now: Instant) -> Result<CameraFrame, AnimationError> {
        let route = self.route.as_ref().ok_or(AnimationError::NoRoute)?;
        self.progress_km = route.clamp_distance(distance_km);
        if self.is_playing() {
            self.anchor = Some((now, self.progress_km));
        }
        self.emit_current()
    }

    pub fn play(&mut self, now: Instant) -> Result<(), AnimationError> {
        let route = self.route.as_ref().ok_or(AnimationError::NoRoute)?;
        if self.is_playing() {
            return Ok(());
        }
        if self.progress_km >= route.length_km() {
            self.progress_km = 0.0;
        }
        self.anchor = Some((now, self.progress_km));
        self.playback = PlaybackState::Playing;
        tracing::debug!("Playback started at {:.3} km", self.progress_km);
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.is_playing() {
            tracing::debug!("Playback paused at {:.3} km", self.progress_km);
        }
        self.playback = PlaybackState::Stopped;
        self.anchor = None;
    }

    pub fn tick(&mut self, now: Instant) -> Result<Option<CameraFrame>, AnimationError> {
        if !self.is_playing() {
            return Ok(None);
        }
        let (Some(route), Some((anchored_at, anchored_km))) = (self.route.as_ref(), self.anchor) else {
            self.pause();
            return Ok(None);
        };

        let elapsed = now.saturating_duration_since(anchored_at).as_secs_f64();
        let length = route.length_km();
        self.progress_km = (anchored_km + elapsed * self.speed_km_per_sec).min(length);
        let reached_end = self.progress_km >= length;

        let frame = self.emit_current()?;
        if reached_end {
            self.playback = PlaybackState::Stopped;
            self.anchor = None;
            tracing::debug!("Playback reached the end of the route");
        }
        Ok(Some(frame))
    }

    fn emit_current(&mut self) -> Result<CameraFrame, AnimationError> {
        let route = self.route.as_ref().ok_or(AnimationError::NoRoute)?;
        let frame = camera_frame(route, self.progress_km)?;
        self.sink.emit(&frame);
        Ok(frame)
    }
}
