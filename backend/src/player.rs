//! Playback of a route along an evenly spaced path.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::{
    geo::{bearing_deg, haversine_m},
    models::{Coordinate, RouteInfo},
};

const EVENT_BUFFER: usize = 64;
const MIN_PLAYBACK_PERIOD: Duration = Duration::from_millis(1);
const MAX_PLAYBACK_PERIOD: Duration = Duration::from_secs(3_600);

/// Smallest spacing `resample` will subdivide to.
pub const MIN_STEP_SPACING_M: f64 = 1.0;

/// Split every segment into `ceil(length / spacing)` equal parts (at least
/// one), so consecutive points are never farther apart than `spacing_m`.
/// The first and last vertices are kept exactly. Spacings below
/// [`MIN_STEP_SPACING_M`] are raised to it.
pub fn resample(path: &[Coordinate], spacing_m: f64) -> Vec<Coordinate> {
    let (Some(&first), Some(&last)) = (path.first(), path.last()) else {
        return Vec::new();
    };
    if path.len() == 1 {
        return vec![first];
    }

    let spacing_m = effective_spacing(spacing_m);
    let mut resampled = Vec::with_capacity(path.len());
    for pair in path.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let parts = segment_parts(from, to, spacing_m);
        for step in 0..parts {
            resampled.push(from.interpolate(to, step as f64 / parts as f64));
        }
    }
    resampled.push(last);
    resampled
}

/// Number of points [`resample`] would produce, without allocating them.
pub fn resampled_len(path: &[Coordinate], spacing_m: f64) -> usize {
    if path.len() < 2 {
        return path.len();
    }
    let spacing_m = effective_spacing(spacing_m);
    path.windows(2)
        .map(|pair| segment_parts(pair[0], pair[1], spacing_m))
        .fold(1usize, usize::saturating_add)
}

/// A route's polyline, or its instruction coordinates when it has none.
pub fn route_vertices(route: &RouteInfo) -> Vec<Coordinate> {
    match &route.polyline {
        Some(polyline) if !polyline.is_empty() => polyline.clone(),
        _ => route.instructions.iter().map(|i| i.coordinate).collect(),
    }
}

fn effective_spacing(spacing_m: f64) -> f64 {
    if spacing_m.is_finite() && spacing_m > 0.0 {
        spacing_m.max(MIN_STEP_SPACING_M)
    } else {
        f64::INFINITY
    }
}

fn segment_parts(from: Coordinate, to: Coordinate, spacing_m: f64) -> usize {
    // Float to int casts saturate
    ((haversine_m(from, to) / spacing_m).ceil() as usize).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionChanged {
    pub coordinate: Coordinate,
    pub index: usize,
}

#[derive(Debug, Default)]
struct Cursor {
    path: Vec<Coordinate>,
    index: usize,
    heading: f64,
}

impl Cursor {
    fn reset(&mut self, path: Vec<Coordinate>) {
        self.path = path;
        self.index = 0;
        self.heading = 0.0;
        self.update_heading();
    }

    fn update_heading(&mut self) {
        if let (Some(&here), Some(&next)) =
            (self.path.get(self.index), self.path.get(self.index + 1))
        {
            self.heading = bearing_deg(here, next);
        }
    }

    fn forward(&mut self) -> Option<PositionChanged> {
        if self.index + 1 >= self.path.len() {
            return None;
        }
        self.index += 1;
        self.update_heading();
        self.position()
    }

    fn backward(&mut self) -> Option<PositionChanged> {
        if self.index == 0 || self.path.is_empty() {
            return None;
        }
        self.index -= 1;
        self.update_heading();
        self.position()
    }

    fn position(&self) -> Option<PositionChanged> {
        self.path.get(self.index).map(|&coordinate| PositionChanged {
            coordinate,
            index: self.index,
        })
    }
}

/// Cursor over a resampled route, steppable by hand or on a timer.
pub struct RoutePlayer {
    cursor: Arc<Mutex<Cursor>>,
    events: broadcast::Sender<PositionChanged>,
    playback: Option<JoinHandle<()>>,
    step_spacing_m: f64,
}

fn lock(cursor: &Mutex<Cursor>) -> MutexGuard<'_, Cursor> {
    cursor.lock().unwrap_or_else(PoisonError::into_inner)
}

fn publish(events: &broadcast::Sender<PositionChanged>, change: Option<PositionChanged>) -> bool {
    match change {
        Some(change) => {
            // No subscribers is fine
            let _ = events.send(change);
            true
        }
        None => false,
    }
}

impl RoutePlayer {
    pub fn new(step_spacing_m: f64) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            cursor: Arc::new(Mutex::new(Cursor::default())),
            events,
            playback: None,
            step_spacing_m,
        }
    }

    /// Load a route's polyline, or its instruction coordinates when the route
    /// has none.
    pub fn load(&mut self, route: &RouteInfo) {
        self.load_path(&route_vertices(route));
    }

    pub fn load_path(&mut self, vertices: &[Coordinate]) {
        self.stop();
        let path = resample(vertices, self.step_spacing_m);
        tracing::debug!(
            "loaded {} vertices as {} playback points",
            vertices.len(),
            path.len()
        );
        lock(&self.cursor).reset(path);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PositionChanged> {
        self.events.subscribe()
    }

    /// Returns false when already at the end.
    pub fn step_forward(&self) -> bool {
        let change = lock(&self.cursor).forward();
        publish(&self.events, change)
    }

    /// Returns false when already at the start.
    pub fn step_backward(&self) -> bool {
        let change = lock(&self.cursor).backward();
        publish(&self.events, change)
    }

    /// Step forward every `1 / speed` seconds until the end. Calling again
    /// restarts the timer at the new speed. The period is kept between 1 ms
    /// and one hour.
    pub fn play(&mut self, speed: f64) {
        self.stop();
        if !(speed.is_finite() && speed > 0.0) {
            tracing::warn!("ignoring playback speed {speed}");
            return;
        }

        let period = Duration::try_from_secs_f64(1.0 / speed)
            .unwrap_or(MAX_PLAYBACK_PERIOD)
            .clamp(MIN_PLAYBACK_PERIOD, MAX_PLAYBACK_PERIOD);
        let cursor = Arc::clone(&self.cursor);
        let events = self.events.clone();
        self.playback = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let change = lock(&cursor).forward();
                if !publish(&events, change) {
                    tracing::debug!("playback reached the end of the route");
                    break;
                }
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.playback.take() {
            handle.abort();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn current_position(&self) -> Option<PositionChanged> {
        lock(&self.cursor).position()
    }

    pub fn heading(&self) -> f64 {
        lock(&self.cursor).heading
    }

    pub fn path(&self) -> Vec<Coordinate> {
        lock(&self.cursor).path.clone()
    }

    /// `index / (len - 1)`; 0 for paths with fewer than two points.
    pub fn completion_fraction(&self) -> f64 {
        let cursor = lock(&self.cursor);
        if cursor.path.len() < 2 {
            return 0.0;
        }
        cursor.index as f64 / (cursor.path.len() - 1) as f64
    }

    pub fn remaining_distance_m(&self) -> f64 {
        let cursor = lock(&self.cursor);
        cursor
            .path
            .get(cursor.index..)
            .map(|rest| rest.windows(2).map(|w| haversine_m(w[0], w[1])).sum::<f64>())
            .unwrap_or(0.0)
    }
}

impl Drop for RoutePlayer {
    fn drop(&mut self) {
        self.stop();
    }
}
