use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{Coordinate, TransportType};

#[derive(Debug, Clone, PartialEq)]
pub struct DirectionsStep {
    pub instruction_text: String,
    pub distance_m: f64,
    pub polyline: Vec<Coordinate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectionsRoute {
    pub distance_m: f64,
    pub travel_time_s: f64,
    pub steps: Vec<DirectionsStep>,
    pub polyline: Vec<Coordinate>,
}

#[derive(Debug, thiserror::Error)]
pub enum DirectionsError {
    #[error("directions request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("directions service returned {code}: {message}")]
    Api { code: String, message: String },
    #[error("no directions profile for {0:?}")]
    UnsupportedTransport(TransportType),
    #[error("directions service is not configured")]
    Unavailable,
}

/// Turn-by-turn routing backend.
///
/// Implementations return every candidate the backend offers; an empty list
/// is a valid answer and is treated by callers the same as an error.
#[async_trait]
pub trait DirectionsProvider: Send + Sync {
    async fn request_routes(
        &self,
        start: Coordinate,
        end: Coordinate,
        transport: TransportType,
        allow_alternates: bool,
    ) -> Result<Vec<DirectionsRoute>, DirectionsError>;
}

/// Provider used when no routing backend is configured; every request fails.
pub struct UnavailableDirections;

#[async_trait]
impl DirectionsProvider for UnavailableDirections {
    async fn request_routes(
        &self,
        _start: Coordinate,
        _end: Coordinate,
        _transport: TransportType,
        _allow_alternates: bool,
    ) -> Result<Vec<DirectionsRoute>, DirectionsError> {
        Err(DirectionsError::Unavailable)
    }
}

/// Routes via an OSRM HTTP endpoint.
pub struct OsrmDirections {
    client: reqwest::Client,
    endpoint: String,
}

impl OsrmDirections {
    pub fn new(endpoint: &str) -> Result<Self, DirectionsError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn profile(transport: TransportType) -> Option<&'static str> {
        match transport {
            TransportType::Walking => Some("foot"),
            TransportType::Driving => Some("driving"),
            TransportType::Transit => None,
        }
    }
}

#[async_trait]
impl DirectionsProvider for OsrmDirections {
    async fn request_routes(
        &self,
        start: Coordinate,
        end: Coordinate,
        transport: TransportType,
        allow_alternates: bool,
    ) -> Result<Vec<DirectionsRoute>, DirectionsError> {
        let profile =
            Self::profile(transport).ok_or(DirectionsError::UnsupportedTransport(transport))?;
        let url = format!(
            "{}/route/v1/{}/{},{};{},{}?alternatives={}&steps=true&geometries=geojson&overview=full",
            self.endpoint, profile, start.lon, start.lat, end.lon, end.lat, allow_alternates
        );

        tracing::debug!("requesting {profile} directions: {url}");
        let response: OsrmResponse = self.client.get(&url).send().await?.json().await?;
        if response.code != "Ok" {
            return Err(DirectionsError::Api {
                code: response.code,
                message: response.message.unwrap_or_default(),
            });
        }

        Ok(response
            .routes
            .unwrap_or_default()
            .into_iter()
            .map(OsrmRoute::into_directions)
            .collect())
    }
}

#[derive(Deserialize)]
struct OsrmResponse {
    code: String,
    message: Option<String>,
    routes: Option<Vec<OsrmRoute>>,
}

#[derive(Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    geometry: OsrmGeometry,
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

#[derive(Deserialize)]
struct OsrmLeg {
    #[serde(default)]
    steps: Vec<OsrmStep>,
}

#[derive(Deserialize)]
struct OsrmStep {
    distance: f64,
    #[serde(default)]
    name: String,
    maneuver: OsrmManeuver,
    geometry: OsrmGeometry,
}

#[derive(Deserialize)]
struct OsrmManeuver {
    #[serde(rename = "type")]
    kind: String,
    modifier: Option<String>,
}

impl OsrmGeometry {
    fn into_coordinates(self) -> Vec<Coordinate> {
        self.coordinates
            .into_iter()
            .map(|[lon, lat]| Coordinate { lat, lon })
            .collect()
    }
}

impl OsrmStep {
    fn instruction_text(&self) -> String {
        let mut text = self.maneuver.kind.clone();
        if let Some(modifier) = &self.maneuver.modifier {
            text.push(' ');
            text.push_str(modifier);
        }
        if !self.name.is_empty() {
            text.push_str(" onto ");
            text.push_str(&self.name);
        }
        text
    }
}

impl OsrmRoute {
    fn into_directions(self) -> DirectionsRoute {
        let steps = self
            .legs
            .into_iter()
            .flat_map(|leg| leg.steps)
            .map(|step| DirectionsStep {
                instruction_text: step.instruction_text(),
                distance_m: step.distance,
                polyline: step.geometry.into_coordinates(),
            })
            .collect();

        DirectionsRoute {
            distance_m: self.distance,
            travel_time_s: self.duration,
            steps,
            polyline: self.geometry.into_coordinates(),
        }
    }
}
