use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use geo_types::Point;
use gpx::{Gpx, GpxVersion, Track, TrackSegment, Waypoint};

use crate::error::RouteError;
use crate::models::{Coordinate, RouteInfo};
use crate::player::route_vertices;

const CREATOR: &str = "trailquest";

/// GPX 1.1 for a route: one track along the polyline (instruction
/// coordinates when there is none) and a waypoint per instruction.
/// Returned base64-encoded.
pub fn encode_route_as_gpx(route: &RouteInfo) -> Result<String, RouteError> {
    let track_points = route_vertices(route);
    if track_points.is_empty() {
        return Err(RouteError::EmptyRoute);
    }

    let mut gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some(CREATOR.into()),
        ..Default::default()
    };
    let mut track = Track {
        name: Some(format!("{} ({})", route.route_type.label(), route.transport_type.label())),
        description: Some(route.description.clone()),
        ..Default::default()
    };

    let mut segment = TrackSegment::new();
    segment.points.extend(track_points.iter().map(to_waypoint));
    track.segments.push(segment);
    gpx.tracks.push(track);

    for instruction in &route.instructions {
        let mut waypoint = to_waypoint(&instruction.coordinate);
        waypoint.name = Some(instruction.instruction_text.clone());
        waypoint.description = Some(instruction.distance_text.clone());
        gpx.waypoints.push(waypoint);
    }

    let mut buffer = Vec::new();
    gpx::write(&gpx, &mut buffer)?;
    Ok(BASE64.encode(buffer))
}

fn to_waypoint(coord: &Coordinate) -> Waypoint {
    Waypoint::new(Point::new(coord.lon, coord.lat))
}
