use crate::models::Coordinate;

const EARTH_RADIUS_KM: f64 = 6_371.0;
pub const METERS_PER_DEGREE_LAT: f64 = 111_000.0;

pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

pub fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
    haversine_km(a, b) * 1000.0
}

pub fn approximate_distance_km(path: &[Coordinate]) -> f64 {
    path.windows(2).map(|w| haversine_km(w[0], w[1])).sum()
}

/// Initial bearing from `from` towards `to`, in degrees clockwise from north.
pub fn bearing_deg(from: Coordinate, to: Coordinate) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let dlon = (to.lon - from.lon).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    normalize_bearing(y.atan2(x).to_degrees())
}

/// Shift a coordinate by `distance_m` along `bearing_rad` using a local
/// flat-earth approximation. Only meaningful at city scale.
pub fn offset_coordinate(origin: Coordinate, distance_m: f64, bearing_rad: f64) -> Coordinate {
    let dlat = distance_m * bearing_rad.cos() / METERS_PER_DEGREE_LAT;
    let dlon =
        distance_m * bearing_rad.sin() / (METERS_PER_DEGREE_LAT * origin.lat.to_radians().cos());
    Coordinate {
        lat: origin.lat + dlat,
        lon: origin.lon + dlon,
    }
}

pub fn normalize_bearing(bearing_deg: f64) -> f64 {
    let mut value = bearing_deg % 360.0;
    if value < 0.0 {
        value += 360.0;
    }
    if value >= 360.0 {
        value = 0.0;
    }
    value
}
