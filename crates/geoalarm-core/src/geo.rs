//! Great-circle geometry on a spherical Earth

use geoalarm_api::Coordinate;

/// Mean Earth radius used for every distance computation
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance between two coordinates, in meters
pub fn haversine_distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lng = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1 for antipodal points
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_METERS * c
}

/// Point reached by travelling `distance_meters` from `origin` along the
/// initial `bearing_degrees` (clockwise from north).
pub fn destination(origin: Coordinate, bearing_degrees: f64, distance_meters: f64) -> Coordinate {
    let lat1 = origin.latitude.to_radians();
    let lng1 = origin.longitude.to_radians();
    let bearing = bearing_degrees.to_radians();
    let angular = distance_meters / EARTH_RADIUS_METERS;

    let lat2 = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
    let lng2 = lng1
        + (bearing.sin() * angular.sin() * lat1.cos()).atan2(angular.cos() - lat1.sin() * lat2.sin());

    // Normalize to [-180, 180)
    let lng2 = (lng2.to_degrees() + 540.0).rem_euclid(360.0) - 180.0;

    Coordinate::new(lat2.to_degrees(), lng2)
}
