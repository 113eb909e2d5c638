//! Great-circle helpers shared by snapping and the graph builder.

use geo::HaversineDistance;
use geo::Point;

/// Meters between two (lat, lon) pairs.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let p1 = Point::new(lon1, lat1);
    let p2 = Point::new(lon2, lat2);
    p1.haversine_distance(&p2)
}

/// Initial bearing in degrees [0, 360) from one (lat, lon) to another.
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dlon = (lon2 - lon1).to_radians();
    let y = dlon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlon.cos();
    let deg = y.atan2(x).to_degrees();
    (deg + 360.0) % 360.0
}

/// Project a point onto the segment a→b (all (lat, lon)).
///
/// Returns the clamped fraction along the segment and the projected point.
/// Uses an equirectangular approximation, which is fine at road-edge scale.
pub fn project_onto_segment(
    p: (f64, f64),
    a: (f64, f64),
    b: (f64, f64),
) -> (f64, (f64, f64)) {
    let coslat = ((a.0 + b.0) * 0.5).to_radians().cos();
    let ax = a.1 * coslat;
    let bx = b.1 * coslat;
    let px = p.1 * coslat;

    let (dx, dy) = (bx - ax, b.0 - a.0);
    let len2 = dx * dx + dy * dy;
    if len2 <= f64::EPSILON {
        return (0.0, a);
    }

    let t = (((px - ax) * dx + (p.0 - a.0) * dy) / len2).clamp(0.0, 1.0);
    let lat = a.0 + (b.0 - a.0) * t;
    let lon = a.1 + (b.1 - a.1) * t;
    (t, (lat, lon))
}
