//! Planar joint geometry

use crate::types::Point;

/// Angle subtended at vertex `b` by the segments to `a` and `c`, in degrees.
///
/// Computed from the difference of the two segments' polar angles and
/// folded into [0, 180]. Coincident points give a finite but meaningless value.
pub fn angle_at_vertex(a: Point, b: Point, c: Point) -> f64 {
    let radians = (c.y - b.y).atan2(c.x - b.x) - (a.y - b.y).atan2(a.x - b.x);
    let angle = radians.to_degrees().abs();

    if angle > 180.0 {
        360.0 - angle
    } else {
        angle
    }
}

/// Euclidean distance between two points
pub fn distance(a: Point, b: Point) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}
