//! 2D line-segment tests over projected joint positions.

use crate::source::types::Point2;

/// Horizontal extent below which a segment is treated as vertical.
const VERTICAL_EPSILON: f64 = 1e-9;

/// Slope difference below which two lines are treated as parallel.
const PARALLEL_EPSILON: f64 = 1e-12;

/// Whether segment `a1-a2` and segment `b1-b2` cross.
///
/// Touching endpoints and collinear segments count as crossing. The result
/// does not depend on which segment is passed first.
pub fn cross_hit_test(a1: Point2, a2: Point2, b1: Point2, b2: Point2) -> bool {
    let a = a2 - a1;
    let b = b2 - b1;

    let v1 = a.cross(b1 - a1);
    let v2 = a.cross(b2 - a1);
    let m1 = b.cross(a1 - b1);
    let m2 = b.cross(a2 - b1);

    v1 * v2 <= 0.0 && m1 * m2 <= 0.0
}

/// Slope and intercept of the line through `p1` and `p2`, or `None` when vertical.
fn slope_intercept(p1: Point2, p2: Point2) -> Option<(f64, f64)> {
    let dx = p1.x - p2.x;
    if dx.abs() <= VERTICAL_EPSILON {
        return None;
    }
    let slope = (p1.y - p2.y) / dx;
    let intercept = (p1.x * p2.y - p1.y * p2.x) / dx;
    Some((slope, intercept))
}

/// Intersection of the infinite lines through the two segments.
///
/// The result is not clipped to the segments. A vertical line is handled by
/// fixing `x` and evaluating the other line there. Returns `None` when the
/// lines are parallel, including when both are vertical.
pub fn cross_point(a1: Point2, a2: Point2, b1: Point2, b2: Point2) -> Option<Point2> {
    match (slope_intercept(a1, a2), slope_intercept(b1, b2)) {
        (Some((ma, ca)), Some((mb, cb))) => {
            if (ma - mb).abs() <= PARALLEL_EPSILON {
                return None;
            }
            let x = (cb - ca) / (ma - mb);
            Some(Point2::new(x, ma * x + ca))
        }
        (None, Some((mb, cb))) => {
            let x = (a1.x + a2.x) / 2.0;
            Some(Point2::new(x, mb * x + cb))
        }
        (Some((ma, ca)), None) => {
            let x = (b1.x + b2.x) / 2.0;
            Some(Point2::new(x, ma * x + ca))
        }
        (None, None) => None,
    }
}

/// Crossing point of two segments, if they cross.
///
/// When the segments cross but their lines have no single intersection
/// (collinear overlap), the centroid of the four endpoints is returned.
pub fn crossing(a1: Point2, a2: Point2, b1: Point2, b2: Point2) -> Option<Point2> {
    if !cross_hit_test(a1, a2, b1, b2) {
        return None;
    }

    cross_point(a1, a2, b1, b2).or_else(|| {
        Some(Point2::new(
            (a1.x + a2.x + b1.x + b2.x) / 4.0,
            (a1.y + a2.y + b1.y + b2.y) / 4.0,
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    fn assert_close(actual: Point2, expected: Point2) {
        assert!(
            (actual.x - expected.x).abs() < 1e-9 && (actual.y - expected.y).abs() < 1e-9,
            "{actual:?} != {expected:?}"
        );
    }

    #[test]
    fn test_diagonals_cross_at_center() {
        let (a1, a2, b1, b2) = (p(0.0, 0.0), p(10.0, 10.0), p(0.0, 10.0), p(10.0, 0.0));
        assert!(cross_hit_test(a1, a2, b1, b2));
        assert_close(cross_point(a1, a2, b1, b2).unwrap(), p(5.0, 5.0));
    }

    #[test]
    fn test_parallel_segments_do_not_cross() {
        let (a1, a2, b1, b2) = (p(0.0, 0.0), p(10.0, 0.0), p(0.0, 5.0), p(10.0, 5.0));
        assert!(!cross_hit_test(a1, a2, b1, b2));
        assert_eq!(cross_point(a1, a2, b1, b2), None);
        assert_eq!(crossing(a1, a2, b1, b2), None);
    }

    #[test]
    fn test_hit_test_is_symmetric() {
        let cases = [
            (p(0.0, 0.0), p(10.0, 10.0), p(0.0, 10.0), p(10.0, 0.0)),
            (p(0.0, 0.0), p(4.0, 1.0), p(5.0, 5.0), p(9.0, -3.0)),
            (p(1.0, 1.0), p(3.0, 3.0), p(3.0, 3.0), p(6.0, 0.0)),
            (p(0.0, 0.0), p(10.0, 0.0), p(0.0, 5.0), p(10.0, 5.0)),
            (p(-2.5, 7.0), p(3.0, -1.0), p(0.0, 0.0), p(0.0, 9.0)),
        ];
        for (a1, a2, b1, b2) in cases {
            assert_eq!(
                cross_hit_test(a1, a2, b1, b2),
                cross_hit_test(b1, b2, a1, a2)
            );
        }
    }

    #[test]
    fn test_touching_endpoint_counts_as_crossing() {
        assert!(cross_hit_test(
            p(0.0, 0.0),
            p(5.0, 5.0),
            p(5.0, 5.0),
            p(10.0, 0.0)
        ));
    }

    #[test]
    fn test_disjoint_segments_on_crossing_lines() {
        // Lines meet at (5, 5) but segment A stops short of it
        let (a1, a2, b1, b2) = (p(0.0, 0.0), p(2.0, 2.0), p(0.0, 10.0), p(10.0, 0.0));
        assert!(!cross_hit_test(a1, a2, b1, b2));
        assert_close(cross_point(a1, a2, b1, b2).unwrap(), p(5.0, 5.0));
    }

    #[test]
    fn test_vertical_segment_branch() {
        let (a1, a2, b1, b2) = (p(5.0, 0.0), p(5.0, 10.0), p(0.0, 0.0), p(10.0, 10.0));
        assert!(cross_hit_test(a1, a2, b1, b2));
        assert_close(cross_point(a1, a2, b1, b2).unwrap(), p(5.0, 5.0));
        assert_close(cross_point(b1, b2, a1, a2).unwrap(), p(5.0, 5.0));
    }

    #[test]
    fn test_both_vertical_has_no_point() {
        let (a1, a2, b1, b2) = (p(1.0, 0.0), p(1.0, 4.0), p(3.0, 0.0), p(3.0, 4.0));
        assert!(!cross_hit_test(a1, a2, b1, b2));
        assert_eq!(cross_point(a1, a2, b1, b2), None);
    }

    #[test]
    fn test_collinear_overlap_falls_back_to_centroid() {
        let (a1, a2, b1, b2) = (p(0.0, 0.0), p(4.0, 4.0), p(2.0, 2.0), p(6.0, 6.0));
        assert!(cross_hit_test(a1, a2, b1, b2));
        assert_eq!(cross_point(a1, a2, b1, b2), None);
        assert_close(crossing(a1, a2, b1, b2).unwrap(), p(3.0, 3.0));
    }
}
