//! Rectangles.

use cgmath::{EuclideanSpace, Point2, Vector2, Zero};
use std::ops;

/// A rectangle, used for view frames.
///
/// Frames are expressed in the coordinate system of the superview.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Rectangle origin.
    pub origin: Point2<f64>,

    /// Rectangle size.
    pub size: Vector2<f64>,
}

impl Rect {
    /// Creates a new rectangle.
    pub fn new(origin: Point2<f64>, size: Vector2<f64>) -> Rect {
        Rect { origin, size }
    }

    /// Creates a new rectangle from its components.
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Rect {
        Rect {
            origin: Point2::new(x, y),
            size: Vector2::new(width, height),
        }
    }

    /// A zero-sized rectangle at the origin.
    pub fn zero() -> Rect {
        Rect {
            origin: Point2::new(0., 0.),
            size: Vector2::zero(),
        }
    }
}

impl Default for Rect {
    fn default() -> Self {
        Rect::zero()
    }
}

impl ops::Add<Point2<f64>> for Rect {
    type Output = Rect;
    fn add(self, point: Point2<f64>) -> Rect {
        Rect {
            origin: self.origin + point.to_vec(),
            size: self.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_by_points() {
        let frame = Rect::from_xywh(1., 2., 3., 4.) + Point2::new(10., 20.);
        assert_eq!(frame, Rect::from_xywh(11., 22., 3., 4.));
        assert_eq!(Rect::default(), Rect::zero());
    }
}
