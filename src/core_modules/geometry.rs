// THEORY:
// The `geometry` module is the foundation layer of the targeting engine. Every
// higher layer (detections, masks, tracks, aiming) speaks in terms of these two
// types, so they are kept small, `Copy`, and free of any policy.
//
// Key architectural principles:
// 1.  **Screen Space**: A `Point` is a real-valued screen coordinate in pixels (or a
//     fraction of the screen when used for mask regions). The y axis grows downward.
// 2.  **Area as Product**: `Point::product` multiplies the two components. It is only
//     meaningful for the difference of two box corners, i.e. an axis-aligned area.
// 3.  **Inclusive Boxes**: A `Rect` is closed on all four edges. A point lying exactly
//     on an edge is inside.

use serde::Serialize;
use std::ops::{Add, Div, Mul, Sub};

/// A 2D point or vector in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance between two points.
    pub fn distance_to(self, other: Point) -> f64 {
        let d = other - self;
        (d.x * d.x + d.y * d.y).sqrt()
    }

    /// `x * y`. Used for the area spanned by two box corners.
    pub fn product(self) -> f64 {
        self.x * self.y
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

/// Elementwise multiplication, e.g. fractional coordinates times screen size.
impl Mul<Point> for Point {
    type Output = Point;

    fn mul(self, rhs: Point) -> Point {
        Point::new(self.x * rhs.x, self.y * rhs.y)
    }
}

impl Div<f64> for Point {
    type Output = Point;

    fn div(self, rhs: f64) -> Point {
        Point::new(self.x / rhs, self.y / rhs)
    }
}

impl Div<Point> for Point {
    type Output = Point;

    fn div(self, rhs: Point) -> Point {
        Point::new(self.x / rhs.x, self.y / rhs.y)
    }
}

/// An axis-aligned box given by its top-left and bottom-right corners.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub top_left: Point,
    pub bottom_right: Point,
}

impl Rect {
    pub const fn new(top_left: Point, bottom_right: Point) -> Self {
        Self {
            top_left,
            bottom_right,
        }
    }

    /// Builds the box of the given size centred on `center`.
    pub fn centered(center: Point, width: f64, height: f64) -> Self {
        let half = Point::new(width / 2.0, height / 2.0);
        Self::new(center - half, center + half)
    }

    pub fn width(&self) -> f64 {
        self.bottom_right.x - self.top_left.x
    }

    pub fn height(&self) -> f64 {
        self.bottom_right.y - self.top_left.y
    }

    pub fn size(&self) -> Point {
        self.bottom_right - self.top_left
    }

    pub fn area(&self) -> f64 {
        self.size().product()
    }

    pub fn center(&self) -> Point {
        (self.top_left + self.bottom_right) / 2.0
    }

    /// Edge-inclusive containment test.
    pub fn contains(&self, point: Point) -> bool {
        self.top_left.x <= point.x
            && point.x <= self.bottom_right.x
            && self.top_left.y <= point.y
            && point.y <= self.bottom_right.y
    }

    /// True if the two boxes share interior area. Boxes that only touch along an
    /// edge or corner do not overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        !(self.top_left.x >= other.bottom_right.x
            || self.top_left.y >= other.bottom_right.y
            || self.bottom_right.x <= other.top_left.x
            || self.bottom_right.y <= other.top_left.y)
    }

    /// The overlapping box, or `None` if the boxes do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Rect::new(
            Point::new(
                self.top_left.x.max(other.top_left.x),
                self.top_left.y.max(other.top_left.y),
            ),
            Point::new(
                self.bottom_right.x.min(other.bottom_right.x),
                self.bottom_right.y.min(other.bottom_right.y),
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_is_componentwise() {
        let a = Point::new(4.0, 6.0);
        let b = Point::new(1.0, 2.0);
        assert_eq!(a - b, Point::new(3.0, 4.0));
        assert_eq!(a + b, Point::new(5.0, 8.0));
        assert_eq!(a * 0.5, Point::new(2.0, 3.0));
        assert_eq!(a * b, Point::new(4.0, 12.0));
        assert_eq!(a / 2.0, Point::new(2.0, 3.0));
        assert_eq!(a / b, Point::new(4.0, 3.0));
    }

    #[test]
    fn distance_and_product() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_eq!(a.distance_to(b), 5.0);
        assert_eq!(b.distance_to(a), 5.0);
        assert_eq!((b - a).product(), 12.0);
    }

    #[test]
    fn rect_contains_is_edge_inclusive() {
        let r = Rect::new(Point::new(10.0, 10.0), Point::new(20.0, 30.0));
        assert!(r.contains(Point::new(10.0, 10.0)));
        assert!(r.contains(Point::new(20.0, 30.0)));
        assert!(r.contains(Point::new(15.0, 30.0)));
        assert!(!r.contains(Point::new(20.0001, 15.0)));
        assert!(!r.contains(Point::new(15.0, 9.999)));
    }

    #[test]
    fn touching_rects_do_not_intersect() {
        let a = Rect::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let b = Rect::new(Point::new(10.0, 0.0), Point::new(20.0, 10.0));
        assert!(a.intersection(&b).is_none());

        let c = Rect::new(Point::new(5.0, 5.0), Point::new(20.0, 20.0));
        let i = a.intersection(&c).unwrap();
        assert_eq!(i, Rect::new(Point::new(5.0, 5.0), Point::new(10.0, 10.0)));
        assert_eq!(i.area(), 25.0);
    }

    #[test]
    fn centered_rect_round_trips_center() {
        let r = Rect::centered(Point::new(100.0, 50.0), 20.0, 40.0);
        assert_eq!(r.top_left, Point::new(90.0, 30.0));
        assert_eq!(r.center(), Point::new(100.0, 50.0));
        assert_eq!(r.width(), 20.0);
        assert_eq!(r.height(), 40.0);
    }
}
