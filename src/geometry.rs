use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};

/// Distances below this are treated as coincident points.
pub const COINCIDENT_EPS: f64 = 1e-9;

/// 2D vector used for anchors, label positions and offsets.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const ZERO: Point2D = Point2D { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unit vector at `angle` radians from the +X axis.
    pub fn from_angle(angle: f64) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    pub fn distance(self, other: Point2D) -> f64 {
        (self - other).norm()
    }

    pub fn distance_sq(self, other: Point2D) -> f64 {
        (self - other).norm_sq()
    }

    pub fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn norm_sq(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    /// Angle in radians, measured counter-clockwise from +X.
    pub fn angle(self) -> f64 {
        self.y.atan2(self.x)
    }

    /// Unit vector in the same direction, or `None` for a (near) zero vector.
    pub fn normalized(self) -> Option<Point2D> {
        let len = self.norm();
        if len < COINCIDENT_EPS {
            None
        } else {
            Some(self / len)
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Point2D {
    type Output = Point2D;
    fn add(self, rhs: Point2D) -> Point2D {
        Point2D::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point2D {
    fn add_assign(&mut self, rhs: Point2D) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Point2D {
    type Output = Point2D;
    fn sub(self, rhs: Point2D) -> Point2D {
        Point2D::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Point2D {
    fn sub_assign(&mut self, rhs: Point2D) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f64> for Point2D {
    type Output = Point2D;
    fn mul(self, rhs: f64) -> Point2D {
        Point2D::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f64> for Point2D {
    type Output = Point2D;
    fn div(self, rhs: f64) -> Point2D {
        Point2D::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Point2D {
    type Output = Point2D;
    fn neg(self) -> Point2D {
        Point2D::new(-self.x, -self.y)
    }
}

impl From<(f64, f64)> for Point2D {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// Arithmetic mean of a point set, `None` when empty.
pub fn centroid<I>(points: I) -> Option<Point2D>
where
    I: IntoIterator<Item = Point2D>,
{
    let mut sum = Point2D::ZERO;
    let mut count = 0usize;
    for p in points {
        sum += p;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Axis-aligned bounding rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Point2D,
    pub max: Point2D,
}

impl Bounds {
    pub fn new(min: Point2D, max: Point2D) -> Self {
        Self {
            min: Point2D::new(min.x.min(max.x), min.y.min(max.y)),
            max: Point2D::new(min.x.max(max.x), min.y.max(max.y)),
        }
    }

    /// Smallest rectangle enclosing every point, `None` when empty.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Point2D>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut min = first;
        let mut max = first;
        for p in iter {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Some(Self { min, max })
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point2D {
        (self.min + self.max) * 0.5
    }

    pub fn contains(&self, p: Point2D) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Grow every side by `pad`.
    pub fn inflate(&self, pad: f64) -> Self {
        Self {
            min: Point2D::new(self.min.x - pad, self.min.y - pad),
            max: Point2D::new(self.max.x + pad, self.max.y + pad),
        }
    }

    /// Squared distance from `p` to the closest point of the rectangle.
    pub fn distance_sq_to(&self, p: Point2D) -> f64 {
        let cx = p.x.clamp(self.min.x, self.max.x);
        let cy = p.y.clamp(self.min.y, self.max.y);
        p.distance_sq(Point2D::new(cx, cy))
    }

    /// The four quadrants in NW, NE, SW, SE order.
    pub fn quadrants(&self) -> [Bounds; 4] {
        let c = self.center();
        [
            Bounds::new(Point2D::new(self.min.x, c.y), Point2D::new(c.x, self.max.y)),
            Bounds::new(c, self.max),
            Bounds::new(self.min, c),
            Bounds::new(Point2D::new(c.x, self.min.y), Point2D::new(self.max.x, c.y)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn distance_and_angle() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(3.0, 4.0);
        assert_abs_diff_eq!(a.distance(b), 5.0);
        assert_abs_diff_eq!(Point2D::new(0.0, 2.0).angle(), std::f64::consts::FRAC_PI_2);
    }

    #[test]
    fn zero_vector_has_no_direction() {
        assert!(Point2D::ZERO.normalized().is_none());
        let unit = Point2D::new(0.0, -7.0).normalized().unwrap();
        assert_abs_diff_eq!(unit.y, -1.0);
    }

    #[test]
    fn centroid_of_square() {
        let c = centroid([
            Point2D::new(0.0, 0.0),
            Point2D::new(2.0, 0.0),
            Point2D::new(2.0, 2.0),
            Point2D::new(0.0, 2.0),
        ])
        .unwrap();
        assert_eq!(c, Point2D::new(1.0, 1.0));
        assert!(centroid(std::iter::empty()).is_none());
    }

    #[test]
    fn bounds_distance_is_zero_inside() {
        let b = Bounds::new(Point2D::new(0.0, 0.0), Point2D::new(4.0, 4.0));
        assert_eq!(b.distance_sq_to(Point2D::new(1.0, 3.0)), 0.0);
        assert_abs_diff_eq!(b.distance_sq_to(Point2D::new(7.0, 8.0)), 25.0);
    }

    #[test]
    fn quadrants_cover_parent() {
        let b = Bounds::new(Point2D::new(0.0, 0.0), Point2D::new(4.0, 2.0));
        let quads = b.quadrants();
        assert_eq!(quads[0].min, Point2D::new(0.0, 1.0));
        assert_eq!(quads[3].max, Point2D::new(4.0, 1.0));
        for q in quads {
            assert_abs_diff_eq!(q.width(), 2.0);
            assert_abs_diff_eq!(q.height(), 1.0);
        }
    }
}
