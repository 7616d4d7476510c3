//! Axis-aligned bounding boxes with cached corner points.

use super::fre;
use nalgebra::{self as na, Matrix4, Point3};

/// An axis-aligned box in world space, stored as the interval
/// `[xmin, xmax, ymin, ymax, zmin, zmax]` together with a cache of its eight
/// corner points and its center.
///
/// The cache is only refreshed by [`compute_points`](Self::compute_points),
/// which must be called after any interval mutation before the points or the
/// center are read.
///
/// Corner `i` takes the upper bound along x if bit 2 of `i` is set, along y if
/// bit 1 is set and along z if bit 0 is set, so the z-component varies
/// fastest. Corner `7 - i` is diagonally opposite to corner `i`.
///
/// A box that has not been expanded since it was reset has the intervals
/// `(+inf, -inf)` along every axis and is considered empty.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundingBox {
    intervals: [fre; 6],
    points: [Point3<fre>; 8],
    center: Point3<fre>,
}

impl BoundingBox {
    /// Creates an empty box.
    pub fn empty() -> Self {
        Self {
            intervals: EMPTY_INTERVALS,
            points: [Point3::origin(); 8],
            center: Point3::origin(),
        }
    }

    /// Creates a box with the given lower and upper corner, with the points
    /// already computed.
    pub fn new(lower_corner: Point3<fre>, upper_corner: Point3<fre>) -> Self {
        let mut aabb = Self::empty();
        aabb.intervals = [
            lower_corner.x,
            upper_corner.x,
            lower_corner.y,
            upper_corner.y,
            lower_corner.z,
            upper_corner.z,
        ];
        aabb.compute_points();
        aabb
    }

    /// Creates the box bounding the given points, with the points already
    /// computed. An empty point slice gives an empty box.
    pub fn aabb_for_points(points: &[Point3<fre>]) -> Self {
        let mut aabb = Self::empty();
        for point in points {
            aabb.expand_to_include_point(point);
        }
        aabb.compute_points();
        aabb
    }

    /// Creates the box bounding the corners of the given box after they have
    /// been transformed with the given matrix. Transforming an empty box gives
    /// an empty box.
    pub fn transformed(&self, transform: &Matrix4<fre>) -> Self {
        if self.is_empty() {
            return Self::empty();
        }
        let corners = self.corners_from_intervals();
        let transformed_corners = corners.map(|corner| transform.transform_point(&corner));
        Self::aabb_for_points(&transformed_corners)
    }

    /// Returns the interval array `[xmin, xmax, ymin, ymax, zmin, zmax]`.
    pub fn intervals(&self) -> &[fre; 6] {
        &self.intervals
    }

    /// Returns the lower corner implied by the current intervals.
    pub fn lower_corner(&self) -> Point3<fre> {
        Point3::new(self.intervals[0], self.intervals[2], self.intervals[4])
    }

    /// Returns the upper corner implied by the current intervals.
    pub fn upper_corner(&self) -> Point3<fre> {
        Point3::new(self.intervals[1], self.intervals[3], self.intervals[5])
    }

    /// Whether the box contains no points.
    pub fn is_empty(&self) -> bool {
        self.intervals[0] > self.intervals[1]
            || self.intervals[2] > self.intervals[3]
            || self.intervals[4] > self.intervals[5]
    }

    /// Returns the cached corner points.
    pub fn points(&self) -> &[Point3<fre>; 8] {
        &self.points
    }

    /// Returns the cached corner point with the given index.
    ///
    /// # Panics
    /// If `corner_idx` is larger than 7.
    pub fn corner(&self, corner_idx: usize) -> &Point3<fre> {
        &self.points[corner_idx]
    }

    /// Returns the cached center point.
    pub fn center(&self) -> &Point3<fre> {
        &self.center
    }

    /// Makes the box empty again.
    pub fn reset(&mut self) {
        self.intervals = EMPTY_INTERVALS;
    }

    /// Expands the intervals so that they include the given point.
    pub fn expand_to_include_point(&mut self, point: &Point3<fre>) {
        for dim in 0..3 {
            self.intervals[2 * dim] = self.intervals[2 * dim].min(point[dim]);
            self.intervals[2 * dim + 1] = self.intervals[2 * dim + 1].max(point[dim]);
        }
    }

    /// Expands the intervals so that they include the given box. Empty boxes
    /// are ignored.
    pub fn expand_to_include_box(&mut self, other: &Self) {
        if other.is_empty() {
            return;
        }
        for dim in 0..3 {
            self.intervals[2 * dim] = self.intervals[2 * dim].min(other.intervals[2 * dim]);
            self.intervals[2 * dim + 1] =
                self.intervals[2 * dim + 1].max(other.intervals[2 * dim + 1]);
        }
    }

    /// Whether the intervals of the given box lie within the intervals of this
    /// box. An empty box is contained in every box.
    pub fn contains_box(&self, other: &Self) -> bool {
        if other.is_empty() {
            return true;
        }
        (0..3).all(|dim| {
            self.intervals[2 * dim] <= other.intervals[2 * dim]
                && self.intervals[2 * dim + 1] >= other.intervals[2 * dim + 1]
        })
    }

    /// Refreshes the cached corner points and center from the intervals.
    pub fn compute_points(&mut self) {
        if self.is_empty() {
            self.points = [Point3::origin(); 8];
            self.center = Point3::origin();
        } else {
            self.points = self.corners_from_intervals();
            self.center = na::center(&self.lower_corner(), &self.upper_corner());
        }
    }

    fn corners_from_intervals(&self) -> [Point3<fre>; 8] {
        std::array::from_fn(|corner_idx| {
            Point3::new(
                self.intervals[usize::from(corner_idx & 0b100 != 0)],
                self.intervals[2 + usize::from(corner_idx & 0b010 != 0)],
                self.intervals[4 + usize::from(corner_idx & 0b001 != 0)],
            )
        })
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

const EMPTY_INTERVALS: [fre; 6] = [
    fre::INFINITY,
    fre::NEG_INFINITY,
    fre::INFINITY,
    fre::NEG_INFINITY,
    fre::INFINITY,
    fre::NEG_INFINITY,
];

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Translation3, UnitQuaternion, Vector3, point};

    #[test]
    fn new_box_is_empty() {
        let aabb = BoundingBox::empty();
        assert!(aabb.is_empty());
        assert_eq!(aabb.intervals()[0], fre::INFINITY);
        assert_eq!(aabb.intervals()[1], fre::NEG_INFINITY);
    }

    #[test]
    fn corner_ordering_has_z_varying_fastest() {
        let aabb = BoundingBox::new(point![0.0, 0.0, 0.0], point![1.0, 2.0, 3.0]);

        assert_eq!(aabb.corner(0), &point![0.0, 0.0, 0.0]);
        assert_eq!(aabb.corner(1), &point![0.0, 0.0, 3.0]);
        assert_eq!(aabb.corner(2), &point![0.0, 2.0, 0.0]);
        assert_eq!(aabb.corner(4), &point![1.0, 0.0, 0.0]);
        assert_eq!(aabb.corner(7), &point![1.0, 2.0, 3.0]);
    }

    #[test]
    fn opposite_corners_are_diagonal() {
        let aabb = BoundingBox::new(point![-1.0, -2.0, -3.0], point![1.0, 2.0, 3.0]);
        for corner_idx in 0..8 {
            let sum = aabb.corner(corner_idx).coords + aabb.corner(7 - corner_idx).coords;
            assert_abs_diff_eq!(sum, Vector3::zeros());
        }
    }

    #[test]
    fn center_is_midpoint() {
        let aabb = BoundingBox::new(point![-1.0, 0.0, 2.0], point![3.0, 4.0, 4.0]);
        assert_abs_diff_eq!(aabb.center(), &point![1.0, 2.0, 3.0]);
    }

    #[test]
    fn points_are_stale_until_computed() {
        let mut aabb = BoundingBox::new(point![0.0, 0.0, 0.0], point![1.0, 1.0, 1.0]);
        aabb.expand_to_include_point(&point![5.0, 5.0, 5.0]);

        assert_eq!(aabb.corner(7), &point![1.0, 1.0, 1.0]);

        aabb.compute_points();
        assert_eq!(aabb.corner(7), &point![5.0, 5.0, 5.0]);
    }

    #[test]
    fn expanding_with_empty_box_changes_nothing() {
        let mut aabb = BoundingBox::new(point![0.0, 0.0, 0.0], point![1.0, 1.0, 1.0]);
        let original = aabb.clone();

        aabb.expand_to_include_box(&BoundingBox::empty());
        aabb.compute_points();

        assert_eq!(aabb, original);
    }

    #[test]
    fn expanding_empty_box_with_box_gives_that_box() {
        let other = BoundingBox::new(point![-1.0, 0.0, 1.0], point![2.0, 3.0, 4.0]);
        let mut aabb = BoundingBox::empty();

        aabb.expand_to_include_box(&other);
        aabb.compute_points();

        assert_eq!(aabb, other);
    }

    #[test]
    fn transforming_box_with_translation_moves_it() {
        let aabb = BoundingBox::new(point![-0.5, -0.5, -0.5], point![0.5, 0.5, 0.5]);
        let transformed = aabb.transformed(&Translation3::new(1.0, 2.0, 3.0).to_homogeneous());

        assert_abs_diff_eq!(transformed.lower_corner(), point![0.5, 1.5, 2.5]);
        assert_abs_diff_eq!(transformed.upper_corner(), point![1.5, 2.5, 3.5]);
    }

    #[test]
    fn transforming_box_with_rotation_bounds_rotated_corners() {
        let aabb = BoundingBox::new(point![-1.0, -1.0, -1.0], point![1.0, 1.0, 1.0]);
        let rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f32::consts::FRAC_PI_4);
        let transformed = aabb.transformed(&rotation.to_homogeneous());

        let half_diagonal = std::f32::consts::SQRT_2;
        assert_abs_diff_eq!(transformed.upper_corner().x, half_diagonal, epsilon = 1e-5);
        assert_abs_diff_eq!(transformed.upper_corner().z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn transforming_empty_box_gives_empty_box() {
        let transformed = BoundingBox::empty().transformed(&Matrix4::identity());
        assert!(transformed.is_empty());
    }

    #[test]
    fn containment_works() {
        let outer = BoundingBox::new(point![0.0, 0.0, 0.0], point![2.0, 2.0, 2.0]);
        let inner = BoundingBox::new(point![0.5, 0.5, 0.5], point![1.0, 1.0, 1.0]);
        let straddling = BoundingBox::new(point![1.0, 1.0, 1.0], point![3.0, 1.5, 1.5]);

        assert!(outer.contains_box(&inner));
        assert!(!outer.contains_box(&straddling));
        assert!(outer.contains_box(&BoundingBox::empty()));
    }
}
