//! Representation of view frustums for culling.

use super::{BoundingBox, fre};
use nalgebra::{Matrix4, Point3, Vector4};

/// Number of planes bounding a frustum.
pub const N_FRUSTUM_PLANES: usize = 6;

/// A view frustum represented by the six planes bounding it, in the order
/// left, right, bottom, top, near and far.
///
/// Each plane is stored as the unnormalized coefficients `(a, b, c, d)` of
/// `a*x + b*y + c*z + d = 0`, oriented so that points inside the frustum give
/// a non-negative value. Only the sign of the plane equation is used for
/// culling, so the planes are never normalized.
///
/// For every plane the frustum also stores the index of the bounding box
/// corner lying farthest into the plane's positive half-space (the positive
/// vertex), using the corner ordering of [`BoundingBox`]. The negative vertex
/// is the diagonally opposite corner.
#[derive(Clone, Debug, PartialEq)]
pub struct Frustum {
    planes: [Vector4<fre>; N_FRUSTUM_PLANES],
    positive_vertex_indices: [u8; N_FRUSTUM_PLANES],
}

/// How an axis-aligned box lies relative to a single frustum plane.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlaneRelation {
    /// The whole box lies in the negative half-space.
    Outside,
    /// The box straddles the plane.
    Intersects,
    /// The whole box lies in the non-negative half-space.
    Inside,
}

impl Frustum {
    /// Extracts the frustum planes of the clip space of the given
    /// projection-view matrix.
    ///
    /// This function uses the method of Gribb and Hartmann (2001)
    /// "Fast Extraction of Viewing Frustum Planes from the
    /// World-View-Projection Matrix".
    pub fn from_camera_matrix(camera_matrix: &Matrix4<fre>) -> Self {
        let m = camera_matrix;
        let row_combination = |row: usize, sign: fre| {
            Vector4::new(
                m[(3, 0)] + sign * m[(row, 0)],
                m[(3, 1)] + sign * m[(row, 1)],
                m[(3, 2)] + sign * m[(row, 2)],
                m[(3, 3)] + sign * m[(row, 3)],
            )
        };

        let left = row_combination(0, 1.0);
        let right = row_combination(0, -1.0);
        let bottom = row_combination(1, 1.0);
        let top = row_combination(1, -1.0);
        let near = row_combination(2, 1.0);
        let far = row_combination(2, -1.0);

        let planes = [left, right, bottom, top, near, far];
        let positive_vertex_indices = planes.map(|plane| positive_vertex_index(&plane));

        Self {
            planes,
            positive_vertex_indices,
        }
    }

    /// Returns the unnormalized coefficients of the plane with the given
    /// index.
    pub fn plane(&self, plane_idx: usize) -> &Vector4<fre> {
        &self.planes[plane_idx]
    }

    /// Returns the coefficients of all six planes.
    pub fn planes(&self) -> &[Vector4<fre>; N_FRUSTUM_PLANES] {
        &self.planes
    }

    /// Returns the index of the box corner lying farthest into the positive
    /// half-space of the given plane.
    pub fn positive_vertex_index(&self, plane_idx: usize) -> usize {
        usize::from(self.positive_vertex_indices[plane_idx])
    }

    /// Returns the index of the box corner lying farthest into the negative
    /// half-space of the given plane.
    pub fn negative_vertex_index(&self, plane_idx: usize) -> usize {
        7 - self.positive_vertex_index(plane_idx)
    }

    /// Evaluates the equation of the given plane at the given point. The
    /// result is negative for points outside the plane.
    pub fn evaluate_plane(&self, plane_idx: usize, point: &Point3<fre>) -> fre {
        let p = &self.planes[plane_idx];
        p.x * point.x + p.y * point.y + p.z * point.z + p.w
    }

    /// Determines how the given box lies relative to the given plane by
    /// testing only its positive and negative vertices. The corner points of
    /// the box must be computed.
    pub fn classify_box(&self, plane_idx: usize, aabb: &BoundingBox) -> PlaneRelation {
        let positive_vertex = aabb.corner(self.positive_vertex_index(plane_idx));
        if self.evaluate_plane(plane_idx, positive_vertex) < 0.0 {
            return PlaneRelation::Outside;
        }
        let negative_vertex = aabb.corner(self.negative_vertex_index(plane_idx));
        if self.evaluate_plane(plane_idx, negative_vertex) < 0.0 {
            PlaneRelation::Intersects
        } else {
            PlaneRelation::Inside
        }
    }

    /// Whether the given point lies inside all six planes.
    pub fn contains_point(&self, point: &Point3<fre>) -> bool {
        (0..N_FRUSTUM_PLANES).all(|plane_idx| self.evaluate_plane(plane_idx, point) >= 0.0)
    }
}

/// Corner index selected by the sign pattern `(a > 0)(b > 0)(c > 0)` of the
/// plane normal, with bit 2 for x.
fn positive_vertex_index(plane: &Vector4<fre>) -> u8 {
    (u8::from(plane.x > 0.0) << 2) | (u8::from(plane.y > 0.0) << 1) | u8::from(plane.z > 0.0)
}
