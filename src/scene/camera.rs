//! Camera nodes with frustum culling.

use crate::{
    geometry::{BoundingBox, Frustum, N_FRUSTUM_PLANES, PlaneRelation, fre},
    scene::NodeID,
};
use anyhow::{Result, bail};
use nalgebra::{Matrix4, Orthographic3, Perspective3, Point3};
use serde::{Deserialize, Serialize};

/// Mask with a bit set for each of the six frustum planes.
pub const ALL_PLANES_MASK: u8 = 0b111111;

/// A node viewing the scene through a projection.
///
/// The camera keeps its view and projection matrices, the frustum extracted
/// from their product and, for every node it has tested, the plane that last
/// rejected the node. Testing that plane first lets a node that stays
/// outside the frustum be rejected with a single plane test.
#[derive(Clone, Debug)]
pub struct CameraNode {
    projection: Projection,
    projection_matrix: Matrix4<fre>,
    view_matrix: Matrix4<fre>,
    camera_matrix: Matrix4<fre>,
    position: Point3<fre>,
    frustum: Frustum,
    projection_changed: bool,
    revision: u64,
    last_failed_planes: Vec<Option<u8>>,
    n_plane_tests: u64,
}

/// Projection used by a [`CameraNode`].
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    Perspective {
        vertical_fov_degrees: fre,
        aspect_ratio: fre,
        near_distance: fre,
        far_distance: fre,
    },
    Orthographic {
        half_height: fre,
        aspect_ratio: fre,
        near_distance: fre,
        far_distance: fre,
    },
}

/// Result of testing a bounding box against a camera frustum.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Visibility {
    Outside = 0,
    Inside = 1,
    Intersect = 2,
}

impl CameraNode {
    pub(crate) fn new(projection: Projection) -> Result<Self> {
        projection.validate()?;
        let projection_matrix = projection.matrix();
        Ok(Self {
            projection,
            projection_matrix,
            view_matrix: Matrix4::identity(),
            camera_matrix: projection_matrix,
            position: Point3::origin(),
            frustum: Frustum::from_camera_matrix(&projection_matrix),
            projection_changed: true,
            revision: 0,
            last_failed_planes: Vec::new(),
            n_plane_tests: 0,
        })
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn projection_matrix(&self) -> &Matrix4<fre> {
        &self.projection_matrix
    }

    /// Returns the view matrix, the inverse of the camera's world transform.
    pub fn view_matrix(&self) -> &Matrix4<fre> {
        &self.view_matrix
    }

    /// Returns the product of the projection and view matrices.
    pub fn camera_matrix(&self) -> &Matrix4<fre> {
        &self.camera_matrix
    }

    /// Returns the position of the camera in world space.
    pub fn position(&self) -> &Point3<fre> {
        &self.position
    }

    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// Returns a counter that is incremented whenever the camera matrix
    /// changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns the number of plane tests performed by
    /// [`can_see`](Self::can_see) since the last reset.
    pub fn n_plane_tests(&self) -> u64 {
        self.n_plane_tests
    }

    pub fn reset_plane_test_count(&mut self) {
        self.n_plane_tests = 0;
    }

    /// Replaces the projection. Takes effect on the next recalculation.
    ///
    /// # Errors
    /// See [`Projection::validate`].
    pub fn set_projection(&mut self, projection: Projection) -> Result<()> {
        projection.validate()?;
        self.projection = projection;
        self.projection_matrix = projection.matrix();
        self.projection_changed = true;
        Ok(())
    }

    /// Sets the ratio of width to height of the view plane.
    ///
    /// # Errors
    /// Returns an error if the aspect ratio is not positive.
    pub fn set_aspect_ratio(&mut self, aspect_ratio: fre) -> Result<()> {
        self.set_projection(self.projection.with_aspect_ratio(aspect_ratio))
    }

    /// Refreshes the view matrix, camera matrix and frustum if the camera's
    /// world transform or projection changed.
    ///
    /// # Returns
    /// Whether the camera matrix changed.
    pub(crate) fn update(&mut self, world_transform: &Matrix4<fre>, transform_changed: bool) -> bool {
        if !transform_changed && !self.projection_changed {
            return false;
        }

        self.view_matrix = world_transform
            .try_inverse()
            .unwrap_or_else(Matrix4::identity);
        self.camera_matrix = self.projection_matrix * self.view_matrix;
        self.position = world_transform.transform_point(&Point3::origin());
        self.frustum = Frustum::from_camera_matrix(&self.camera_matrix);
        self.projection_changed = false;
        self.revision += 1;
        true
    }

    /// Determines whether the given world-space box, belonging to the node
    /// with the given ID, lies inside the camera frustum.
    ///
    /// Bit `i` of `mask` tells whether plane `i` must be tested. A parent box
    /// that was fully inside some planes lets its children skip them. On
    /// return, `mask` holds the planes the box straddles, which its children
    /// must test again.
    pub fn can_see(&mut self, node_id: NodeID, aabb: &BoundingBox, mask: &mut u8) -> Visibility {
        if aabb.is_empty() {
            return Visibility::Outside;
        }

        let cache_idx = node_id.idx();
        if cache_idx >= self.last_failed_planes.len() {
            self.last_failed_planes.resize(cache_idx + 1, None);
        }

        let mut cached_relation = None;
        if let Some(plane_idx) = self.last_failed_planes[cache_idx] {
            let plane_idx = usize::from(plane_idx);
            self.n_plane_tests += 1;
            let relation = self.frustum.classify_box(plane_idx, aabb);
            if relation == PlaneRelation::Outside {
                return Visibility::Outside;
            }
            cached_relation = Some((plane_idx, relation));
        }

        let mut outgoing_mask = 0;
        for plane_idx in 0..N_FRUSTUM_PLANES {
            let plane_bit = 1 << plane_idx;
            if *mask & plane_bit == 0 {
                continue;
            }
            let relation = match cached_relation {
                Some((cached_plane_idx, relation)) if cached_plane_idx == plane_idx => relation,
                _ => {
                    self.n_plane_tests += 1;
                    self.frustum.classify_box(plane_idx, aabb)
                }
            };
            match relation {
                PlaneRelation::Outside => {
                    self.last_failed_planes[cache_idx] = Some(plane_idx as u8);
                    return Visibility::Outside;
                }
                PlaneRelation::Intersects => {
                    outgoing_mask |= plane_bit;
                }
                PlaneRelation::Inside => {}
            }
        }

        *mask = outgoing_mask;
        if outgoing_mask == 0 {
            Visibility::Inside
        } else {
            Visibility::Intersect
        }
    }
}

impl Projection {
    /// Creates a perspective projection with the given vertical field of view
    /// in degrees.
    ///
    /// # Errors
    /// See [`Projection::validate`].
    pub fn perspective(
        vertical_fov_degrees: fre,
        aspect_ratio: fre,
        near_distance: fre,
        far_distance: fre,
    ) -> Result<Self> {
        let projection = Self::Perspective {
            vertical_fov_degrees,
            aspect_ratio,
            near_distance,
            far_distance,
        };
        projection.validate()?;
        Ok(projection)
    }

    /// Checks that the projection parameters describe a valid frustum.
    ///
    /// # Errors
    /// Returns an error if the aspect ratio is not positive, if the near and
    /// far distances are not ordered, if a perspective field of view is not
    /// in `(0, 180)` degrees or if a perspective near distance is not
    /// positive.
    pub fn validate(&self) -> Result<()> {
        let (aspect_ratio, near_distance, far_distance) = match *self {
            Self::Perspective {
                vertical_fov_degrees,
                aspect_ratio,
                near_distance,
                far_distance,
            } => {
                if !(vertical_fov_degrees > 0.0 && vertical_fov_degrees < 180.0) {
                    bail!("Invalid vertical field of view {vertical_fov_degrees} degrees");
                }
                if near_distance <= 0.0 {
                    bail!("Perspective near distance must be positive, got {near_distance}");
                }
                (aspect_ratio, near_distance, far_distance)
            }
            Self::Orthographic {
                half_height,
                aspect_ratio,
                near_distance,
                far_distance,
            } => {
                if half_height <= 0.0 {
                    bail!("Orthographic half height must be positive, got {half_height}");
                }
                (aspect_ratio, near_distance, far_distance)
            }
        };
        if aspect_ratio <= 0.0 || !aspect_ratio.is_finite() {
            bail!("Invalid aspect ratio {aspect_ratio}");
        }
        if near_distance >= far_distance {
            bail!("Near distance {near_distance} is not smaller than far distance {far_distance}");
        }
        Ok(())
    }

    pub fn aspect_ratio(&self) -> fre {
        match *self {
            Self::Perspective { aspect_ratio, .. } | Self::Orthographic { aspect_ratio, .. } => {
                aspect_ratio
            }
        }
    }

    /// Returns a copy of the projection with the given aspect ratio.
    pub fn with_aspect_ratio(mut self, new_aspect_ratio: fre) -> Self {
        match &mut self {
            Self::Perspective { aspect_ratio, .. } | Self::Orthographic { aspect_ratio, .. } => {
                *aspect_ratio = new_aspect_ratio;
            }
        }
        self
    }

    /// Computes the projection matrix, mapping view space to clip space.
    pub fn matrix(&self) -> Matrix4<fre> {
        match *self {
            Self::Perspective {
                vertical_fov_degrees,
                aspect_ratio,
                near_distance,
                far_distance,
            } => Perspective3::new(
                aspect_ratio,
                vertical_fov_degrees.to_radians(),
                near_distance,
                far_distance,
            )
            .to_homogeneous(),
            Self::Orthographic {
                half_height,
                aspect_ratio,
                near_distance,
                far_distance,
            } => {
                let half_width = half_height * aspect_ratio;
                Orthographic3::new(
                    -half_width,
                    half_width,
                    -half_height,
                    half_height,
                    near_distance,
                    far_distance,
                )
                .to_homogeneous()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Translation3, Vector3, point};

    fn camera_at_z(z: fre) -> CameraNode {
        let mut camera =
            CameraNode::new(Projection::perspective(60.0, 1.0, 0.1, 100.0).unwrap()).unwrap();
        camera.update(&Translation3::new(0.0, 0.0, z).to_homogeneous(), true);
        camera
    }

    fn box_at(center: Point3<fre>, half_extent: fre) -> BoundingBox {
        let half = Vector3::repeat(half_extent);
        BoundingBox::new(center - half, center + half)
    }

    #[test]
    fn creating_camera_with_invalid_projection_fails() {
        assert!(Projection::perspective(0.0, 1.0, 0.1, 100.0).is_err());
        assert!(Projection::perspective(60.0, 0.0, 0.1, 100.0).is_err());
        assert!(Projection::perspective(60.0, 1.0, 10.0, 1.0).is_err());
        assert!(Projection::perspective(60.0, 1.0, 0.0, 1.0).is_err());
    }

    #[test]
    fn updating_camera_computes_view_and_camera_matrices() {
        let camera = camera_at_z(5.0);

        assert_abs_diff_eq!(
            camera.view_matrix(),
            &Translation3::new(0.0, 0.0, -5.0).to_homogeneous()
        );
        assert_abs_diff_eq!(
            camera.camera_matrix(),
            &(camera.projection_matrix() * camera.view_matrix())
        );
        assert_abs_diff_eq!(camera.position(), &point![0.0, 0.0, 5.0]);
        assert_eq!(camera.revision(), 1);
    }

    #[test]
    fn unchanged_camera_keeps_revision() {
        let mut camera = camera_at_z(5.0);
        assert!(!camera.update(&Translation3::new(0.0, 0.0, 5.0).to_homogeneous(), false));
        assert_eq!(camera.revision(), 1);
    }

    #[test]
    fn changing_aspect_ratio_triggers_update() {
        let mut camera = camera_at_z(5.0);
        camera.set_aspect_ratio(2.0).unwrap();

        assert!(camera.update(&Translation3::new(0.0, 0.0, 5.0).to_homogeneous(), false));
        assert_eq!(camera.revision(), 2);
        assert_abs_diff_eq!(camera.projection().aspect_ratio(), 2.0);
    }

    #[test]
    fn setting_invalid_aspect_ratio_fails() {
        let mut camera = camera_at_z(5.0);
        assert!(camera.set_aspect_ratio(-1.0).is_err());
        assert_abs_diff_eq!(camera.projection().aspect_ratio(), 1.0);
    }

    #[test]
    fn box_in_front_of_camera_is_inside() {
        let mut camera = camera_at_z(5.0);
        let mut mask = ALL_PLANES_MASK;

        let visibility = camera.can_see(NodeID::from_u32(1), &box_at(point![0.0, 0.0, 0.0], 0.5), &mut mask);

        assert_eq!(visibility, Visibility::Inside);
        assert_eq!(mask, 0);
    }

    #[test]
    fn box_behind_camera_is_outside() {
        let mut camera = camera_at_z(5.0);
        let mut mask = ALL_PLANES_MASK;

        let visibility = camera.can_see(NodeID::from_u32(1), &box_at(point![0.0, 0.0, 20.0], 0.5), &mut mask);

        assert_eq!(visibility, Visibility::Outside);
    }

    #[test]
    fn box_straddling_far_plane_intersects_only_far_plane() {
        let mut camera = camera_at_z(5.0);
        let mut mask = ALL_PLANES_MASK;

        // Far plane lies at z = 5 - 100 = -95
        let visibility = camera.can_see(NodeID::from_u32(1), &box_at(point![0.0, 0.0, -95.0], 1.0), &mut mask);

        assert_eq!(visibility, Visibility::Intersect);
        assert_eq!(mask, 1 << 5);
    }

    #[test]
    fn planes_missing_from_mask_are_not_tested() {
        let mut camera = camera_at_z(5.0);
        // Outside the far plane, but the far plane is excluded from the mask
        let mut mask = ALL_PLANES_MASK & !(1 << 5);

        let visibility = camera.can_see(NodeID::from_u32(1), &box_at(point![0.0, 0.0, -500.0], 1.0), &mut mask);

        assert_ne!(visibility, Visibility::Outside);
        assert_eq!(camera.n_plane_tests(), 5);
    }

    #[test]
    fn empty_box_is_outside() {
        let mut camera = camera_at_z(5.0);
        let mut mask = ALL_PLANES_MASK;
        assert_eq!(
            camera.can_see(NodeID::from_u32(1), &BoundingBox::empty(), &mut mask),
            Visibility::Outside
        );
        assert_eq!(camera.n_plane_tests(), 0);
    }

    #[test]
    fn rejection_by_cached_plane_needs_single_plane_test() {
        let mut camera = camera_at_z(5.0);
        let node_id = NodeID::from_u32(7);
        let beyond_far_plane = box_at(point![0.0, 0.0, -1000.0], 0.5);

        let mut mask = ALL_PLANES_MASK;
        assert_eq!(camera.can_see(node_id, &beyond_far_plane, &mut mask), Visibility::Outside);
        assert_eq!(camera.n_plane_tests(), 6);

        camera.reset_plane_test_count();
        let mut mask = ALL_PLANES_MASK;
        assert_eq!(camera.can_see(node_id, &beyond_far_plane, &mut mask), Visibility::Outside);
        assert_eq!(camera.n_plane_tests(), 1);
    }

    #[test]
    fn cached_plane_does_not_reject_box_that_moved_inside() {
        let mut camera = camera_at_z(5.0);
        let node_id = NodeID::from_u32(2);

        let mut mask = ALL_PLANES_MASK;
        camera.can_see(node_id, &box_at(point![0.0, 0.0, -1000.0], 0.5), &mut mask);

        let mut mask = ALL_PLANES_MASK;
        assert_eq!(
            camera.can_see(node_id, &box_at(point![0.0, 0.0, 0.0], 0.5), &mut mask),
            Visibility::Inside
        );
    }

    #[test]
    fn cached_plane_is_tested_once_when_box_is_visible() {
        let mut camera = camera_at_z(5.0);
        let node_id = NodeID::from_u32(3);

        let mut mask = ALL_PLANES_MASK;
        camera.can_see(node_id, &box_at(point![0.0, 0.0, -1000.0], 0.5), &mut mask);
        camera.reset_plane_test_count();

        // Straddles the far plane that rejected the box before
        let mut mask = ALL_PLANES_MASK;
        assert_eq!(
            camera.can_see(node_id, &box_at(point![0.0, 0.0, -95.0], 1.0), &mut mask),
            Visibility::Intersect
        );
        assert_eq!(mask, 1 << 5);
        assert_eq!(camera.n_plane_tests(), 6);
    }

    #[test]
    fn orthographic_projection_sees_box_within_extent() {
        let projection = Projection::Orthographic {
            half_height: 2.0,
            aspect_ratio: 1.0,
            near_distance: 0.1,
            far_distance: 50.0,
        };
        let mut camera = CameraNode::new(projection).unwrap();
        camera.update(&Translation3::new(0.0, 0.0, 5.0).to_homogeneous(), true);

        let mut mask = ALL_PLANES_MASK;
        assert_eq!(
            camera.can_see(NodeID::from_u32(0), &box_at(point![0.0, 0.0, 0.0], 0.5), &mut mask),
            Visibility::Inside
        );
        let mut mask = ALL_PLANES_MASK;
        assert_eq!(
            camera.can_see(NodeID::from_u32(0), &box_at(point![5.0, 0.0, 0.0], 0.5), &mut mask),
            Visibility::Outside
        );
    }
}
