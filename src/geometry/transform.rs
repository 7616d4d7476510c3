//! Transform state of scene nodes.

use super::fre;
use nalgebra::{Matrix3, Matrix4, Point3, Unit, UnitQuaternion, Vector3};

/// The transform record embedded in every scene node: orientation, position
/// and non-uniform scale, together with the matrices derived from them and
/// a flag telling whether the matrices are out of date.
///
/// Mutators only record the new inputs and set the dirty flag. The derived
/// matrices are refreshed by [`recompute`](Self::recompute).
#[derive(Clone, Debug, PartialEq)]
pub struct NodeTransform {
    orientation: UnitQuaternion<fre>,
    position: Point3<fre>,
    scale: Vector3<fre>,
    local_transform: Matrix4<fre>,
    world_transform: Matrix4<fre>,
    normal_matrix: Matrix3<fre>,
    dirty: bool,
}

impl NodeTransform {
    /// Creates an identity transform that is marked dirty.
    pub fn new() -> Self {
        Self {
            orientation: UnitQuaternion::identity(),
            position: Point3::origin(),
            scale: Vector3::repeat(1.0),
            local_transform: Matrix4::identity(),
            world_transform: Matrix4::identity(),
            normal_matrix: Matrix3::identity(),
            dirty: true,
        }
    }

    pub fn orientation(&self) -> &UnitQuaternion<fre> {
        &self.orientation
    }

    pub fn position(&self) -> &Point3<fre> {
        &self.position
    }

    pub fn scale(&self) -> &Vector3<fre> {
        &self.scale
    }

    pub fn local_transform(&self) -> &Matrix4<fre> {
        &self.local_transform
    }

    pub fn world_transform(&self) -> &Matrix4<fre> {
        &self.world_transform
    }

    pub fn normal_matrix(&self) -> &Matrix3<fre> {
        &self.normal_matrix
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Moves the node by the given displacement in its parent's frame.
    pub fn translate(&mut self, displacement: &Vector3<fre>) {
        self.position += displacement;
        self.dirty = true;
    }

    /// Moves the node by the given displacement expressed in the node's own
    /// orientation frame.
    pub fn translate_relatively(&mut self, displacement: &Vector3<fre>) {
        self.position += self.orientation * displacement;
        self.dirty = true;
    }

    /// Rotates the node about its own x-axis by the given angle in radians.
    pub fn rotate_x(&mut self, angle: fre) {
        self.rotate_about_local_axis(&Vector3::x_axis(), angle);
    }

    /// Rotates the node about its own y-axis by the given angle in radians.
    pub fn rotate_y(&mut self, angle: fre) {
        self.rotate_about_local_axis(&Vector3::y_axis(), angle);
    }

    /// Rotates the node about its own z-axis by the given angle in radians.
    pub fn rotate_z(&mut self, angle: fre) {
        self.rotate_about_local_axis(&Vector3::z_axis(), angle);
    }

    /// Sets the non-uniform scale of the node.
    pub fn resize(&mut self, scale: Vector3<fre>) {
        self.scale = scale;
        self.dirty = true;
    }

    /// Levels the node so that it keeps its heading about the y-axis but
    /// loses any pitch and roll.
    pub fn look_forward(&mut self) {
        let forward = self.orientation * -Vector3::z();
        self.orientation = if forward.x.abs() + forward.z.abs() > fre::EPSILON {
            let yaw = fre::atan2(-forward.x, -forward.z);
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw)
        } else {
            // Looking straight up or down, so use the up vector for heading
            let up = self.orientation * Vector3::y();
            let yaw = fre::atan2(up.x * forward.y, up.z * forward.y);
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw)
        };
        self.dirty = true;
    }

    pub fn set_position(&mut self, position: Point3<fre>) {
        self.position = position;
        self.dirty = true;
    }

    pub fn set_orientation(&mut self, orientation: UnitQuaternion<fre>) {
        self.orientation = orientation;
        self.dirty = true;
    }

    /// Recomputes the derived matrices if the transform is dirty, using the
    /// given world transform of the parent (or none for a root).
    ///
    /// # Returns
    /// The dirty flag before the call. The flag is cleared.
    pub fn recompute(&mut self, parent_world_transform: Option<&Matrix4<fre>>) -> bool {
        if !self.dirty {
            return false;
        }

        self.local_transform = Matrix4::new_translation(&self.position.coords)
            * self.orientation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&self.scale);

        self.world_transform = match parent_world_transform {
            Some(parent_world_transform) => parent_world_transform * self.local_transform,
            None => self.local_transform,
        };

        self.normal_matrix = self
            .world_transform
            .fixed_view::<3, 3>(0, 0)
            .into_owned()
            .try_inverse()
            .map_or_else(Matrix3::identity, |inverse| inverse.transpose());

        self.dirty = false;
        true
    }

    fn rotate_about_local_axis(&mut self, axis: &Unit<Vector3<fre>>, angle: fre) {
        self.orientation *= UnitQuaternion::from_axis_angle(axis, angle);
        self.dirty = true;
    }
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Translation3, point, vector};
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn new_transform_is_dirty_identity() {
        let mut transform = NodeTransform::new();
        assert!(transform.is_dirty());

        assert!(transform.recompute(None));
        assert!(!transform.is_dirty());
        assert_abs_diff_eq!(transform.world_transform(), &Matrix4::identity());
        assert_abs_diff_eq!(transform.normal_matrix(), &Matrix3::identity());
    }

    #[test]
    fn mutators_defer_recomputation() {
        let mut transform = NodeTransform::new();
        transform.recompute(None);

        transform.translate(&vector![1.0, 0.0, 0.0]);

        assert!(transform.is_dirty());
        assert_abs_diff_eq!(transform.local_transform(), &Matrix4::identity());
    }

    #[test]
    fn local_transform_applies_scale_then_rotation_then_translation() {
        let mut transform = NodeTransform::new();
        transform.resize(vector![2.0, 1.0, 1.0]);
        transform.rotate_z(FRAC_PI_2);
        transform.set_position(point![0.0, 0.0, 3.0]);
        transform.recompute(None);

        let transformed = transform
            .local_transform()
            .transform_point(&point![1.0, 0.0, 0.0]);

        assert_abs_diff_eq!(transformed, point![0.0, 2.0, 3.0], epsilon = 1e-5);
    }

    #[test]
    fn world_transform_includes_parent_transform() {
        let parent_world = Translation3::new(0.0, 5.0, 0.0).to_homogeneous();

        let mut transform = NodeTransform::new();
        transform.translate(&vector![1.0, 0.0, 0.0]);
        transform.recompute(Some(&parent_world));

        assert_abs_diff_eq!(
            transform.world_transform(),
            &(parent_world * transform.local_transform())
        );
    }

    #[test]
    fn clean_transform_is_not_recomputed() {
        let mut transform = NodeTransform::new();
        transform.recompute(None);

        let other_parent = Translation3::new(9.0, 9.0, 9.0).to_homogeneous();
        assert!(!transform.recompute(Some(&other_parent)));
        assert_abs_diff_eq!(transform.world_transform(), &Matrix4::identity());
    }

    #[test]
    fn relative_translation_uses_own_orientation() {
        let mut transform = NodeTransform::new();
        transform.rotate_y(FRAC_PI_2);
        transform.translate_relatively(&vector![0.0, 0.0, -1.0]);

        assert_abs_diff_eq!(transform.position(), &point![-1.0, 0.0, 0.0], epsilon = 1e-6);
    }

    #[test]
    fn normal_matrix_is_inverse_transpose_of_world_rotation_scale() {
        let mut transform = NodeTransform::new();
        transform.resize(vector![2.0, 4.0, 8.0]);
        transform.recompute(None);

        assert_abs_diff_eq!(
            transform.normal_matrix(),
            &Matrix3::from_diagonal(&vector![0.5, 0.25, 0.125])
        );
    }

    #[test]
    fn singular_world_transform_gives_identity_normal_matrix() {
        let mut transform = NodeTransform::new();
        transform.resize(vector![0.0, 1.0, 1.0]);
        transform.recompute(None);

        assert_abs_diff_eq!(transform.normal_matrix(), &Matrix3::identity());
    }

    #[test]
    fn looking_forward_keeps_only_yaw() {
        let mut transform = NodeTransform::new();
        transform.rotate_y(0.7);
        transform.rotate_x(0.3);
        transform.rotate_z(-0.2);

        transform.look_forward();

        let expected = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.7);
        assert_abs_diff_eq!(transform.orientation(), &expected, epsilon = 1e-5);
        assert!(transform.is_dirty());
    }
}
