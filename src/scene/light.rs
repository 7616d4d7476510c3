//! Light source nodes.

use crate::geometry::fre;
use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// A node emitting light. Position and direction follow from the node's world
/// transform, with the light pointing along the node's negative z-axis.
#[derive(Clone, Debug, PartialEq)]
pub struct LightNode {
    kind: LightKind,
    diffuse_color: [f32; 3],
    specular_color: [f32; 3],
}

/// Type of light source with its type-specific parameters.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LightKind {
    /// Infinitely distant light with parallel rays.
    Directional,
    /// Light radiating in all directions from a point. The attenuation holds
    /// the constant, linear and quadratic falloff coefficients.
    Point { attenuation: [f32; 3] },
    /// Cone of light from a point.
    Spot {
        attenuation: [f32; 3],
        cutoff_angle_degrees: f32,
        exponent: f32,
    },
}

/// Number of lights of each kind, which determines how material shader
/// programs must be compiled.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LightLayout {
    pub n_directional: u32,
    pub n_point: u32,
    pub n_spot: u32,
}

impl LightNode {
    pub(crate) fn new(kind: LightKind, diffuse_color: [f32; 3], specular_color: [f32; 3]) -> Self {
        Self {
            kind,
            diffuse_color,
            specular_color,
        }
    }

    pub fn kind(&self) -> &LightKind {
        &self.kind
    }

    pub fn diffuse_color(&self) -> &[f32; 3] {
        &self.diffuse_color
    }

    pub fn specular_color(&self) -> &[f32; 3] {
        &self.specular_color
    }

    /// Computes the world-space position of the light from its world
    /// transform.
    pub fn world_position(world_transform: &Matrix4<fre>) -> Point3<fre> {
        world_transform.transform_point(&Point3::origin())
    }

    /// Computes the world-space direction the light points in from its world
    /// transform.
    pub fn world_direction(world_transform: &Matrix4<fre>) -> Vector3<fre> {
        world_transform
            .transform_vector(&-Vector3::z())
            .try_normalize(fre::EPSILON)
            .unwrap_or_else(|| -Vector3::z())
    }
}

impl LightLayout {
    /// Returns the layout with one more light of the given kind.
    pub fn with_light(mut self, kind: &LightKind) -> Self {
        match kind {
            LightKind::Directional => self.n_directional += 1,
            LightKind::Point { .. } => self.n_point += 1,
            LightKind::Spot { .. } => self.n_spot += 1,
        }
        self
    }

    pub fn n_lights(&self) -> u32 {
        self.n_directional + self.n_point + self.n_spot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Translation3, UnitQuaternion, point};

    #[test]
    fn light_layout_counts_kinds() {
        let layout = LightLayout::default()
            .with_light(&LightKind::Directional)
            .with_light(&LightKind::Point {
                attenuation: [1.0, 0.0, 0.0],
            })
            .with_light(&LightKind::Directional);

        assert_eq!(layout.n_directional, 2);
        assert_eq!(layout.n_point, 1);
        assert_eq!(layout.n_spot, 0);
        assert_eq!(layout.n_lights(), 3);
    }

    #[test]
    fn light_position_and_direction_follow_world_transform() {
        let world = Translation3::new(1.0, 2.0, 3.0).to_homogeneous()
            * UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f32::consts::FRAC_PI_2)
                .to_homogeneous();

        assert_abs_diff_eq!(LightNode::world_position(&world), point![1.0, 2.0, 3.0]);
        assert_abs_diff_eq!(
            LightNode::world_direction(&world),
            -Vector3::x(),
            epsilon = 1e-6
        );
    }
}
