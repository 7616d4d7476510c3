//! Geometrical objects.

mod bounding_box;
mod frustum;
mod transform;

pub use bounding_box::BoundingBox;
pub use frustum::{Frustum, PlaneRelation, N_FRUSTUM_PLANES};
pub use transform::NodeTransform;

/// Floating point type used for geometry and rendering.
///
/// # Note
/// Changing this would also require additional
/// code changes where the type is hardcoded.
#[allow(non_camel_case_types)]
pub type fre = f32;
