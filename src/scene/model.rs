//! Model nodes and their resource loading state.

use crate::{
    geometry::fre,
    scene::{Geometry, Material},
};
use nalgebra::Matrix4;
use std::sync::Arc;

/// A leaf node drawing a geometry with a material. Either resource may still
/// be loading.
#[derive(Clone, Debug)]
pub struct ModelNode {
    state: ModelState,
    mvp_matrix: Matrix4<fre>,
    mvp_stale: bool,
    mvp_camera_revision: Option<u64>,
}

/// Loading state of a [`ModelNode`].
#[derive(Clone, Debug)]
pub enum ModelState {
    /// At least one of the resources is still being loaded.
    Loading {
        geometry: Option<Arc<Geometry>>,
        material: Option<Arc<Material>>,
    },
    /// Both resources are available.
    Ready {
        geometry: Arc<Geometry>,
        material: Arc<Material>,
    },
    /// A resource failed to load. The model will never be drawn.
    Failed,
}

impl ModelNode {
    pub(crate) fn new(geometry: Option<Arc<Geometry>>, material: Option<Arc<Material>>) -> Self {
        Self {
            state: ModelState::from_resources(geometry, material),
            mvp_matrix: Matrix4::identity(),
            mvp_stale: true,
            mvp_camera_revision: None,
        }
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    /// Whether the model is still waiting for resources. A model whose
    /// loading failed stays processing forever.
    pub fn is_processing(&self) -> bool {
        !self.is_ready()
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, ModelState::Ready { .. })
    }

    pub fn has_failed(&self) -> bool {
        matches!(self.state, ModelState::Failed)
    }

    /// Returns the geometry if it has been loaded.
    pub fn geometry(&self) -> Option<&Arc<Geometry>> {
        match &self.state {
            ModelState::Loading { geometry, .. } => geometry.as_ref(),
            ModelState::Ready { geometry, .. } => Some(geometry),
            ModelState::Failed => None,
        }
    }

    /// Returns the material if it has been loaded.
    pub fn material(&self) -> Option<&Arc<Material>> {
        match &self.state {
            ModelState::Loading { material, .. } => material.as_ref(),
            ModelState::Ready { material, .. } => Some(material),
            ModelState::Failed => None,
        }
    }

    /// Returns the model-view-projection matrix from the last time it was
    /// computed.
    pub fn mvp_matrix(&self) -> &Matrix4<fre> {
        &self.mvp_matrix
    }

    /// Whether the model-view-projection matrix must be recomputed for a
    /// camera with the given revision.
    pub fn mvp_needs_update(&self, camera_revision: u64) -> bool {
        self.mvp_stale || self.mvp_camera_revision != Some(camera_revision)
    }

    pub(crate) fn update_mvp_matrix(
        &mut self,
        camera_matrix: &Matrix4<fre>,
        camera_revision: u64,
        world_transform: &Matrix4<fre>,
    ) {
        self.mvp_matrix = camera_matrix * world_transform;
        self.mvp_stale = false;
        self.mvp_camera_revision = Some(camera_revision);
    }

    pub(crate) fn invalidate_mvp_matrix(&mut self) {
        self.mvp_stale = true;
    }

    /// Swaps in the given geometry.
    ///
    /// # Returns
    /// `false` if the model has failed and the geometry was ignored.
    pub(crate) fn on_geometry_loaded(&mut self, geometry: Arc<Geometry>) -> bool {
        let (state, accepted) = match std::mem::replace(&mut self.state, ModelState::Failed) {
            ModelState::Loading { material, .. } => {
                (ModelState::from_resources(Some(geometry), material), true)
            }
            ModelState::Ready { material, .. } => {
                (ModelState::from_resources(Some(geometry), Some(material)), true)
            }
            ModelState::Failed => (ModelState::Failed, false),
        };
        self.state = state;
        accepted
    }

    /// Swaps in the given material.
    ///
    /// # Returns
    /// `false` if the model has failed and the material was ignored.
    pub(crate) fn on_material_loaded(&mut self, material: Arc<Material>) -> bool {
        let (state, accepted) = match std::mem::replace(&mut self.state, ModelState::Failed) {
            ModelState::Loading { geometry, .. } => {
                (ModelState::from_resources(geometry, Some(material)), true)
            }
            ModelState::Ready { geometry, .. } => {
                (ModelState::from_resources(Some(geometry), Some(material)), true)
            }
            ModelState::Failed => (ModelState::Failed, false),
        };
        self.state = state;
        accepted
    }

    pub(crate) fn on_load_failed(&mut self) {
        self.state = ModelState::Failed;
    }
}

impl ModelState {
    fn from_resources(geometry: Option<Arc<Geometry>>, material: Option<Arc<Material>>) -> Self {
        match (geometry, material) {
            (Some(geometry), Some(material)) => Self::Ready { geometry, material },
            (geometry, material) => Self::Loading { geometry, material },
        }
    }
}
