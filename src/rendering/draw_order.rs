//! Ordering of active models for drawing.

use crate::{
    rendering::gpu::ProgramID,
    scene::{MaterialID, NodeID},
};

/// Sort key of an active model. Models are drawn grouped by program and then
/// by material to minimize state changes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DrawKey {
    pub program_id: ProgramID,
    pub material_id: MaterialID,
    pub node_id: NodeID,
}

/// The active models in drawing order.
#[derive(Clone, Debug, Default)]
pub struct DrawOrder {
    keys: Vec<DrawKey>,
}

impl DrawOrder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[DrawKey] {
        &self.keys
    }

    pub fn iter(&self) -> impl Iterator<Item = &DrawKey> {
        self.keys.iter()
    }

    pub fn contains_node(&self, node_id: NodeID) -> bool {
        self.keys.iter().any(|key| key.node_id == node_id)
    }

    /// Inserts the given key at its sorted position.
    ///
    /// # Returns
    /// `false` if the key was already present.
    pub fn insert(&mut self, key: DrawKey) -> bool {
        match self.keys.binary_search(&key) {
            Ok(_) => false,
            Err(idx) => {
                self.keys.insert(idx, key);
                true
            }
        }
    }

    /// Removes the model with the given node ID.
    ///
    /// # Returns
    /// Whether the model was present.
    pub fn remove_node(&mut self, node_id: NodeID) -> bool {
        let n_keys = self.keys.len();
        self.keys.retain(|key| key.node_id != node_id);
        self.keys.len() != n_keys
    }

    /// Replaces the program of every key with the one reported for its
    /// material and sorts the keys again. Keys whose material has no program
    /// keep their current one.
    pub fn resort(&mut self, program_for_material: impl Fn(MaterialID) -> Option<ProgramID>) {
        for key in &mut self.keys {
            if let Some(program_id) = program_for_material(key.material_id) {
                key.program_id = program_id;
            }
        }
        self.keys.sort_unstable();
    }
}
