//! Delivery of asynchronously loaded model resources.

use crate::scene::{Geometry, Material, NodeID};
use anyhow::{Result, anyhow};
use std::sync::{Arc, mpsc};

/// Outcome of a resource load for a model node.
#[derive(Clone, Debug)]
pub enum LoadCompletion {
    Geometry(Arc<Geometry>),
    Material(Arc<Material>),
    Failed(String),
}

/// Handle for reporting load completions to a [`Scene`](crate::scene::Scene)
/// from any thread. The scene applies the completions at the start of its
/// next recalculation.
#[derive(Clone, Debug)]
pub struct LoadSender {
    sender: mpsc::Sender<(NodeID, LoadCompletion)>,
}

#[derive(Debug)]
pub(crate) struct LoadReceiver {
    receiver: mpsc::Receiver<(NodeID, LoadCompletion)>,
}

pub(crate) fn load_channel() -> (LoadSender, LoadReceiver) {
    let (sender, receiver) = mpsc::channel();
    (LoadSender { sender }, LoadReceiver { receiver })
}

impl LoadSender {
    /// Reports that the geometry of the given model has been loaded.
    ///
    /// # Errors
    /// Returns an error if the scene has been dropped.
    pub fn geometry_loaded(&self, model_id: NodeID, geometry: Arc<Geometry>) -> Result<()> {
        self.send(model_id, LoadCompletion::Geometry(geometry))
    }

    /// Reports that the material of the given model has been loaded.
    ///
    /// # Errors
    /// Returns an error if the scene has been dropped.
    pub fn material_loaded(&self, model_id: NodeID, material: Arc<Material>) -> Result<()> {
        self.send(model_id, LoadCompletion::Material(material))
    }

    /// Reports that a resource of the given model could not be loaded.
    ///
    /// # Errors
    /// Returns an error if the scene has been dropped.
    pub fn load_failed(&self, model_id: NodeID, reason: impl Into<String>) -> Result<()> {
        self.send(model_id, LoadCompletion::Failed(reason.into()))
    }

    fn send(&self, model_id: NodeID, completion: LoadCompletion) -> Result<()> {
        self.sender
            .send((model_id, completion))
            .map_err(|error| anyhow!("Could not report load for model {model_id}: {error}"))
    }
}

impl LoadReceiver {
    /// Returns every completion received so far without blocking.
    pub(crate) fn drain(&self) -> impl Iterator<Item = (NodeID, LoadCompletion)> + '_ {
        self.receiver.try_iter()
    }
}
