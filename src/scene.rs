//! Scene graph of groups, models, cameras and lights.

mod camera;
mod events;
mod group;
mod light;
mod loading;
mod model;
mod node;
mod resources;

pub use camera::{ALL_PLANES_MASK, CameraNode, Projection, Visibility};
pub use events::{Event, EventListener, EventPayload, TriggerFlags};
pub use group::{DEFAULT_SPLIT_SIZE, GroupNode, SplitGroupNode, octant_code};
pub use light::{LightKind, LightLayout, LightNode};
pub use loading::{LoadCompletion, LoadSender};
pub use model::{ModelNode, ModelState};
pub use node::{NodeID, NodeKind, NodeKindTag, SceneNode};
pub use resources::{ColorSource, Geometry, GeometryID, Material, MaterialID};

use crate::geometry::{BoundingBox, NodeTransform, fre};
use anyhow::{Result, anyhow, bail};
use events::{EventRegistry, QueuedEvent};
use group::partition_into_octants;
use loading::LoadReceiver;
use nalgebra::Matrix4;
use std::sync::Arc;
use tribus_utils::BitVector;

/// A tree of [`SceneNode`]s stored in a flat table indexed by [`NodeID`].
///
/// The scene starts out with a root group. Nodes are created under an
/// existing group and keep their ID for the lifetime of the scene, also after
/// being detached. Transforms and bounding boxes are brought up to date by
/// [`recalculate`](Self::recalculate), which only recomputes dirty nodes and
/// the nodes below them.
#[derive(Debug)]
pub struct Scene {
    nodes: Vec<SceneNode>,
    root_id: NodeID,
    structure_changed: bool,
    reloaded_models: Vec<NodeID>,
    events: EventRegistry,
    load_sender: LoadSender,
    load_receiver: LoadReceiver,
}

#[derive(Copy, Clone, Debug, Default)]
struct RecalculationResult {
    dirty: bool,
    processing: bool,
}

impl Scene {
    /// Creates a new scene containing only a root group with the default
    /// split size.
    pub fn new() -> Self {
        Self::with_root_split_size(DEFAULT_SPLIT_SIZE)
    }

    /// Creates a new scene containing only a root group with the given split
    /// size.
    pub fn with_root_split_size(split_size: usize) -> Self {
        let root_id = NodeID::from_idx(0);
        let root = SceneNode::new(root_id, None, NodeKind::Group(GroupNode::new(split_size)));
        let (load_sender, load_receiver) = loading::load_channel();
        Self {
            nodes: vec![root],
            root_id,
            structure_changed: true,
            reloaded_models: Vec::new(),
            events: EventRegistry::default(),
            load_sender,
            load_receiver,
        }
    }

    pub fn root_id(&self) -> NodeID {
        self.root_id
    }

    /// Returns the number of nodes ever created in the scene, including
    /// detached nodes and split groups.
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn has_node(&self, node_id: NodeID) -> bool {
        node_id.idx() < self.nodes.len()
    }

    /// Returns the node with the given ID, or `None` if it does not exist.
    pub fn get_node(&self, node_id: NodeID) -> Option<&SceneNode> {
        self.nodes.get(node_id.idx())
    }

    /// Returns the node with the given ID.
    ///
    /// # Panics
    /// If the node does not exist.
    pub fn node(&self, node_id: NodeID) -> &SceneNode {
        &self.nodes[node_id.idx()]
    }

    /// Returns an iterator over all nodes in ID order.
    pub fn nodes(&self) -> impl Iterator<Item = &SceneNode> {
        self.nodes.iter()
    }

    /// Returns the transform of the given node for mutation.
    ///
    /// # Errors
    /// Returns an error if the node does not exist or is a split group.
    pub fn transform_mut(&mut self, node_id: NodeID) -> Result<&mut NodeTransform> {
        let node = self.existing_node_mut(node_id)?;
        if node.kind_tag() == NodeKindTag::SplitGroup {
            bail!("Split group {node_id} has no transform of its own");
        }
        Ok(node.transform_mut())
    }

    /// Marks the given node dirty so that it and everything below it is
    /// recomputed on the next recalculation.
    ///
    /// # Errors
    /// Returns an error if the node does not exist.
    pub fn mark_dirty(&mut self, node_id: NodeID) -> Result<()> {
        self.existing_node_mut(node_id)?.transform_mut().mark_dirty();
        Ok(())
    }

    /// Returns the world transform of the given node. Split groups report the
    /// world transform of the group they were split from.
    ///
    /// # Panics
    /// If the node does not exist.
    pub fn world_transform(&self, node_id: NodeID) -> &Matrix4<fre> {
        let node = &self.nodes[node_id.idx()];
        match node.kind() {
            NodeKind::SplitGroup(split_group) => {
                self.nodes[split_group.owner().idx()].transform().world_transform()
            }
            _ => node.transform().world_transform(),
        }
    }

    /// Returns the camera data of the given node.
    ///
    /// # Errors
    /// Returns an error if the node does not exist or is not a camera.
    pub fn camera(&self, camera_id: NodeID) -> Result<&CameraNode> {
        self.existing_node(camera_id)?
            .as_camera()
            .ok_or_else(|| anyhow!("Node {camera_id} is not a camera"))
    }

    /// Returns the camera data of the given node for mutation.
    ///
    /// # Errors
    /// Returns an error if the node does not exist or is not a camera.
    pub fn camera_mut(&mut self, camera_id: NodeID) -> Result<&mut CameraNode> {
        self.existing_node_mut(camera_id)?
            .as_camera_mut()
            .ok_or_else(|| anyhow!("Node {camera_id} is not a camera"))
    }

    /// Returns the model data of the given node.
    ///
    /// # Errors
    /// Returns an error if the node does not exist or is not a model.
    pub fn model(&self, model_id: NodeID) -> Result<&ModelNode> {
        self.existing_node(model_id)?
            .as_model()
            .ok_or_else(|| anyhow!("Node {model_id} is not a model"))
    }

    /// Returns the logical children of the given group, looking through any
    /// split groups the children have been partitioned into.
    ///
    /// # Errors
    /// Returns an error if the node does not exist or is not a group.
    pub fn logical_children(&self, group_id: NodeID) -> Result<Vec<NodeID>> {
        self.existing_group(group_id)?;
        let mut children = Vec::new();
        let mut stack = vec![group_id];
        while let Some(node_id) = stack.pop() {
            for &child_id in self.nodes[node_id.idx()].children().iter().rev() {
                if self.nodes[child_id.idx()].kind_tag() == NodeKindTag::SplitGroup {
                    stack.push(child_id);
                } else {
                    children.push(child_id);
                }
            }
        }
        Ok(children)
    }

    /// Creates a new group with the default split size under the given group.
    ///
    /// # Errors
    /// Returns an error if the parent does not exist or is not a group.
    pub fn create_group_node(&mut self, parent_id: NodeID) -> Result<NodeID> {
        self.create_group_node_with_split_size(parent_id, DEFAULT_SPLIT_SIZE)
    }

    /// Creates a new group with the given split size under the given group.
    ///
    /// # Errors
    /// Returns an error if the parent does not exist or is not a group.
    pub fn create_group_node_with_split_size(
        &mut self,
        parent_id: NodeID,
        split_size: usize,
    ) -> Result<NodeID> {
        self.create_child_node(parent_id, NodeKind::Group(GroupNode::new(split_size)))
    }

    /// Creates a new model under the given group. Resources that are not
    /// available yet can be supplied later, either through the scene or
    /// through a [`LoadSender`].
    ///
    /// # Errors
    /// Returns an error if the parent does not exist or is not a group.
    pub fn create_model_node(
        &mut self,
        parent_id: NodeID,
        geometry: Option<Arc<Geometry>>,
        material: Option<Arc<Material>>,
    ) -> Result<NodeID> {
        self.create_child_node(
            parent_id,
            NodeKind::Model(ModelNode::new(geometry, material)),
        )
    }

    /// Creates a new camera with the given projection under the given group.
    ///
    /// # Errors
    /// Returns an error if the parent does not exist or is not a group, or if
    /// the projection is invalid.
    pub fn create_camera_node(&mut self, parent_id: NodeID, projection: Projection) -> Result<NodeID> {
        let camera = CameraNode::new(projection)?;
        self.create_child_node(parent_id, NodeKind::Camera(camera))
    }

    /// Creates a new light under the given group.
    ///
    /// # Errors
    /// Returns an error if the parent does not exist or is not a group.
    pub fn create_light_node(
        &mut self,
        parent_id: NodeID,
        kind: LightKind,
        diffuse_color: [f32; 3],
        specular_color: [f32; 3],
    ) -> Result<NodeID> {
        self.create_child_node(
            parent_id,
            NodeKind::Light(LightNode::new(kind, diffuse_color, specular_color)),
        )
    }

    /// Attaches a detached node to the given group.
    ///
    /// # Errors
    /// Returns an error if either node does not exist, if the parent is not
    /// a group, if the node is the root, a split group or already attached,
    /// or if the parent lies below the node.
    pub fn attach_node(&mut self, node_id: NodeID, parent_id: NodeID) -> Result<()> {
        if node_id == self.root_id {
            bail!("The scene root can not be attached to a group");
        }
        self.existing_group(parent_id)?;
        let node = self.existing_node(node_id)?;
        if node.kind_tag() == NodeKindTag::SplitGroup {
            bail!("Split group {node_id} can not be attached to a group");
        }
        if let Some(current_parent_id) = node.parent() {
            bail!("Node {node_id} is already attached to node {current_parent_id}");
        }

        let mut ancestor = Some(parent_id);
        while let Some(ancestor_id) = ancestor {
            if ancestor_id == node_id {
                bail!("Attaching node {node_id} to node {parent_id} would create a cycle");
            }
            ancestor = self.nodes[ancestor_id.idx()].parent();
        }

        let node = &mut self.nodes[node_id.idx()];
        node.set_parent(Some(parent_id));
        node.transform_mut().mark_dirty();

        self.push_child(parent_id, node_id);
        self.structure_changed = true;
        Ok(())
    }

    /// Detaches the given node from its parent group. The node keeps its ID
    /// and everything below it and can be attached again.
    ///
    /// # Errors
    /// Returns an error if the node does not exist or is not attached.
    pub fn detach_node(&mut self, node_id: NodeID) -> Result<()> {
        let parent_id = self
            .existing_node(node_id)?
            .parent()
            .ok_or_else(|| anyhow!("Node {node_id} is not attached to a group"))?;

        if !self.remove_from_traversal(parent_id, node_id) {
            bail!("Node {node_id} is missing from the children of its parent {parent_id}");
        }

        self.nodes[node_id.idx()].set_parent(None);
        // Forces the bounding box of the parent to be rebuilt
        self.nodes[parent_id.idx()].transform_mut().mark_dirty();
        self.structure_changed = true;
        Ok(())
    }

    /// Supplies the geometry of the given model and marks it dirty. A model
    /// that was already ready gets its geometry replaced and is reported by
    /// [`take_reloaded_models`](Self::take_reloaded_models).
    ///
    /// # Errors
    /// Returns an error if the node does not exist or is not a model.
    pub fn on_geometry_loaded(&mut self, model_id: NodeID, geometry: Arc<Geometry>) -> Result<()> {
        self.update_model_resources(model_id, |model| model.on_geometry_loaded(geometry))
    }

    /// Supplies the material of the given model and marks it dirty. A model
    /// that was already ready gets its material replaced and is reported by
    /// [`take_reloaded_models`](Self::take_reloaded_models).
    ///
    /// # Errors
    /// Returns an error if the node does not exist or is not a model.
    pub fn on_material_loaded(&mut self, model_id: NodeID, material: Arc<Material>) -> Result<()> {
        self.update_model_resources(model_id, |model| model.on_material_loaded(material))
    }

    /// Returns the ready models whose geometry or material has been replaced
    /// since the last call, and clears the list.
    pub fn take_reloaded_models(&mut self) -> Vec<NodeID> {
        std::mem::take(&mut self.reloaded_models)
    }

    /// Records that a resource of the given model failed to load. The model
    /// stays processing and is never drawn.
    ///
    /// # Errors
    /// Returns an error if the node does not exist or is not a model.
    pub fn on_load_failed(&mut self, model_id: NodeID, reason: &str) -> Result<()> {
        let node = self.existing_model_node_mut(model_id)?;
        if let Some(model) = node.as_model_mut() {
            model.on_load_failed();
        }
        log::warn!("Failed to load resources for model {model_id}: {reason}");
        Ok(())
    }

    /// Returns a handle for reporting load completions to this scene from any
    /// thread.
    pub fn load_sender(&self) -> LoadSender {
        self.load_sender.clone()
    }

    /// Registers a listener for events with the given name on the given
    /// node.
    ///
    /// # Errors
    /// Returns an error if the node does not exist.
    pub fn on(
        &mut self,
        node_id: NodeID,
        name: &'static str,
        listener: impl FnMut(&mut Scene, &Event) + 'static,
    ) -> Result<()> {
        self.existing_node(node_id)?;
        self.events.add_listener(node_id, name, Box::new(listener));
        Ok(())
    }

    /// Whether the given node has a listener for the given event name.
    pub fn has_listener(&self, node_id: NodeID, name: &str) -> bool {
        self.events.has_listeners(node_id, name)
    }

    /// Triggers an event on the given node. Unless [`TriggerFlags::SYNC`] is
    /// given, the event is queued until the next call to
    /// [`dispatch_events`](Self::dispatch_events).
    ///
    /// # Errors
    /// Returns an error if the node does not exist.
    pub fn trigger(
        &mut self,
        node_id: NodeID,
        name: &'static str,
        flags: TriggerFlags,
        payload: EventPayload,
    ) -> Result<()> {
        self.existing_node(node_id)?;
        let event = QueuedEvent {
            target: node_id,
            name,
            bubble: flags.contains(TriggerFlags::BUBBLE),
            payload,
        };
        if flags.contains(TriggerFlags::SYNC) {
            self.deliver_event(&event);
        } else {
            self.events
                .enqueue(event, flags.contains(TriggerFlags::BUFFER));
        }
        Ok(())
    }

    /// Delivers all queued events. Events triggered by listeners during the
    /// dispatch are queued for the next dispatch.
    ///
    /// # Returns
    /// The number of events dispatched.
    pub fn dispatch_events(&mut self) -> usize {
        let queue = self.events.take_queue();
        for event in &queue {
            self.deliver_event(event);
        }
        queue.len()
    }

    pub fn n_queued_events(&self) -> usize {
        self.events.n_queued()
    }

    /// Brings transforms, bounding boxes and cameras up to date, starting
    /// from the root, and splits oversized groups. Pending load completions
    /// are applied first.
    ///
    /// The bit of every node reached from the root is set in `new_nodes`,
    /// which is grown as needed.
    ///
    /// # Returns
    /// Whether anything in the scene changed.
    pub fn recalculate(&mut self, new_nodes: &mut BitVector) -> bool {
        self.apply_load_completions();
        new_nodes.grow_to(self.nodes.len());
        self.recalculate_node(self.root_id, None, false, new_nodes)
            .dirty
    }

    /// Whether nodes have been attached, detached or split since the flag
    /// was last taken.
    pub fn structure_changed(&self) -> bool {
        self.structure_changed
    }

    /// Returns the structural change flag and clears it.
    pub fn take_structure_changed(&mut self) -> bool {
        std::mem::replace(&mut self.structure_changed, false)
    }

    /// Recomputes the subtree ID list of every node reachable from the root.
    pub fn update_subtree_ids(&mut self) {
        let mut preorder = Vec::with_capacity(self.nodes.len());
        // The start index is present for the exit marker of a node
        let mut stack = vec![(self.root_id, None)];

        while let Some((node_id, start)) = stack.pop() {
            match start {
                None => {
                    stack.push((node_id, Some(preorder.len())));
                    preorder.push(node_id);
                    for &child_id in self.nodes[node_id.idx()].children().iter().rev() {
                        stack.push((child_id, None));
                    }
                }
                Some(start) => {
                    let mut subtree_ids = self.nodes[node_id.idx()].take_subtree_ids();
                    subtree_ids.clear();
                    subtree_ids.extend_from_slice(&preorder[start..]);
                    self.nodes[node_id.idx()].set_subtree_ids(subtree_ids);
                }
            }
        }
    }

    /// Tests the bounding box of the given node against the frustum of the
    /// given camera. See [`CameraNode::can_see`].
    ///
    /// # Errors
    /// Returns an error if either node does not exist or if `camera_id` is
    /// not a camera.
    pub fn camera_can_see(
        &mut self,
        camera_id: NodeID,
        node_id: NodeID,
        mask: &mut u8,
    ) -> Result<Visibility> {
        self.existing_node(node_id)?;
        self.camera(camera_id)?;
        if camera_id == node_id {
            return Ok(Visibility::Outside);
        }

        let (camera_idx, node_idx) = (camera_id.idx(), node_id.idx());
        let (camera_node, node) = if camera_idx < node_idx {
            let (head, tail) = self.nodes.split_at_mut(node_idx);
            (&mut head[camera_idx], &tail[0])
        } else {
            let (head, tail) = self.nodes.split_at_mut(camera_idx);
            (&mut tail[0], &head[node_idx])
        };

        let camera = camera_node
            .as_camera_mut()
            .ok_or_else(|| anyhow!("Node {camera_id} is not a camera"))?;

        Ok(camera.can_see(node_id, node.aabb(), mask))
    }

    /// Returns the model data of the given node for updating its MVP matrix,
    /// together with its transform.
    pub(crate) fn model_and_transform_mut(
        &mut self,
        model_id: NodeID,
    ) -> Option<(&mut ModelNode, &NodeTransform)> {
        let (transform, _, kind) = self.nodes.get_mut(model_id.idx())?.parts_mut();
        match kind {
            NodeKind::Model(model) => Some((model, &*transform)),
            _ => None,
        }
    }

    fn existing_node(&self, node_id: NodeID) -> Result<&SceneNode> {
        self.nodes
            .get(node_id.idx())
            .ok_or_else(|| anyhow!("Node {node_id} does not exist"))
    }

    fn existing_node_mut(&mut self, node_id: NodeID) -> Result<&mut SceneNode> {
        self.nodes
            .get_mut(node_id.idx())
            .ok_or_else(|| anyhow!("Node {node_id} does not exist"))
    }

    fn existing_group(&self, group_id: NodeID) -> Result<&GroupNode> {
        self.existing_node(group_id)?
            .as_group()
            .ok_or_else(|| anyhow!("Node {group_id} is not a group"))
    }

    fn existing_model_node_mut(&mut self, model_id: NodeID) -> Result<&mut SceneNode> {
        let node = self.existing_node_mut(model_id)?;
        if node.kind_tag() != NodeKindTag::Model {
            bail!("Node {model_id} is not a model");
        }
        Ok(node)
    }

    fn update_model_resources(
        &mut self,
        model_id: NodeID,
        update: impl FnOnce(&mut ModelNode) -> bool,
    ) -> Result<()> {
        let node = self.existing_node_mut(model_id)?;
        let Some(model) = node.as_model_mut() else {
            bail!("Node {model_id} is not a model");
        };
        let was_ready = model.is_ready();
        if !update(model) {
            return Ok(());
        }
        node.transform_mut().mark_dirty();
        if was_ready {
            self.reloaded_models.push(model_id);
        }
        Ok(())
    }

    fn create_child_node(&mut self, parent_id: NodeID, kind: NodeKind) -> Result<NodeID> {
        self.existing_group(parent_id)?;
        let node_id = self.add_node(Some(parent_id), kind);
        self.push_child(parent_id, node_id);
        self.structure_changed = true;
        Ok(node_id)
    }

    fn add_node(&mut self, parent: Option<NodeID>, kind: NodeKind) -> NodeID {
        let node_id = NodeID::from_idx(self.nodes.len());
        self.nodes.push(SceneNode::new(node_id, parent, kind));
        node_id
    }

    fn push_child(&mut self, parent_id: NodeID, child_id: NodeID) {
        if let Some(children) = self.nodes[parent_id.idx()].children_mut() {
            children.push(child_id);
        }
    }

    /// Removes the given node from the traversal children of the given
    /// container or of any split group below it. Split groups left empty are
    /// removed as well.
    fn remove_from_traversal(&mut self, container_id: NodeID, node_id: NodeID) -> bool {
        let container = &mut self.nodes[container_id.idx()];
        let Some(children) = container.children_mut() else {
            return false;
        };
        if let Some(position) = children.iter().position(|&child_id| child_id == node_id) {
            children.remove(position);
            return true;
        }

        let split_group_ids: Vec<_> = self.nodes[container_id.idx()]
            .children()
            .iter()
            .copied()
            .filter(|child_id| self.nodes[child_id.idx()].kind_tag() == NodeKindTag::SplitGroup)
            .collect();

        for split_group_id in split_group_ids {
            if self.remove_from_traversal(split_group_id, node_id) {
                if self.nodes[split_group_id.idx()].children().is_empty() {
                    if let Some(children) = self.nodes[container_id.idx()].children_mut() {
                        children.retain(|&child_id| child_id != split_group_id);
                    }
                }
                return true;
            }
        }
        false
    }

    fn apply_load_completions(&mut self) {
        let completions: Vec<_> = self.load_receiver.drain().collect();
        for (model_id, completion) in completions {
            let result = match completion {
                LoadCompletion::Geometry(geometry) => self.on_geometry_loaded(model_id, geometry),
                LoadCompletion::Material(material) => self.on_material_loaded(model_id, material),
                LoadCompletion::Failed(reason) => self.on_load_failed(model_id, &reason),
            };
            if let Err(error) = result {
                log::warn!("Ignoring load completion: {error:#}");
            }
        }
    }

    fn deliver_event(&mut self, event: &QueuedEvent) {
        let mut current = Some(event.target);
        while let Some(node_id) = current {
            if let Some(mut listeners) = self.events.take_listeners(node_id) {
                let delivered = Event {
                    name: event.name,
                    target: event.target,
                    current: node_id,
                    payload: event.payload.clone(),
                };
                for (name, listener) in &mut listeners {
                    if *name == event.name {
                        listener(self, &delivered);
                    }
                }
                self.events.restore_listeners(node_id, listeners);
            }
            current = if event.bubble {
                self.nodes[node_id.idx()].parent()
            } else {
                None
            };
        }
    }

    fn recalculate_node(
        &mut self,
        node_id: NodeID,
        parent_world_transform: Option<Matrix4<fre>>,
        inherited_dirty: bool,
        new_nodes: &mut BitVector,
    ) -> RecalculationResult {
        new_nodes.set_bit(node_id.idx());

        let node = &mut self.nodes[node_id.idx()];
        let kind = node.kind_tag();
        if inherited_dirty && kind != NodeKindTag::SplitGroup {
            node.transform_mut().mark_dirty();
        }

        match kind {
            NodeKindTag::Group => {
                let dirty = node
                    .transform_mut()
                    .recompute(parent_world_transform.as_ref());
                let world_transform = *node.transform().world_transform();
                self.recalculate_children(node_id, world_transform, dirty, new_nodes)
            }
            NodeKindTag::SplitGroup => {
                let world_transform = *self.world_transform(node_id);
                self.recalculate_children(node_id, world_transform, inherited_dirty, new_nodes)
            }
            NodeKindTag::Model | NodeKindTag::Camera | NodeKindTag::Light => {
                Self::recalculate_leaf(node, parent_world_transform.as_ref())
            }
        }
    }

    fn recalculate_leaf(
        node: &mut SceneNode,
        parent_world_transform: Option<&Matrix4<fre>>,
    ) -> RecalculationResult {
        let (transform, aabb, kind) = node.parts_mut();
        let dirty = transform.recompute(parent_world_transform);

        match kind {
            NodeKind::Model(model) => {
                if dirty {
                    if let Some(geometry) = model.geometry() {
                        *aabb = geometry.bounds().transformed(transform.world_transform());
                    }
                    model.invalidate_mvp_matrix();
                }
                RecalculationResult {
                    dirty,
                    processing: model.is_processing(),
                }
            }
            NodeKind::Camera(camera) => {
                let camera_changed = camera.update(transform.world_transform(), dirty);
                RecalculationResult {
                    dirty: dirty || camera_changed,
                    processing: false,
                }
            }
            NodeKind::Light(_) | NodeKind::Group(_) | NodeKind::SplitGroup(_) => {
                RecalculationResult {
                    dirty,
                    processing: false,
                }
            }
        }
    }

    fn recalculate_children(
        &mut self,
        node_id: NodeID,
        world_transform: Matrix4<fre>,
        dirty: bool,
        new_nodes: &mut BitVector,
    ) -> RecalculationResult {
        let mut result = RecalculationResult {
            dirty,
            processing: false,
        };

        let mut child_idx = 0;
        while let Some(&child_id) = self.nodes[node_id.idx()].children().get(child_idx) {
            let child_result =
                self.recalculate_node(child_id, Some(world_transform), dirty, new_nodes);
            result.dirty |= child_result.dirty;
            result.processing |= child_result.processing;
            child_idx += 1;
        }

        if result.dirty {
            self.update_group_aabb(node_id);

            let node = &self.nodes[node_id.idx()];
            let split_size = match node.kind() {
                NodeKind::Group(group) => group.split_size(),
                NodeKind::SplitGroup(split_group) => split_group.split_size(),
                _ => usize::MAX,
            };
            if !result.processing && node.children().len() > split_size {
                self.split(node_id, new_nodes);
            }
        }

        result
    }

    fn update_group_aabb(&mut self, node_id: NodeID) {
        let mut aabb = BoundingBox::empty();
        for child_id in self.nodes[node_id.idx()].children() {
            aabb.expand_to_include_box(self.nodes[child_id.idx()].aabb());
        }
        aabb.compute_points();
        *self.nodes[node_id.idx()].aabb_mut() = aabb;
    }

    /// Partitions the children of the given group or split group into new
    /// split groups by octant around the center of its bounding box. Nothing
    /// happens if the partition would not reduce the number of children.
    fn split(&mut self, node_id: NodeID, new_nodes: &mut BitVector) {
        let node = &self.nodes[node_id.idx()];
        let (owner_id, split_size) = match node.kind() {
            NodeKind::Group(group) => (node_id, group.split_size()),
            NodeKind::SplitGroup(split_group) => (split_group.owner(), split_group.split_size()),
            _ => return,
        };
        let n_children = node.children().len();
        let midpoint = *node.aabb().center();

        let Some(octants) = partition_into_octants(node.children().iter().map(|&child_id| {
            (
                child_id,
                octant_code(self.nodes[child_id.idx()].aabb(), &midpoint),
            )
        })) else {
            return;
        };
        if octants.len() >= n_children {
            return;
        }

        let mut split_group_ids = Vec::with_capacity(octants.len());
        for members in octants {
            let mut aabb = BoundingBox::empty();
            for member_id in &members {
                aabb.expand_to_include_box(self.nodes[member_id.idx()].aabb());
            }
            aabb.compute_points();

            let split_group_id = self.add_node(
                Some(owner_id),
                NodeKind::SplitGroup(SplitGroupNode::new(owner_id, members, split_size)),
            );
            let split_group = &mut self.nodes[split_group_id.idx()];
            *split_group.aabb_mut() = aabb;
            split_group.transform_mut().recompute(None);

            new_nodes.grow_to(self.nodes.len());
            new_nodes.set_bit(split_group_id.idx());
            split_group_ids.push(split_group_id);
        }

        log::debug!(
            "Split {n_children} children of node {node_id} into {} groups",
            split_group_ids.len()
        );

        if let Some(children) = self.nodes[node_id.idx()].children_mut() {
            *children = split_group_ids;
        }
        self.structure_changed = true;
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Point3, Vector3, point, vector};
    use proptest::prelude::*;
    use std::{cell::RefCell, rc::Rc};
    use tinyvec::tiny_vec;

    fn cube() -> Arc<Geometry> {
        Arc::new(Geometry::cube(1.0))
    }

    fn gray() -> Arc<Material> {
        Arc::new(Material::with_static_color([0.5, 0.5, 0.5, 1.0]))
    }

    fn create_cube_at(scene: &mut Scene, parent_id: NodeID, position: Point3<fre>) -> NodeID {
        let model_id = scene
            .create_model_node(parent_id, Some(cube()), Some(gray()))
            .unwrap();
        scene
            .transform_mut(model_id)
            .unwrap()
            .set_position(position);
        model_id
    }

    fn recalculate(scene: &mut Scene) -> bool {
        scene.recalculate(&mut BitVector::new())
    }

    #[test]
    fn creating_scene_gives_root_group() {
        let scene = Scene::new();
        assert_eq!(scene.n_nodes(), 1);
        assert!(scene.node(scene.root_id()).as_group().is_some());
        assert_eq!(scene.node(scene.root_id()).parent(), None);
    }

    #[test]
    fn creating_nodes_assigns_increasing_ids() {
        let mut scene = Scene::new();
        let root_id = scene.root_id();
        let group_id = scene.create_group_node(root_id).unwrap();
        let model_id = scene.create_model_node(group_id, None, None).unwrap();

        assert!(group_id < model_id);
        assert_eq!(scene.node(model_id).parent(), Some(group_id));
        assert_eq!(scene.node(group_id).children(), &[model_id]);
    }

    #[test]
    fn creating_node_under_non_group_fails() {
        let mut scene = Scene::new();
        let root_id = scene.root_id();
        let model_id = scene.create_model_node(root_id, None, None).unwrap();

        assert!(scene.create_group_node(model_id).is_err());
        assert!(scene.create_group_node(NodeID::from_u32(99)).is_err());
    }

    #[test]
    fn world_transforms_compose_through_three_levels() {
        let mut scene = Scene::new();
        let root_id = scene.root_id();
        let group_a = scene.create_group_node(root_id).unwrap();
        let group_b = scene.create_group_node(group_a).unwrap();
        let model_id = scene.create_model_node(group_b, Some(cube()), None).unwrap();

        let transform = scene.transform_mut(group_a).unwrap();
        transform.translate(&vector![1.0, 2.0, 3.0]);
        transform.rotate_y(0.4);
        let transform = scene.transform_mut(group_b).unwrap();
        transform.resize(vector![2.0, 1.0, 0.5]);
        transform.rotate_x(-1.1);
        let transform = scene.transform_mut(model_id).unwrap();
        transform.translate(&vector![0.0, -4.0, 1.0]);
        transform.rotate_z(0.7);

        recalculate(&mut scene);

        for (parent_id, child_id) in [(root_id, group_a), (group_a, group_b), (group_b, model_id)] {
            let expected =
                scene.world_transform(parent_id) * scene.node(child_id).transform().local_transform();
            assert_abs_diff_eq!(scene.world_transform(child_id), &expected, epsilon = 1e-5);
        }
        assert_abs_diff_eq!(
            scene.world_transform(root_id),
            scene.node(root_id).transform().local_transform()
        );
    }

    #[test]
    fn recalculating_twice_is_idempotent() {
        let mut scene = Scene::new();
        let root_id = scene.root_id();
        let model_id = create_cube_at(&mut scene, root_id, point![1.0, 0.0, 0.0]);

        assert!(recalculate(&mut scene));
        let world_transform = *scene.world_transform(model_id);
        let aabb = scene.node(model_id).aabb().clone();

        assert!(!recalculate(&mut scene));
        assert_eq!(scene.world_transform(model_id), &world_transform);
        assert_eq!(scene.node(model_id).aabb(), &aabb);
    }

    #[test]
    fn recalculation_marks_every_reachable_node_as_new() {
        let mut scene = Scene::new();
        let root_id = scene.root_id();
        let group_id = scene.create_group_node(root_id).unwrap();
        let model_id = scene.create_model_node(group_id, None, None).unwrap();

        let mut new_nodes = BitVector::new();
        scene.recalculate(&mut new_nodes);
        assert_eq!(
            new_nodes.set_bits().collect::<Vec<_>>(),
            vec![root_id.idx(), group_id.idx(), model_id.idx()]
        );

        // Bits are set also when nothing is dirty
        new_nodes.unset_all();
        scene.recalculate(&mut new_nodes);
        assert_eq!(new_nodes.count_set_bits(), 3);
    }

    #[test]
    fn moving_parent_moves_children() {
        let mut scene = Scene::new();
        let root_id = scene.root_id();
        let group_id = scene.create_group_node(root_id).unwrap();
        let model_id = create_cube_at(&mut scene, group_id, point![1.0, 0.0, 0.0]);
        recalculate(&mut scene);

        scene
            .transform_mut(group_id)
            .unwrap()
            .translate(&vector![0.0, 10.0, 0.0]);
        assert!(recalculate(&mut scene));

        assert_abs_diff_eq!(scene.node(model_id).aabb().center(), &point![1.0, 10.0, 0.0]);
        assert_abs_diff_eq!(scene.node(group_id).aabb().center(), &point![1.0, 10.0, 0.0]);
    }

    #[test]
    fn group_aabb_is_union_of_child_aabbs() {
        let mut scene = Scene::new();
        let root_id = scene.root_id();
        create_cube_at(&mut scene, root_id, point![-2.0, 0.0, 0.0]);
        create_cube_at(&mut scene, root_id, point![3.0, 1.0, -1.0]);
        // Lights and cameras have empty boxes that do not contribute
        scene
            .create_light_node(root_id, LightKind::Directional, [1.0; 3], [1.0; 3])
            .unwrap();

        recalculate(&mut scene);

        let aabb = scene.node(root_id).aabb();
        assert_abs_diff_eq!(aabb.lower_corner(), point![-2.5, -0.5, -1.5]);
        assert_abs_diff_eq!(aabb.upper_corner(), point![3.5, 1.5, 0.5]);
    }

    #[test]
    fn oversized_group_is_split_into_octants() {
        let split_size = 8;
        let mut scene = Scene::with_root_split_size(split_size);
        let root_id = scene.root_id();

        let mut model_ids = Vec::new();
        for idx in 0..=split_size {
            let octant = idx % 8;
            let position = point![
                if octant & 1 != 0 { 5.0 } else { -5.0 },
                if octant & 2 != 0 { 5.0 } else { -5.0 },
                if octant & 4 != 0 { 5.0 } else { -5.0 }
            ] + Vector3::repeat(0.1 * idx as fre);
            model_ids.push(create_cube_at(&mut scene, root_id, position));
        }

        let mut new_nodes = BitVector::new();
        scene.recalculate(&mut new_nodes);

        let children = scene.node(root_id).children().to_vec();
        assert_eq!(children.len(), 8);

        let mut grandchildren = Vec::new();
        for &child_id in &children {
            let split_group = scene.node(child_id).as_split_group().unwrap();
            assert_eq!(split_group.owner(), root_id);
            assert!(!split_group.children().is_empty());
            assert!(new_nodes.bit_is_set(child_id.idx()));
            grandchildren.extend_from_slice(split_group.children());
        }
        grandchildren.sort();
        assert_eq!(grandchildren, model_ids);

        for &model_id in &model_ids {
            assert_eq!(scene.node(model_id).parent(), Some(root_id));
        }
        assert!(scene.structure_changed());
    }

    #[test]
    fn split_group_aabbs_bound_their_members() {
        let mut scene = Scene::with_root_split_size(2);
        let root_id = scene.root_id();
        create_cube_at(&mut scene, root_id, point![-3.0, -3.0, -3.0]);
        create_cube_at(&mut scene, root_id, point![-4.0, -3.0, -3.0]);
        create_cube_at(&mut scene, root_id, point![3.0, 3.0, 3.0]);

        recalculate(&mut scene);

        let children = scene.node(root_id).children().to_vec();
        assert_eq!(children.len(), 2);
        for split_group_id in children {
            let split_group = scene.node(split_group_id);
            for member_id in split_group.children() {
                assert!(split_group.aabb().contains_box(scene.node(*member_id).aabb()));
            }
        }
    }

    #[test]
    fn group_with_all_children_in_one_octant_is_not_split() {
        let mut scene = Scene::with_root_split_size(2);
        let root_id = scene.root_id();
        for _ in 0..4 {
            create_cube_at(&mut scene, root_id, point![1.0, 1.0, 1.0]);
        }

        recalculate(&mut scene);

        assert_eq!(scene.node(root_id).children().len(), 4);
        assert!(
            scene
                .node(root_id)
                .children()
                .iter()
                .all(|&child_id| scene.node(child_id).as_model().is_some())
        );
    }

    #[test]
    fn group_with_loading_children_is_not_split() {
        let mut scene = Scene::with_root_split_size(2);
        let root_id = scene.root_id();
        create_cube_at(&mut scene, root_id, point![-3.0, -3.0, -3.0]);
        create_cube_at(&mut scene, root_id, point![3.0, 3.0, 3.0]);
        let loading_id = scene.create_model_node(root_id, Some(cube()), None).unwrap();

        recalculate(&mut scene);
        assert_eq!(scene.node(root_id).children().len(), 3);

        scene.on_material_loaded(loading_id, gray()).unwrap();
        recalculate(&mut scene);
        assert!(
            scene
                .node(root_id)
                .children()
                .iter()
                .all(|&child_id| scene.node(child_id).as_split_group().is_some())
        );
    }

    #[test]
    fn split_groups_forward_owner_transform() {
        let mut scene = Scene::with_root_split_size(2);
        let root_id = scene.root_id();
        let group_id = scene.create_group_node_with_split_size(root_id, 2).unwrap();
        let model_a = create_cube_at(&mut scene, group_id, point![-3.0, 0.0, 0.0]);
        create_cube_at(&mut scene, group_id, point![3.0, 0.0, 0.0]);
        create_cube_at(&mut scene, group_id, point![4.0, 0.0, 0.0]);
        recalculate(&mut scene);

        scene
            .transform_mut(group_id)
            .unwrap()
            .translate(&vector![0.0, 0.0, 10.0]);
        recalculate(&mut scene);

        let split_group_id = scene.node(group_id).children()[0];
        assert_eq!(
            scene.world_transform(split_group_id),
            scene.world_transform(group_id)
        );
        assert_abs_diff_eq!(scene.node(model_a).aabb().center(), &point![-3.0, 0.0, 10.0]);
    }

    #[test]
    fn logical_children_look_through_split_groups() {
        let mut scene = Scene::with_root_split_size(2);
        let root_id = scene.root_id();
        let ids = [
            create_cube_at(&mut scene, root_id, point![-3.0, -3.0, -3.0]),
            create_cube_at(&mut scene, root_id, point![3.0, 3.0, 3.0]),
            create_cube_at(&mut scene, root_id, point![3.0, -3.0, 3.0]),
        ];
        recalculate(&mut scene);

        let mut children = scene.logical_children(root_id).unwrap();
        children.sort();
        assert_eq!(children, ids);
    }

    #[test]
    fn detaching_node_inside_split_group_works() {
        let mut scene = Scene::with_root_split_size(2);
        let root_id = scene.root_id();
        let lonely_id = create_cube_at(&mut scene, root_id, point![-3.0, -3.0, -3.0]);
        create_cube_at(&mut scene, root_id, point![3.0, 3.0, 3.0]);
        create_cube_at(&mut scene, root_id, point![4.0, 3.0, 3.0]);
        recalculate(&mut scene);
        assert_eq!(scene.node(root_id).children().len(), 2);
        scene.take_structure_changed();

        scene.detach_node(lonely_id).unwrap();

        // The emptied split group is dropped
        assert_eq!(scene.node(root_id).children().len(), 1);
        assert_eq!(scene.node(lonely_id).parent(), None);
        assert!(scene.structure_changed());
        assert!(!scene.logical_children(root_id).unwrap().contains(&lonely_id));

        recalculate(&mut scene);
        assert_abs_diff_eq!(scene.node(root_id).aabb().lower_corner().x, 2.5);
    }

    #[test]
    fn detached_node_can_be_attached_again() {
        let mut scene = Scene::new();
        let root_id = scene.root_id();
        let group_id = scene.create_group_node(root_id).unwrap();
        let model_id = scene.create_model_node(root_id, None, None).unwrap();

        scene.detach_node(model_id).unwrap();
        assert!(scene.detach_node(model_id).is_err());

        scene.attach_node(model_id, group_id).unwrap();
        assert_eq!(scene.node(model_id).parent(), Some(group_id));
        assert_eq!(scene.node(group_id).children(), &[model_id]);
        assert!(scene.node(model_id).is_dirty());
    }

    #[test]
    fn attaching_attached_node_fails() {
        let mut scene = Scene::new();
        let root_id = scene.root_id();
        let group_id = scene.create_group_node(root_id).unwrap();
        let model_id = scene.create_model_node(root_id, None, None).unwrap();

        assert!(scene.attach_node(model_id, group_id).is_err());
    }

    #[test]
    fn attaching_group_below_itself_fails() {
        let mut scene = Scene::new();
        let root_id = scene.root_id();
        let outer_id = scene.create_group_node(root_id).unwrap();
        let inner_id = scene.create_group_node(outer_id).unwrap();

        scene.detach_node(outer_id).unwrap();
        assert!(scene.attach_node(outer_id, inner_id).is_err());
        assert!(scene.attach_node(outer_id, outer_id).is_err());
    }

    #[test]
    fn attaching_root_fails() {
        let mut scene = Scene::new();
        let root_id = scene.root_id();
        let group_id = scene.create_group_node(root_id).unwrap();
        scene.detach_node(group_id).unwrap();

        assert!(scene.attach_node(root_id, group_id).is_err());
        assert_eq!(scene.node(root_id).parent(), None);
        assert!(scene.node(group_id).children().is_empty());
    }

    #[test]
    fn detached_nodes_are_not_recalculated() {
        let mut scene = Scene::new();
        let root_id = scene.root_id();
        let model_id = create_cube_at(&mut scene, root_id, point![0.0, 0.0, 0.0]);
        recalculate(&mut scene);
        scene.detach_node(model_id).unwrap();

        let mut new_nodes = BitVector::new();
        scene.recalculate(&mut new_nodes);

        assert!(!new_nodes.bit_is_set(model_id.idx()));
        assert!(scene.node(root_id).aabb().is_empty());
    }

    #[test]
    fn subtree_ids_list_node_and_descendants_in_preorder() {
        let mut scene = Scene::new();
        let root_id = scene.root_id();
        let group_a = scene.create_group_node(root_id).unwrap();
        let model_a = scene.create_model_node(group_a, None, None).unwrap();
        let group_b = scene.create_group_node(root_id).unwrap();
        let model_b = scene.create_model_node(group_b, None, None).unwrap();
        let model_c = scene.create_model_node(group_a, None, None).unwrap();

        scene.update_subtree_ids();

        assert_eq!(
            scene.node(root_id).subtree_ids(),
            &[root_id, group_a, model_a, model_c, group_b, model_b]
        );
        assert_eq!(scene.node(group_a).subtree_ids(), &[group_a, model_a, model_c]);
        assert_eq!(scene.node(model_b).subtree_ids(), &[model_b]);
    }

    #[test]
    fn loads_reported_through_sender_are_applied_on_recalculation() {
        let mut scene = Scene::new();
        let root_id = scene.root_id();
        let model_id = scene.create_model_node(root_id, None, None).unwrap();
        recalculate(&mut scene);

        let sender = scene.load_sender();
        let geometry = cube();
        let material = gray();
        std::thread::spawn(move || {
            sender.geometry_loaded(model_id, geometry).unwrap();
            sender.material_loaded(model_id, material).unwrap();
        })
        .join()
        .unwrap();

        assert!(scene.model(model_id).unwrap().is_processing());
        assert!(recalculate(&mut scene));
        assert!(scene.model(model_id).unwrap().is_ready());
        assert!(!scene.node(model_id).aabb().is_empty());
    }

    #[test]
    fn failed_load_leaves_model_processing() {
        let mut scene = Scene::new();
        let root_id = scene.root_id();
        let model_id = scene.create_model_node(root_id, Some(cube()), None).unwrap();

        scene
            .load_sender()
            .load_failed(model_id, "file not found")
            .unwrap();
        recalculate(&mut scene);

        let model = scene.model(model_id).unwrap();
        assert!(model.has_failed());
        assert!(model.is_processing());
    }

    #[test]
    fn replacing_resources_of_ready_model_reports_it_as_reloaded() {
        let mut scene = Scene::new();
        let root_id = scene.root_id();
        let loading_id = scene.create_model_node(root_id, None, Some(gray())).unwrap();
        let ready_id = create_cube_at(&mut scene, root_id, point![0.0, 0.0, 0.0]);
        recalculate(&mut scene);

        scene.on_geometry_loaded(loading_id, cube()).unwrap();
        assert!(scene.take_reloaded_models().is_empty());

        let larger_cube = Arc::new(Geometry::cube(2.0));
        scene.on_geometry_loaded(ready_id, Arc::clone(&larger_cube)).unwrap();
        assert_eq!(scene.take_reloaded_models(), vec![ready_id]);
        assert!(scene.take_reloaded_models().is_empty());

        assert!(recalculate(&mut scene));
        assert_eq!(
            scene.model(ready_id).unwrap().geometry().map(|geometry| geometry.id()),
            Some(larger_cube.id())
        );
        assert_abs_diff_eq!(scene.node(ready_id).aabb().upper_corner(), point![1.0, 1.0, 1.0]);
    }

    #[test]
    fn load_for_non_model_is_rejected() {
        let mut scene = Scene::new();
        let root_id = scene.root_id();
        assert!(scene.on_geometry_loaded(root_id, cube()).is_err());
    }

    #[test]
    fn sync_events_are_delivered_immediately() {
        let mut scene = Scene::new();
        let root_id = scene.root_id();
        let received = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&received);
        scene
            .on(root_id, "pick", move |_, event| {
                sink.borrow_mut().push(event.payload.to_vec());
            })
            .unwrap();

        scene
            .trigger(root_id, "pick", TriggerFlags::SYNC, tiny_vec![1.0, 2.0])
            .unwrap();
        scene
            .trigger(root_id, "other", TriggerFlags::SYNC, tiny_vec![])
            .unwrap();

        assert_eq!(*received.borrow(), vec![vec![1.0, 2.0]]);
    }

    #[test]
    fn queued_events_wait_for_dispatch() {
        let mut scene = Scene::new();
        let root_id = scene.root_id();
        let count = Rc::new(RefCell::new(0));

        let counter = Rc::clone(&count);
        scene
            .on(root_id, "tick", move |_, _| *counter.borrow_mut() += 1)
            .unwrap();

        scene
            .trigger(root_id, "tick", TriggerFlags::empty(), tiny_vec![])
            .unwrap();
        scene
            .trigger(root_id, "tick", TriggerFlags::empty(), tiny_vec![])
            .unwrap();
        assert_eq!(*count.borrow(), 0);

        assert_eq!(scene.dispatch_events(), 2);
        assert_eq!(*count.borrow(), 2);
        assert_eq!(scene.n_queued_events(), 0);
    }

    #[test]
    fn buffered_events_keep_newest_payload() {
        let mut scene = Scene::new();
        let root_id = scene.root_id();
        let received = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&received);
        scene
            .on(root_id, "move", move |_, event| {
                sink.borrow_mut().push(event.payload[0]);
            })
            .unwrap();

        for x in [1.0, 2.0, 3.0] {
            scene
                .trigger(root_id, "move", TriggerFlags::BUFFER, tiny_vec![_ => x])
                .unwrap();
        }
        assert_eq!(scene.n_queued_events(), 1);

        scene.dispatch_events();
        assert_eq!(*received.borrow(), vec![3.0]);
    }

    #[test]
    fn bubbling_events_reach_logical_ancestors() {
        let mut scene = Scene::with_root_split_size(1);
        let root_id = scene.root_id();
        let model_id = create_cube_at(&mut scene, root_id, point![-3.0, 0.0, 0.0]);
        create_cube_at(&mut scene, root_id, point![3.0, 0.0, 0.0]);
        create_cube_at(&mut scene, root_id, point![4.0, 0.0, 0.0]);
        recalculate(&mut scene);

        let visited = Rc::new(RefCell::new(Vec::new()));
        for node_id in [model_id, root_id] {
            let sink = Rc::clone(&visited);
            scene
                .on(node_id, "click", move |_, event| {
                    sink.borrow_mut().push((event.target, event.current));
                })
                .unwrap();
        }

        scene
            .trigger(
                model_id,
                "click",
                TriggerFlags::BUBBLE | TriggerFlags::SYNC,
                tiny_vec![],
            )
            .unwrap();

        assert_eq!(
            *visited.borrow(),
            vec![(model_id, model_id), (model_id, root_id)]
        );
    }

    #[test]
    fn listeners_can_mutate_scene() {
        let mut scene = Scene::new();
        let root_id = scene.root_id();
        let camera_id = scene
            .create_camera_node(root_id, Projection::perspective(60.0, 1.0, 0.1, 100.0).unwrap())
            .unwrap();
        recalculate(&mut scene);

        scene
            .on(camera_id, "drag", move |scene, event| {
                scene
                    .transform_mut(event.target)
                    .unwrap()
                    .translate(&vector![event.payload[0], 0.0, 0.0]);
            })
            .unwrap();
        scene
            .trigger(camera_id, "drag", TriggerFlags::SYNC, tiny_vec![2.0])
            .unwrap();

        assert!(recalculate(&mut scene));
        assert_abs_diff_eq!(scene.camera(camera_id).unwrap().position(), &point![2.0, 0.0, 0.0]);
        assert!(scene.has_listener(camera_id, "drag"));
    }

    #[test]
    fn camera_can_see_rejects_non_camera() {
        let mut scene = Scene::new();
        let root_id = scene.root_id();
        let model_id = scene.create_model_node(root_id, None, None).unwrap();
        let mut mask = ALL_PLANES_MASK;
        assert!(scene.camera_can_see(model_id, root_id, &mut mask).is_err());
    }

    proptest! {
        #[test]
        fn group_aabb_tightly_bounds_children(
            positions in prop::collection::vec(
                (-100.0f32..100.0, -100.0f32..100.0, -100.0f32..100.0),
                1..40,
            ),
            split_size in 1usize..20,
        ) {
            let mut scene = Scene::with_root_split_size(split_size);
            let root_id = scene.root_id();
            let group_id = scene.create_group_node_with_split_size(root_id, split_size).unwrap();
            for &(x, y, z) in &positions {
                create_cube_at(&mut scene, group_id, point![x, y, z]);
            }

            recalculate(&mut scene);

            let group_aabb = scene.node(group_id).aabb().clone();
            let mut union = BoundingBox::empty();
            for child_id in scene.logical_children(group_id).unwrap() {
                let child_aabb = scene.node(child_id).aabb();
                prop_assert!(group_aabb.contains_box(child_aabb));
                union.expand_to_include_box(child_aabb);
            }
            prop_assert_eq!(scene.logical_children(group_id).unwrap().len(), positions.len());
            for (group_bound, union_bound) in group_aabb.intervals().iter().zip(union.intervals()) {
                prop_assert!((group_bound - union_bound).abs() < 1e-4);
            }
        }
    }
}
