//! Scene node records.

use crate::{
    geometry::{BoundingBox, NodeTransform},
    scene::{CameraNode, GroupNode, LightNode, ModelNode, SplitGroupNode},
};

define_id_newtype!(
    /// Identifier for a [`SceneNode`] in a [`Scene`](crate::scene::Scene).
    /// IDs are dense and never reused, so they double as indices into bit
    /// vectors and arrays parallel to the scene's node table.
    [pub] NodeID
);

/// A node in a [`Scene`](crate::scene::Scene): the record shared by all node
/// kinds, with the kind-specific data in [`NodeKind`].
#[derive(Clone, Debug)]
pub struct SceneNode {
    id: NodeID,
    parent: Option<NodeID>,
    transform: NodeTransform,
    aabb: BoundingBox,
    subtree_ids: Vec<NodeID>,
    kind: NodeKind,
}

/// The kind of a [`SceneNode`].
#[derive(Clone, Debug)]
pub enum NodeKind {
    Group(GroupNode),
    SplitGroup(SplitGroupNode),
    Model(ModelNode),
    Camera(CameraNode),
    Light(LightNode),
}

/// Field-less counterpart of [`NodeKind`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKindTag {
    Group,
    SplitGroup,
    Model,
    Camera,
    Light,
}

impl NodeID {
    /// Returns the index of the node in the node table.
    #[inline]
    pub const fn idx(&self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub(crate) const fn from_idx(idx: usize) -> Self {
        Self(idx as u32)
    }
}

impl SceneNode {
    pub(crate) fn new(id: NodeID, parent: Option<NodeID>, kind: NodeKind) -> Self {
        Self {
            id,
            parent,
            transform: NodeTransform::new(),
            aabb: BoundingBox::empty(),
            subtree_ids: Vec::new(),
            kind,
        }
    }

    pub fn id(&self) -> NodeID {
        self.id
    }

    /// Returns the logical parent of the node, or `None` for a root or a
    /// detached node.
    pub fn parent(&self) -> Option<NodeID> {
        self.parent
    }

    pub fn transform(&self) -> &NodeTransform {
        &self.transform
    }

    /// Returns the transform for mutation. Mutations mark the node dirty and
    /// take effect on the next recalculation.
    pub fn transform_mut(&mut self) -> &mut NodeTransform {
        &mut self.transform
    }

    /// Returns the bounding box of the node in world space.
    pub fn aabb(&self) -> &BoundingBox {
        &self.aabb
    }

    /// Returns the ID of this node followed by the IDs of every node below it,
    /// in depth-first order, as of the last structural update of the scene.
    pub fn subtree_ids(&self) -> &[NodeID] {
        &self.subtree_ids
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn kind_tag(&self) -> NodeKindTag {
        self.kind.tag()
    }

    pub fn is_dirty(&self) -> bool {
        self.transform.is_dirty()
    }

    /// Returns the IDs of the nodes traversed below this node.
    pub fn children(&self) -> &[NodeID] {
        match &self.kind {
            NodeKind::Group(group) => group.children(),
            NodeKind::SplitGroup(split_group) => split_group.children(),
            NodeKind::Model(_) | NodeKind::Camera(_) | NodeKind::Light(_) => &[],
        }
    }

    /// Whether the node or any node below it is waiting for resources, as of
    /// the node's own state. Groups aggregate this during recalculation.
    pub fn is_processing(&self) -> bool {
        match &self.kind {
            NodeKind::Model(model) => model.is_processing(),
            _ => false,
        }
    }

    pub fn as_group(&self) -> Option<&GroupNode> {
        match &self.kind {
            NodeKind::Group(group) => Some(group),
            _ => None,
        }
    }

    pub fn as_split_group(&self) -> Option<&SplitGroupNode> {
        match &self.kind {
            NodeKind::SplitGroup(split_group) => Some(split_group),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&ModelNode> {
        match &self.kind {
            NodeKind::Model(model) => Some(model),
            _ => None,
        }
    }

    pub fn as_camera(&self) -> Option<&CameraNode> {
        match &self.kind {
            NodeKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    pub fn as_light(&self) -> Option<&LightNode> {
        match &self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }

    pub(crate) fn set_parent(&mut self, parent: Option<NodeID>) {
        self.parent = parent;
    }

    pub(crate) fn aabb_mut(&mut self) -> &mut BoundingBox {
        &mut self.aabb
    }

    pub(crate) fn set_subtree_ids(&mut self, subtree_ids: Vec<NodeID>) {
        self.subtree_ids = subtree_ids;
    }

    pub(crate) fn take_subtree_ids(&mut self) -> Vec<NodeID> {
        std::mem::take(&mut self.subtree_ids)
    }

    /// Splits the record into its transform, bounding box and kind so that
    /// they can be updated together.
    pub(crate) fn parts_mut(&mut self) -> (&mut NodeTransform, &mut BoundingBox, &mut NodeKind) {
        (&mut self.transform, &mut self.aabb, &mut self.kind)
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<NodeID>> {
        match &mut self.kind {
            NodeKind::Group(group) => Some(group.children_mut()),
            NodeKind::SplitGroup(split_group) => Some(split_group.children_mut()),
            NodeKind::Model(_) | NodeKind::Camera(_) | NodeKind::Light(_) => None,
        }
    }

    pub(crate) fn as_model_mut(&mut self) -> Option<&mut ModelNode> {
        match &mut self.kind {
            NodeKind::Model(model) => Some(model),
            _ => None,
        }
    }

    pub(crate) fn as_camera_mut(&mut self) -> Option<&mut CameraNode> {
        match &mut self.kind {
            NodeKind::Camera(camera) => Some(camera),
            _ => None,
        }
    }
}

impl NodeKind {
    pub fn tag(&self) -> NodeKindTag {
        match self {
            Self::Group(_) => NodeKindTag::Group,
            Self::SplitGroup(_) => NodeKindTag::SplitGroup,
            Self::Model(_) => NodeKindTag::Model,
            Self::Camera(_) => NodeKindTag::Camera,
            Self::Light(_) => NodeKindTag::Light,
        }
    }
}
