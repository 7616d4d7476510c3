//! Group nodes and the spatial split groups they partition their children
//! into.

use crate::{
    geometry::{BoundingBox, fre},
    scene::NodeID,
};
use nalgebra::Point3;

/// Default number of children a group may hold before it is split.
pub const DEFAULT_SPLIT_SIZE: usize = 16;

/// A node with an ordered list of children.
///
/// When the group holds more than `split_size` children and none of them is
/// still loading, the children are partitioned into octants around the
/// group's bounding box center and the group's child list is replaced with one
/// [`SplitGroupNode`] per non-empty octant. The logical children keep the
/// group as their parent.
#[derive(Clone, Debug)]
pub struct GroupNode {
    children: Vec<NodeID>,
    split_size: usize,
}

/// An internal node produced by splitting a [`GroupNode`]. It has no transform
/// of its own but inherits the world transform of its owner, the logical group
/// it was split from. It is never the logical parent of a node.
#[derive(Clone, Debug)]
pub struct SplitGroupNode {
    owner: NodeID,
    children: Vec<NodeID>,
    split_size: usize,
}

impl GroupNode {
    pub(crate) fn new(split_size: usize) -> Self {
        Self {
            children: Vec::new(),
            split_size,
        }
    }

    /// Returns the IDs of the nodes traversed below this group, which are
    /// split groups once the group has been split.
    pub fn children(&self) -> &[NodeID] {
        &self.children
    }

    pub fn split_size(&self) -> usize {
        self.split_size
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<NodeID> {
        &mut self.children
    }
}

impl SplitGroupNode {
    pub(crate) fn new(owner: NodeID, children: Vec<NodeID>, split_size: usize) -> Self {
        Self {
            owner,
            children,
            split_size,
        }
    }

    /// Returns the ID of the logical group whose transform this node
    /// inherits.
    pub fn owner(&self) -> NodeID {
        self.owner
    }

    pub fn children(&self) -> &[NodeID] {
        &self.children
    }

    pub fn split_size(&self) -> usize {
        self.split_size
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<NodeID> {
        &mut self.children
    }
}

/// Computes the 3-bit octant code of the given box relative to the given
/// midpoint, with bit 0 set if the box center lies above the midpoint along
/// x, bit 1 along y and bit 2 along z. Empty boxes go to octant 0.
pub fn octant_code(aabb: &BoundingBox, midpoint: &Point3<fre>) -> usize {
    if aabb.is_empty() {
        return 0;
    }
    let center = aabb.center();
    usize::from(center.x > midpoint.x)
        | (usize::from(center.y > midpoint.y) << 1)
        | (usize::from(center.z > midpoint.z) << 2)
}

/// Partitions the given children into octants by their octant codes.
///
/// # Returns
/// The non-empty octants in order of octant code, or `None` if all children
/// fall in the same octant so that splitting would not reduce the group.
pub fn partition_into_octants(
    children: impl IntoIterator<Item = (NodeID, usize)>,
) -> Option<Vec<Vec<NodeID>>> {
    let mut octants: [Vec<NodeID>; 8] = Default::default();
    for (child_id, code) in children {
        octants[code].push(child_id);
    }
    let non_empty: Vec<_> = octants
        .into_iter()
        .filter(|members| !members.is_empty())
        .collect();
    (non_empty.len() > 1).then_some(non_empty)
}
