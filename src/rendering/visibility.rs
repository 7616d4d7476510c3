//! Marking of the nodes visible from a camera.

use crate::scene::{ALL_PLANES_MASK, NodeID, NodeKindTag, Scene, Visibility};
use anyhow::Result;
use tribus_utils::BitVector;

/// Sets the bit of every node whose bounding box is visible from the given
/// camera, walking the scene from the root.
///
/// A node fully inside the frustum marks its whole subtree without testing
/// it. A node straddling the frustum is marked and its children are tested
/// against only the planes it straddles. Cameras and lights are never tested.
/// Subtree IDs must be up to date.
///
/// # Returns
/// The number of nodes tested.
///
/// # Errors
/// Returns an error if `camera_id` is not a camera in the scene.
pub fn mark_visible_nodes(
    scene: &mut Scene,
    camera_id: NodeID,
    visible_nodes: &mut BitVector,
) -> Result<usize> {
    visible_nodes.grow_to(scene.n_nodes());

    let mut n_tested = 0;
    let mut stack = vec![(scene.root_id(), ALL_PLANES_MASK)];

    while let Some((node_id, mut mask)) = stack.pop() {
        if matches!(
            scene.node(node_id).kind_tag(),
            NodeKindTag::Camera | NodeKindTag::Light
        ) {
            continue;
        }

        n_tested += 1;
        match scene.camera_can_see(camera_id, node_id, &mut mask)? {
            Visibility::Outside => {}
            Visibility::Inside => {
                for subtree_node_id in scene.node(node_id).subtree_ids() {
                    visible_nodes.set_bit(subtree_node_id.idx());
                }
            }
            Visibility::Intersect => {
                visible_nodes.set_bit(node_id.idx());
                stack.extend(
                    scene
                        .node(node_id)
                        .children()
                        .iter()
                        .map(|&child_id| (child_id, mask)),
                );
            }
        }
    }

    Ok(n_tested)
}
