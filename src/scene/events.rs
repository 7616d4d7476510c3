//! Events triggered on scene nodes.

use crate::scene::{NodeID, Scene};
use bitflags::bitflags;
use tinyvec::TinyVec;
use tribus_utils::NoHashMap;

bitflags! {
    /// Options for [`Scene::trigger`].
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct TriggerFlags: u8 {
        /// Also deliver the event to every logical ancestor of the node.
        const BUBBLE = 1 << 0;
        /// Replace the payload of an already queued event with the same name
        /// on the same node instead of queueing another one.
        const BUFFER = 1 << 1;
        /// Deliver the event immediately instead of queueing it until the
        /// next [`Scene::dispatch_events`].
        const SYNC = 1 << 2;
    }
}

/// Numeric arguments carried by an event.
pub type EventPayload = TinyVec<[f32; 4]>;

/// Callback invoked for events delivered to a node.
pub type EventListener = Box<dyn FnMut(&mut Scene, &Event)>;

/// An event delivered to a listener.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// Name the event was triggered with.
    pub name: &'static str,
    /// Node the event was triggered on.
    pub target: NodeID,
    /// Node whose listener is being invoked, which differs from the target
    /// while bubbling.
    pub current: NodeID,
    pub payload: EventPayload,
}

/// Registry of event listeners and queued events of a scene.
#[derive(Default)]
pub(crate) struct EventRegistry {
    listeners: NoHashMap<NodeID, Vec<(&'static str, EventListener)>>,
    queue: Vec<QueuedEvent>,
}

#[derive(Clone, Debug)]
pub(crate) struct QueuedEvent {
    pub(crate) target: NodeID,
    pub(crate) name: &'static str,
    pub(crate) bubble: bool,
    pub(crate) payload: EventPayload,
}

impl EventRegistry {
    pub(crate) fn add_listener(
        &mut self,
        node_id: NodeID,
        name: &'static str,
        listener: EventListener,
    ) {
        self.listeners
            .entry(node_id)
            .or_default()
            .push((name, listener));
    }

    pub(crate) fn has_listeners(&self, node_id: NodeID, name: &str) -> bool {
        self.listeners
            .get(&node_id)
            .is_some_and(|listeners| listeners.iter().any(|(n, _)| *n == name))
    }

    pub(crate) fn enqueue(&mut self, event: QueuedEvent, buffer: bool) {
        if buffer {
            if let Some(queued) = self
                .queue
                .iter_mut()
                .find(|queued| queued.target == event.target && queued.name == event.name)
            {
                queued.payload = event.payload;
                queued.bubble |= event.bubble;
                return;
            }
        }
        self.queue.push(event);
    }

    pub(crate) fn take_queue(&mut self) -> Vec<QueuedEvent> {
        std::mem::take(&mut self.queue)
    }

    pub(crate) fn n_queued(&self) -> usize {
        self.queue.len()
    }

    /// Removes the listeners of the given node so that they can be invoked
    /// with mutable access to the scene.
    pub(crate) fn take_listeners(
        &mut self,
        node_id: NodeID,
    ) -> Option<Vec<(&'static str, EventListener)>> {
        self.listeners.remove(&node_id)
    }

    /// Puts back listeners removed with [`Self::take_listeners`], keeping any
    /// listeners registered for the node in the meantime after them.
    pub(crate) fn restore_listeners(
        &mut self,
        node_id: NodeID,
        mut listeners: Vec<(&'static str, EventListener)>,
    ) {
        if let Some(added) = self.listeners.remove(&node_id) {
            listeners.extend(added);
        }
        self.listeners.insert(node_id, listeners);
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field(
                "n_listeners",
                &self.listeners.values().map(Vec::len).sum::<usize>(),
            )
            .field("queue", &self.queue)
            .finish()
    }
}
