use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::{Deserialize, Serialize};
use studymap_core::{NodeId, SessionPhase};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // Session
    SessionPhaseChanged {
        phase: SessionPhase,
    },
    GraphSeeded {
        topic: String,
        root_count: usize,
    },
    GraphReset,

    // Expand / collapse
    NodeLoading {
        id: NodeId,
    },
    NodeExpanded {
        id: NodeId,
        child_count: usize,
        from_cache: bool,
    },
    NodeExpandFailed {
        id: NodeId,
        error: String,
    },
    NodeCollapsed {
        id: NodeId,
        removed_nodes: usize,
        removed_edges: usize,
    },
    /// A fetch finished for a node that is no longer waiting on it.
    StaleResponseDropped {
        id: NodeId,
    },

    // Detail panel
    NodeSelected {
        id: NodeId,
    },
    DetailReady {
        id: NodeId,
    },
    DetailFallback {
        id: NodeId,
        error: String,
    },
    DetailClosed,

    // Notifications
    StatusUpdate {
        message: String,
    },
    ShowError {
        message: String,
    },
}

#[derive(Clone)]
pub struct EventBus {
    tx: Sender<Event>,
    rx: Receiver<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> Sender<Event> {
        self.tx.clone()
    }

    pub fn receiver(&self) -> Receiver<Event> {
        self.rx.clone()
    }

    pub fn publish(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    /// Dispatch all pending events to a listener.
    pub fn dispatch_to<L: EventListener>(&self, listener: &mut L) {
        while let Ok(event) = self.rx.try_recv() {
            listener.handle_event(&event);
        }
    }

    /// Take everything queued so far.
    pub fn drain(&self) -> Vec<Event> {
        self.rx.try_iter().collect()
    }
}

/// Trait for components that respond to events.
pub trait EventListener {
    fn handle_event(&mut self, event: &Event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        expanded: usize,
        collapsed: usize,
    }

    impl EventListener for Counter {
        fn handle_event(&mut self, event: &Event) {
            match event {
                Event::NodeExpanded { .. } => self.expanded += 1,
                Event::NodeCollapsed { .. } => self.collapsed += 1,
                _ => {}
            }
        }
    }

    #[test]
    fn test_event_bus_publish_receive() {
        let bus = EventBus::new();
        let sender = bus.sender();
        let receiver = bus.receiver();

        sender
            .send(Event::NodeLoading {
                id: NodeId::from("topic-0"),
            })
            .unwrap();

        match receiver.recv().unwrap() {
            Event::NodeLoading { id } => assert_eq!(id.as_str(), "topic-0"),
            other => panic!("Expected NodeLoading, got {other:?}"),
        }
    }

    #[test]
    fn test_dispatch_to_listener() {
        let bus = EventBus::new();
        bus.publish(Event::NodeExpanded {
            id: NodeId::from("topic-0"),
            child_count: 3,
            from_cache: false,
        });
        bus.publish(Event::NodeCollapsed {
            id: NodeId::from("topic-0"),
            removed_nodes: 3,
            removed_edges: 3,
        });
        bus.publish(Event::GraphReset);

        let mut counter = Counter::default();
        bus.dispatch_to(&mut counter);
        assert_eq!(counter.expanded, 1);
        assert_eq!(counter.collapsed, 1);
        assert!(bus.drain().is_empty());
    }
}
