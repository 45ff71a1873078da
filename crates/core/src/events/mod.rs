use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};

use crate::{dom::ElementId, timeline::Timeline, Result};

/// Input delivered by the host page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageEvent {
    Load,
    Scroll { offset: f64 },
    Resize { width: f64, height: f64 },
    KeyDown { code: u32 },
    Click { target: ElementId },
    Input { target: ElementId, value: String },
    Blur { target: ElementId },
    Submit { target: ElementId },
}

/// Named event source a handler subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Load,
    Scroll,
    Resize,
    KeyDown,
    Click,
    Input,
    Blur,
    Submit,
}

impl PageEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            PageEvent::Load => EventKind::Load,
            PageEvent::Scroll { .. } => EventKind::Scroll,
            PageEvent::Resize { .. } => EventKind::Resize,
            PageEvent::KeyDown { .. } => EventKind::KeyDown,
            PageEvent::Click { .. } => EventKind::Click,
            PageEvent::Input { .. } => EventKind::Input,
            PageEvent::Blur { .. } => EventKind::Blur,
            PageEvent::Submit { .. } => EventKind::Submit,
        }
    }
}

/// Event delivered at a fixed point of virtual time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedEvent {
    pub at_ms: u64,
    pub event: PageEvent,
}

/// Reads a JSON array of scripted events and orders it by time. Events at
/// the same instant keep their file order.
pub fn load_script(path: &Path) -> Result<Vec<ScriptedEvent>> {
    let content = std::fs::read_to_string(path)?;
    let mut script: Vec<ScriptedEvent> = serde_json::from_str(&content)?;
    script.sort_by_key(|step| step.at_ms);
    Ok(script)
}

pub type Handler = Box<dyn FnMut(&PageEvent, &mut Timeline)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    kind: EventKind,
    handler: Handler,
}

/// Registry of handlers per event source. Handlers run in subscription
/// order.
#[derive(Default)]
pub struct EventBus {
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&PageEvent, &mut Timeline) + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            kind,
            handler: Box::new(handler),
        });
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|subscription| subscription.id != id);
        before != self.subscriptions.len()
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscriptions
            .iter()
            .filter(|subscription| subscription.kind == kind)
            .count()
    }

    /// Delivers `event` to every subscriber of its kind. Returns how many
    /// handlers ran.
    pub fn emit(&mut self, event: &PageEvent, timeline: &mut Timeline) -> usize {
        let kind = event.kind();
        let mut delivered = 0;
        for subscription in self
            .subscriptions
            .iter_mut()
            .filter(|subscription| subscription.kind == kind)
        {
            (subscription.handler)(event, timeline);
            delivered += 1;
        }
        delivered
    }

    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}
