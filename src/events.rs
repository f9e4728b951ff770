//! Fire-and-forget UI notification channel.
//!
//! A bounded, one-way event bus with at-most-once, no-ack semantics: the
//! executor publishes and never blocks or waits for the UI. If no subscriber
//! is attached, or the queue is full, the event is dropped. Do not upgrade
//! this to a synchronous call; the executor must never block on UI readiness.

use std::collections::BTreeMap;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// The fixed set of event kinds the core emits toward the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UiEventKind {
    /// Request navigation to a section.
    NavigationRequest,
    /// Toggle a named panel.
    PanelToggle,
    /// A mood was logged; the UI may animate.
    MoodLogged,
    /// A deep-work session state change the UI should reflect.
    SessionChanged,
}

/// A named event with a flat key-value payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiEvent {
    pub kind: UiEventKind,
    pub payload: BTreeMap<String, String>,
}

impl UiEvent {
    pub fn new(kind: UiEventKind) -> Self {
        Self {
            kind,
            payload: BTreeMap::new(),
        }
    }

    /// Builder: add a payload entry.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }
}

/// Default queue capacity. Small on purpose: a stale navigation event is
/// worthless, so dropping under pressure beats queueing.
const DEFAULT_CAPACITY: usize = 32;

/// One-way publisher the executor holds.
pub struct UiEventBus {
    sender: Mutex<Option<SyncSender<UiEvent>>>,
}

impl UiEventBus {
    /// A bus with no subscriber; every publish is a silent drop.
    pub fn disconnected() -> Self {
        Self {
            sender: Mutex::new(None),
        }
    }

    /// Create a connected bus and its receiving end.
    pub fn channel() -> (Self, Receiver<UiEvent>) {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a connected bus with an explicit queue bound.
    pub fn with_capacity(capacity: usize) -> (Self, Receiver<UiEvent>) {
        let (tx, rx) = sync_channel(capacity);
        (
            Self {
                sender: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    /// Publish an event. Never blocks; returns whether the event was queued.
    ///
    /// A `false` return is not an error: the UI being slow or absent must not
    /// affect command execution.
    pub fn publish(&self, event: UiEvent) -> bool {
        let guard = self.sender.lock().expect("event bus lock poisoned");
        match guard.as_ref() {
            None => false,
            Some(tx) => match tx.try_send(event) {
                Ok(()) => true,
                Err(TrySendError::Full(ev)) => {
                    tracing::debug!(kind = ?ev.kind, "ui event queue full, dropping");
                    false
                }
                Err(TrySendError::Disconnected(_)) => false,
            },
        }
    }
}

impl std::fmt::Debug for UiEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let connected = self
            .sender
            .lock()
            .map(|g| g.is_some())
            .unwrap_or(false);
        f.debug_struct("UiEventBus").field("connected", &connected).finish()
    }
}
