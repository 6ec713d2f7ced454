//! Inbound events from backends.
//!
//! Backends may run their callbacks on another thread, an interrupt-like
//! context or a host runtime bridge. They never touch runtime state directly:
//! each callback becomes a [`BackendEvent`] pushed onto a bounded channel,
//! and the runtime drains it at the start of every tick.

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

use crate::backend::ResourceHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
  Connect,
  Reconnect,
  Close,
  Disconnect,
  Offline,
  Error,
  Message,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventData {
  None,
  Error(String),
  Message { topic: String, payload: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendEvent {
  pub handle: ResourceHandle,
  pub kind: EventKind,
  pub data: EventData,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventDropped {
  /// The runtime has not drained the channel fast enough.
  #[error("event channel full, dropped {kind:?} event for {handle}")]
  Full {
    handle: ResourceHandle,
    kind: EventKind,
  },

  /// The runtime is gone.
  #[error("event channel closed")]
  Closed,
}

/// Create a bounded event channel. A zero capacity is raised to one.
pub fn event_channel(capacity: usize) -> (EventSender, EventInbox) {
  let (sender, receiver) = mpsc::channel(capacity.max(1));
  (EventSender { sender }, EventInbox { receiver })
}

/// Producer side, handed to backends. Never blocks.
#[derive(Debug, Clone)]
pub struct EventSender {
  sender: mpsc::Sender<BackendEvent>,
}

impl EventSender {
  /// Deliver one backend callback to the runtime.
  pub fn dispatch_event(
    &self,
    handle: ResourceHandle,
    kind: EventKind,
    data: EventData,
  ) -> Result<(), EventDropped> {
    self
      .sender
      .try_send(BackendEvent { handle, kind, data })
      .map_err(|e| match e {
        TrySendError::Full(event) => EventDropped::Full {
          handle: event.handle,
          kind: event.kind,
        },
        TrySendError::Closed(_) => EventDropped::Closed,
      })
  }
}

/// Consumer side, owned by the runtime.
#[derive(Debug)]
pub struct EventInbox {
  receiver: mpsc::Receiver<BackendEvent>,
}

impl EventInbox {
  /// Next queued event, if any.
  pub fn try_next(&mut self) -> Option<BackendEvent> {
    match self.receiver.try_recv() {
      Ok(event) => Some(event),
      Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
    }
  }

  /// Take every event queued right now, oldest first.
  pub fn drain(&mut self) -> Vec<BackendEvent> {
    std::iter::from_fn(|| self.try_next()).collect()
  }
}
