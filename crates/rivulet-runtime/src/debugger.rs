//! Debugger bridge.
//!
//! The runtime reports what happens during execution to a [`DebuggerBridge`].
//! It never waits on the bridge and never sees its failures; the wire
//! protocol to an actual debugger client lives behind the trait.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events reported to an attached debugger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DebuggerEvent {
  /// A flow instance has started.
  FlowStateCreated {
    flow_state_index: usize,
    flow: usize,
    parent_flow_state_index: Option<usize>,
  },

  /// A flow instance has been torn down.
  FlowStateDestroyed { flow_state_index: usize },

  /// A value left a component output.
  ValuePropagated {
    flow_state_index: usize,
    component_index: usize,
    output: usize,
    value: serde_json::Value,
  },

  /// A component invocation failed.
  ComponentFailed {
    flow_state_index: usize,
    component_index: usize,
    message: String,
  },
}

pub trait DebuggerBridge {
  fn on_client_connected(&mut self);

  fn on_client_disconnected(&mut self);

  /// Push buffered events out to the client.
  fn flush_messages(&mut self);

  fn notify(&mut self, event: DebuggerEvent);
}

/// Discards everything.
#[derive(Debug, Clone, Default)]
pub struct NoopDebugger;

impl DebuggerBridge for NoopDebugger {
  fn on_client_connected(&mut self) {}

  fn on_client_disconnected(&mut self) {}

  fn flush_messages(&mut self) {}

  fn notify(&mut self, _event: DebuggerEvent) {
    // Intentionally empty
  }
}

/// Buffers events while a client is connected and sends them to an
/// unbounded channel on flush.
#[derive(Debug)]
pub struct ChannelDebugger {
  sender: mpsc::UnboundedSender<DebuggerEvent>,
  buffer: Vec<DebuggerEvent>,
  connected: bool,
}

impl ChannelDebugger {
  pub fn new(sender: mpsc::UnboundedSender<DebuggerEvent>) -> Self {
    Self {
      sender,
      buffer: Vec::new(),
      connected: false,
    }
  }

  pub fn is_connected(&self) -> bool {
    self.connected
  }
}

impl DebuggerBridge for ChannelDebugger {
  fn on_client_connected(&mut self) {
    self.connected = true;
  }

  fn on_client_disconnected(&mut self) {
    self.connected = false;
    self.buffer.clear();
  }

  fn flush_messages(&mut self) {
    for event in self.buffer.drain(..) {
      // Ignore send errors - receiver may have been dropped
      let _ = self.sender.send(event);
    }
  }

  fn notify(&mut self, event: DebuggerEvent) {
    if self.connected {
      self.buffer.push(event);
    }
  }
}
