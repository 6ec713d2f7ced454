//! Per-component execution state.
//!
//! A component that needs to remember something between invocations owns at
//! most one [`ExecutionState`] in its flow state's table. The variant is
//! fixed by the component type; reading it as any other variant is an
//! integrity violation.

use std::collections::VecDeque;

use rivulet_flow::Value;

use crate::error::ComponentError;
use crate::flow_state::FlowStateId;

/// Address of one execution-state slot: a flow state and a component in it.
///
/// This is also the handler key stored in the connection registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateKey {
  pub flow_state: FlowStateId,
  pub component_index: usize,
}

#[derive(Debug)]
pub enum ExecutionState {
  /// An armed event component and the events it has not delivered yet.
  MqttEvent { pending: PendingEvents },
  /// A call action waiting for its child flow to reach `End`.
  CallAction { child: FlowStateId },
}

impl ExecutionState {
  pub fn mqtt_event(capacity: usize) -> Self {
    ExecutionState::MqttEvent {
      pending: PendingEvents::with_capacity(capacity),
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      ExecutionState::MqttEvent { .. } => "MqttEvent",
      ExecutionState::CallAction { .. } => "CallAction",
    }
  }

  pub fn pending_events_mut(&mut self) -> Result<&mut PendingEvents, ComponentError> {
    match self {
      ExecutionState::MqttEvent { pending } => Ok(pending),
      other => Err(ComponentError::integrity(format!(
        "expected MqttEvent state, found {}",
        other.kind()
      ))),
    }
  }

  pub fn pending_events(&self) -> Option<&PendingEvents> {
    match self {
      ExecutionState::MqttEvent { pending } => Some(pending),
      _ => None,
    }
  }

  pub fn child(&self) -> Result<FlowStateId, ComponentError> {
    match self {
      ExecutionState::CallAction { child } => Ok(*child),
      other => Err(ComponentError::integrity(format!(
        "expected CallAction state, found {}",
        other.kind()
      ))),
    }
  }
}

/// An event waiting to leave a component on `output`.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
  pub output: usize,
  pub value: Value,
}

/// Bounded FIFO of pending events.
#[derive(Debug)]
pub struct PendingEvents {
  events: VecDeque<PendingEvent>,
  capacity: usize,
}

impl PendingEvents {
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      events: VecDeque::new(),
      capacity: capacity.max(1),
    }
  }

  /// Append an event. Returns `false` and drops it when the queue is full.
  pub fn push(&mut self, event: PendingEvent) -> bool {
    if self.events.len() >= self.capacity {
      return false;
    }
    self.events.push_back(event);
    true
  }

  /// Oldest event, removed.
  pub fn pop(&mut self) -> Option<PendingEvent> {
    self.events.pop_front()
  }

  pub fn len(&self) -> usize {
    self.events.len()
  }

  pub fn is_empty(&self) -> bool {
    self.events.is_empty()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }
}
