//! Execution queue.
//!
//! Entries run in FIFO order within a tick. Continuous entries (a component
//! re-arming itself to keep polling) are held back until the current pass is
//! over, so a polling component runs at most once per tick. A component has
//! at most one continuous entry queued; re-arming it again is a no-op.

use std::collections::VecDeque;

use crate::flow_state::FlowStateId;
use crate::state::StateKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry {
  pub flow_state: FlowStateId,
  pub component_index: usize,
  /// Input the triggering value arrived on, if any.
  pub trigger_input: Option<usize>,
  pub continuous: bool,
}

impl QueueEntry {
  pub fn new(flow_state: FlowStateId, component_index: usize) -> Self {
    Self {
      flow_state,
      component_index,
      trigger_input: None,
      continuous: false,
    }
  }

  pub fn key(&self) -> StateKey {
    StateKey {
      flow_state: self.flow_state,
      component_index: self.component_index,
    }
  }
}

#[derive(Debug, Default)]
pub struct ExecutionQueue {
  current: VecDeque<QueueEntry>,
  deferred: Vec<QueueEntry>,
}

impl ExecutionQueue {
  pub fn new() -> Self {
    Self::default()
  }

  /// Queue `entry`. Returns false when a continuous entry for the same
  /// component is already waiting.
  pub fn push(&mut self, entry: QueueEntry) -> bool {
    if entry.continuous {
      if self.has_continuous(entry.key()) {
        return false;
      }
      self.deferred.push(entry);
    } else {
      self.current.push_back(entry);
    }
    true
  }

  pub fn pop(&mut self) -> Option<QueueEntry> {
    self.current.pop_front()
  }

  /// Make deferred entries runnable. Called once a pass is over.
  pub fn promote_deferred(&mut self) {
    self.current.extend(self.deferred.drain(..));
  }

  /// Drop every entry matching `remove`, runnable or deferred.
  pub fn purge(&mut self, mut remove: impl FnMut(&QueueEntry) -> bool) {
    self.current.retain(|e| !remove(e));
    self.deferred.retain(|e| !remove(e));
  }

  pub fn contains(&self, key: StateKey) -> bool {
    self
      .current
      .iter()
      .chain(self.deferred.iter())
      .any(|e| e.key() == key)
  }

  fn has_continuous(&self, key: StateKey) -> bool {
    self
      .current
      .iter()
      .chain(self.deferred.iter())
      .any(|e| e.continuous && e.key() == key)
  }

  pub fn clear(&mut self) {
    self.current.clear();
    self.deferred.clear();
  }

  /// Entries runnable in the current pass.
  pub fn runnable(&self) -> usize {
    self.current.len()
  }

  pub fn len(&self) -> usize {
    self.current.len() + self.deferred.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
