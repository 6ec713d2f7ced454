//! Mutable half of the runtime.
//!
//! [`Engine`] owns everything a component invocation can change: flow states,
//! the queue, the connection registry, the backend and the globals. The
//! read-only assets and the evaluator stay in [`Runtime`](crate::Runtime) so
//! both halves can be borrowed at once.

use std::collections::BTreeMap;

use rivulet_config::EngineConfig;
use rivulet_connection::{ConnectionRegistry, MqttBackend, ResourceHandle};
use rivulet_flow::{Component, Flow, Value};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, warn};

use crate::debugger::{DebuggerBridge, DebuggerEvent};
use crate::error::{ComponentError, ComponentFailure};
use crate::flow_state::{FlowState, FlowStateArena, FlowStateId, ParentLink};
use crate::queue::{ExecutionQueue, QueueEntry};
use crate::state::{ExecutionState, StateKey};

pub(crate) struct Engine {
  pub config: EngineConfig,
  pub flow_states: FlowStateArena,
  pub queue: ExecutionQueue,
  pub registry: ConnectionRegistry<StateKey>,
  pub backend: Box<dyn MqttBackend>,
  pub debugger: Box<dyn DebuggerBridge>,
  pub globals: BTreeMap<String, Value>,
  pub errors: Vec<ComponentFailure>,
  /// Handed to every `Value::Handle` the runtime creates.
  pub release_sender: UnboundedSender<u64>,
}

impl Engine {
  /// Start an instance of `flow` and queue its start components.
  pub fn create_flow_state(&mut self, flow: &Flow, parent: Option<ParentLink>) -> FlowStateId {
    let id = self.flow_states.insert(FlowState::new(flow, parent));
    for &component_index in flow.start_components() {
      self.queue.push(QueueEntry::new(id, component_index));
    }

    let flow_state_index = self.flow_state_index(id);
    let parent_flow_state_index = parent.and_then(|p| {
      self
        .flow_states
        .get(p.flow_state)
        .map(|fs| fs.flow_state_index())
    });
    debug!(
      flow = %flow.name,
      flow_state_index,
      parent = ?parent_flow_state_index,
      "flow_state_created"
    );
    self.debugger.notify(DebuggerEvent::FlowStateCreated {
      flow_state_index,
      flow: flow.index,
      parent_flow_state_index,
    });
    id
  }

  /// Tear down a flow state: free every execution state (which unbinds its
  /// handlers and destroys called children), purge its queue entries, then
  /// drop its variables.
  pub fn destroy_flow_state(&mut self, id: FlowStateId) {
    let Some(flow_state) = self.flow_states.get(id) else {
      return;
    };
    let flow_state_index = flow_state.flow_state_index();
    let occupied: Vec<usize> = flow_state.occupied_states().collect();

    for component_index in occupied {
      self.free_state(StateKey {
        flow_state: id,
        component_index,
      });
    }
    self.queue.purge(|e| e.flow_state == id);
    self.flow_states.remove(id);

    debug!(flow_state_index, "flow_state_destroyed");
    self
      .debugger
      .notify(DebuggerEvent::FlowStateDestroyed { flow_state_index });
  }

  /// Free one execution state. The handler goes first so no event can
  /// reach a freed slot.
  pub fn free_state(&mut self, key: StateKey) {
    self.registry.remove_handler(key);
    let state = self
      .flow_states
      .get_mut(key.flow_state)
      .and_then(|fs| fs.take_state(key.component_index));
    self
      .queue
      .purge(|e| e.flow_state == key.flow_state && e.component_index == key.component_index);

    if let Some(ExecutionState::CallAction { child }) = state {
      self.destroy_flow_state(child);
    }
  }

  /// Release a backend resource and everything still listening to it.
  pub fn delete_connection(&mut self, handle: ResourceHandle) {
    if self.registry.find_connection(handle).is_none() {
      return;
    }

    let status = self.backend.deinit(handle);
    if !status.is_ok() {
      warn!(%handle, %status, "backend deinit failed");
    }

    for key in self.registry.delete_connection(handle).unwrap_or_default() {
      warn!(%handle, flow_state = %key.flow_state, component_index = key.component_index, "freeing state of deleted connection");
      self.free_state(key);
    }
  }

  /// Store `value` on every input connected to `output` and queue the
  /// targets.
  pub fn propagate(
    &mut self,
    flow_state: FlowStateId,
    component: &Component,
    output: usize,
    value: Value,
  ) {
    let Some(state) = self.flow_states.get_mut(flow_state) else {
      return;
    };
    let flow_state_index = state.flow_state_index();

    for connection in component.connections(output) {
      state.set_input_value(
        connection.target_component,
        connection.target_input,
        value.clone(),
      );
      self.queue.push(QueueEntry {
        trigger_input: Some(connection.target_input),
        ..QueueEntry::new(flow_state, connection.target_component)
      });
    }

    self.debugger.notify(DebuggerEvent::ValuePropagated {
      flow_state_index,
      component_index: component.index,
      output,
      value: value.to_json(),
    });
  }

  /// Record a recoverable failure.
  pub fn fail(&mut self, flow_state: FlowStateId, component: &Component, error: ComponentError) {
    let flow_state_index = self.flow_state_index(flow_state);
    let flow = self
      .flow_states
      .get(flow_state)
      .map(|fs| fs.flow_index())
      .unwrap_or_default();
    let message = error.to_string();

    error!(
      flow_state_index,
      component = %component.describe(),
      error = %message,
      "component_failed"
    );
    self.debugger.notify(DebuggerEvent::ComponentFailed {
      flow_state_index,
      component_index: component.index,
      message,
    });
    self.errors.push(ComponentFailure {
      flow_state_index,
      flow,
      component_index: component.index,
      component: component.describe(),
      error,
    });
  }

  fn flow_state_index(&self, id: FlowStateId) -> usize {
    self
      .flow_states
      .get(id)
      .map(|fs| fs.flow_state_index())
      .unwrap_or_default()
  }
}
