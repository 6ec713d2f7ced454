//! Flow runtime.
//!
//! The [`Runtime`] owns a project's assets and everything that changes while
//! it runs. The host calls [`Runtime::tick`] repeatedly; each tick:
//!
//! 1. Moves backend events from the inbound channel onto the pending-event
//!    queues of the execution states bound to their connection
//! 2. Deletes connections whose last handle value was dropped
//! 3. Runs queued components in FIFO order until the queue is empty (or the
//!    per-tick step limit is hit)
//! 4. Makes continuous (self re-armed) entries runnable for the next tick

use std::collections::BTreeMap;

use rivulet_config::{ComponentType, EngineConfig, ProjectDef};
use rivulet_connection::{
  BackendEvent, ConnectionRegistry, EventInbox, EventSender, MqttBackend, ResourceHandle,
  UnsupportedBackend, event_channel,
};
use rivulet_flow::{Assets, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, error, info, instrument, warn};

use crate::components::{self, event_output, event_value};
use crate::context::{ComponentContext, Effects};
use crate::debugger::{DebuggerBridge, NoopDebugger};
use crate::engine::Engine;
use crate::error::{ComponentError, ComponentFailure, RuntimeError};
use crate::expression::{ExpressionEvaluator, TemplateEvaluator};
use crate::flow_state::{FlowState, FlowStateArena, FlowStateId};
use crate::queue::{ExecutionQueue, QueueEntry};
use crate::state::{PendingEvent, StateKey};

pub struct Runtime {
  assets: Assets,
  evaluator: Box<dyn ExpressionEvaluator>,
  engine: Engine,
  events: EventSender,
  inbox: EventInbox,
  releases: UnboundedReceiver<u64>,
  root: Option<FlowStateId>,
  halted: bool,
}

impl Runtime {
  /// Create a runtime with no backend, the default evaluator and no
  /// debugger. Nothing runs until [`Runtime::start`].
  pub fn new(assets: Assets, config: EngineConfig) -> Self {
    let (events, inbox) = event_channel(config.event_channel_capacity);
    let (release_sender, releases) = mpsc::unbounded_channel();
    let globals = assets
      .global_variables
      .iter()
      .map(|v| (v.name.clone(), v.default.clone()))
      .collect();

    Self {
      assets,
      evaluator: Box::new(TemplateEvaluator::new()),
      engine: Engine {
        config,
        flow_states: FlowStateArena::new(),
        queue: ExecutionQueue::new(),
        registry: ConnectionRegistry::new(),
        backend: Box::new(UnsupportedBackend),
        debugger: Box::new(NoopDebugger),
        globals,
        errors: Vec::new(),
        release_sender,
      },
      events,
      inbox,
      releases,
      root: None,
      halted: false,
    }
  }

  /// Validate a project document and build a runtime for it.
  pub fn from_project(project: &ProjectDef) -> Result<Self, RuntimeError> {
    let assets = Assets::load(project)?;
    Ok(Self::new(assets, project.engine.clone()))
  }

  pub fn with_backend(mut self, backend: impl MqttBackend + 'static) -> Self {
    self.engine.backend = Box::new(backend);
    self
  }

  pub fn with_evaluator(mut self, evaluator: impl ExpressionEvaluator + 'static) -> Self {
    self.evaluator = Box::new(evaluator);
    self
  }

  pub fn with_debugger(mut self, debugger: impl DebuggerBridge + 'static) -> Self {
    self.engine.debugger = Box::new(debugger);
    self
  }

  /// Sender for backend callbacks. Clone it into the backend.
  pub fn event_sender(&self) -> EventSender {
    self.events.clone()
  }

  pub fn assets(&self) -> &Assets {
    &self.assets
  }

  /// Start the main flow (flow 0).
  #[instrument(
    name = "runtime_start",
    skip(self),
    fields(project = %self.assets.name)
  )]
  pub fn start(&mut self) -> Result<(), RuntimeError> {
    if self.halted {
      return Err(RuntimeError::Halted);
    }
    if self.root.is_some() {
      return Err(RuntimeError::AlreadyStarted);
    }
    let Some(main) = self.assets.flow(0) else {
      return Err(RuntimeError::NoFlows);
    };

    let root = self.engine.create_flow_state(main, None);
    self.root = Some(root);
    info!(flow = %main.name, "runtime_started");
    Ok(())
  }

  /// Run one scheduler pass. Returns the number of components dispatched.
  ///
  /// An integrity violation halts the runtime for good.
  pub fn tick(&mut self) -> Result<usize, RuntimeError> {
    if self.halted {
      return Err(RuntimeError::Halted);
    }
    if self.root.is_none() {
      return Err(RuntimeError::NotStarted);
    }

    match self.run_pass() {
      Ok(steps) => Ok(steps),
      Err(e) => {
        self.halted = true;
        error!(error = %e, "runtime_halted");
        Err(e)
      }
    }
  }

  /// Tear down every flow state and release every connection.
  pub fn stop(&mut self) {
    if let Some(root) = self.root.take() {
      self.engine.destroy_flow_state(root);
    }
    let remaining: Vec<FlowStateId> = self.engine.flow_states.iter().map(|fs| fs.id()).collect();
    for id in remaining {
      self.engine.destroy_flow_state(id);
    }

    let handles: Vec<ResourceHandle> = self.engine.registry.handles().collect();
    for handle in handles {
      self.engine.delete_connection(handle);
    }
    while self.releases.try_recv().is_ok() {}
    self.engine.queue.clear();
    info!("runtime_stopped");
  }

  pub fn is_started(&self) -> bool {
    self.root.is_some()
  }

  pub fn is_halted(&self) -> bool {
    self.halted
  }

  /// Look up a live flow state by its stable index.
  pub fn flow_state(&self, flow_state_index: usize) -> Option<&FlowState> {
    self.engine.flow_states.find_by_index(flow_state_index)
  }

  pub fn root_flow_state(&self) -> Option<&FlowState> {
    self.engine.flow_states.get(self.root?)
  }

  pub fn flow_states(&self) -> impl Iterator<Item = &FlowState> + '_ {
    self.engine.flow_states.iter()
  }

  pub fn global_variable(&self, name: &str) -> Option<&Value> {
    self.engine.globals.get(name)
  }

  pub fn global_variables(&self) -> &BTreeMap<String, Value> {
    &self.engine.globals
  }

  /// Replace a global, returning the previous value. Unknown names are
  /// rejected.
  pub fn set_global_variable(&mut self, name: &str, value: Value) -> Option<Value> {
    let slot = self.engine.globals.get_mut(name)?;
    Some(std::mem::replace(slot, value))
  }

  /// Failures recorded so far, oldest first.
  pub fn errors(&self) -> &[ComponentFailure] {
    &self.engine.errors
  }

  pub fn take_errors(&mut self) -> Vec<ComponentFailure> {
    std::mem::take(&mut self.engine.errors)
  }

  pub fn registry(&self) -> &ConnectionRegistry<StateKey> {
    &self.engine.registry
  }

  /// Queue entries waiting, runnable now or deferred.
  pub fn queued(&self) -> usize {
    self.engine.queue.len()
  }

  pub fn is_queued(&self, key: StateKey) -> bool {
    self.engine.queue.contains(key)
  }

  pub fn on_debugger_client_connected(&mut self) {
    self.engine.debugger.on_client_connected();
  }

  pub fn on_debugger_client_disconnected(&mut self) {
    self.engine.debugger.on_client_disconnected();
  }

  pub fn flush_debugger_messages(&mut self) {
    self.engine.debugger.flush_messages();
  }

  fn run_pass(&mut self) -> Result<usize, RuntimeError> {
    self.deliver_backend_events()?;
    self.process_releases();

    let max_steps = self.engine.config.max_steps_per_tick.max(1);
    let mut steps = 0;
    while steps < max_steps {
      let Some(entry) = self.engine.queue.pop() else {
        break;
      };
      steps += 1;
      self.dispatch(entry)?;
    }

    if self.engine.queue.runnable() > 0 {
      warn!(
        steps,
        remaining = self.engine.queue.runnable(),
        "step limit reached, continuing next tick"
      );
    }
    self.engine.queue.promote_deferred();
    Ok(steps)
  }

  fn dispatch(&mut self, entry: QueueEntry) -> Result<(), RuntimeError> {
    let Some(flow_state) = self.engine.flow_states.get(entry.flow_state) else {
      debug!(flow_state = %entry.flow_state, "skipping entry of destroyed flow state");
      return Ok(());
    };
    let flow = self.assets.flow(flow_state.flow_index()).ok_or_else(|| {
      RuntimeError::Integrity(format!("flow state {} runs unknown flow", entry.flow_state))
    })?;
    let component = flow.component(entry.component_index).ok_or_else(|| {
      RuntimeError::Integrity(format!(
        "queued unknown component {} of flow '{}'",
        entry.component_index, flow.name
      ))
    })?;

    debug!(
      flow = %flow.name,
      component = %component.describe(),
      trigger_input = ?entry.trigger_input,
      "dispatch"
    );

    let mut ctx = ComponentContext::new(
      &self.assets,
      self.evaluator.as_ref(),
      &mut self.engine,
      entry.flow_state,
      component,
      entry.trigger_input,
    );
    let result = components::execute(&mut ctx);
    let Effects { outputs, rearm } = ctx.into_effects();

    match result {
      Ok(()) => {
        if !self.engine.flow_states.contains(entry.flow_state) {
          return Ok(());
        }
        for (output, value) in outputs {
          self.engine.propagate(entry.flow_state, component, output, value);
        }
        if let Some(continuous) = rearm {
          let queued = self.engine.queue.push(QueueEntry {
            continuous,
            ..QueueEntry::new(entry.flow_state, entry.component_index)
          });
          if !queued {
            debug!(component = %component.describe(), "already re-armed");
          }
        }
        Ok(())
      }
      Err(ComponentError::Integrity(message)) => Err(RuntimeError::Integrity(message)),
      Err(error) => {
        self.engine.fail(entry.flow_state, component, error);
        Ok(())
      }
    }
  }

  fn deliver_backend_events(&mut self) -> Result<(), RuntimeError> {
    let Engine {
      registry,
      flow_states,
      ..
    } = &mut self.engine;

    while let Some(event) = self.inbox.try_next() {
      let mut violation = None;
      let reached = registry.dispatch_event(&event, |key, event| {
        if let Err(e) = deliver_event(&self.assets, flow_states, key, event) {
          violation.get_or_insert(e);
        }
      });
      if reached.is_none() {
        debug!(handle = %event.handle, kind = ?event.kind, "dropping event for unknown connection");
      }
      if let Some(ComponentError::Integrity(message)) = violation {
        return Err(RuntimeError::Integrity(message));
      }
    }
    Ok(())
  }

  fn process_releases(&mut self) {
    while let Ok(id) = self.releases.try_recv() {
      let handle = ResourceHandle(id);
      debug!(%handle, "last connection value dropped");
      self.engine.delete_connection(handle);
    }
  }
}

/// Queue one backend event on a bound event component.
fn deliver_event(
  assets: &Assets,
  flow_states: &mut FlowStateArena,
  key: StateKey,
  event: &BackendEvent,
) -> Result<(), ComponentError> {
  let flow_state = flow_states.get_mut(key.flow_state).ok_or_else(|| {
    ComponentError::integrity(format!("handler bound to destroyed flow state {}", key.flow_state))
  })?;
  let component = assets
    .flow(flow_state.flow_index())
    .and_then(|f| f.component(key.component_index))
    .ok_or_else(|| ComponentError::integrity(format!("handler bound to unknown component {}", key.component_index)))?;
  let ComponentType::MqttEvent { events } = &component.component_type else {
    return Err(ComponentError::integrity(format!(
      "handler bound to non-event component {}",
      component.describe()
    )));
  };

  let Some(output) = event_output(events, event.kind) else {
    return Ok(());
  };
  let pending = flow_state
    .execution_state_mut(key.component_index)
    .ok_or_else(|| ComponentError::integrity("handler bound to a freed execution state"))?
    .pending_events_mut()?;

  if !pending.push(PendingEvent {
    output,
    value: event_value(&event.data),
  }) {
    warn!(
      component = %component.describe(),
      kind = ?event.kind,
      capacity = pending.capacity(),
      "pending event queue full, dropping event"
    );
  }
  Ok(())
}
