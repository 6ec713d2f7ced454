//! Shared fixtures for runtime integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use rivulet_config::ProjectDef;
use rivulet_connection::{EventSender, MqttBackend, MqttConfig, ResourceHandle, Status};
use rivulet_runtime::{ChannelDebugger, DebuggerEvent, Runtime};
use tokio::sync::mpsc::{self, UnboundedReceiver};

pub fn project(value: serde_json::Value) -> ProjectDef {
  serde_json::from_value(value).expect("invalid project fixture")
}

/// Project with a single main flow.
pub fn single_flow(components: serde_json::Value, globals: serde_json::Value) -> ProjectDef {
  project(serde_json::json!({
    "name": "test",
    "global_variables": globals,
    "flows": [{ "name": "main", "components": components }]
  }))
}

/// Backend that records every call and answers with scripted statuses.
#[derive(Clone, Default)]
pub struct RecordingBackend {
  pub calls: Rc<RefCell<Vec<String>>>,
  pub configs: Rc<RefCell<Vec<MqttConfig>>>,
  failures: Rc<RefCell<HashMap<&'static str, Status>>>,
  next_id: Rc<RefCell<u64>>,
}

impl RecordingBackend {
  pub fn new() -> Self {
    Self {
      next_id: Rc::new(RefCell::new(1)),
      ..Default::default()
    }
  }

  /// Make `operation` answer with `status` from now on.
  pub fn fail(&self, operation: &'static str, status: Status) {
    self.failures.borrow_mut().insert(operation, status);
  }

  pub fn calls(&self) -> Vec<String> {
    self.calls.borrow().clone()
  }

  pub fn called(&self, operation: &str) -> usize {
    self
      .calls
      .borrow()
      .iter()
      .filter(|c| c.starts_with(operation))
      .count()
  }

  fn record(&self, operation: &'static str, detail: String) -> Status {
    self.calls.borrow_mut().push(format!("{operation} {detail}"));
    self
      .failures
      .borrow()
      .get(operation)
      .copied()
      .unwrap_or(Status::Ok)
  }
}

impl MqttBackend for RecordingBackend {
  fn init(&mut self, config: &MqttConfig) -> Result<ResourceHandle, Status> {
    self.configs.borrow_mut().push(config.clone());
    let status = self.record("init", format!("{}://{}:{}", config.protocol, config.host, config.port));
    if !status.is_ok() {
      return Err(status);
    }
    let mut next_id = self.next_id.borrow_mut();
    let handle = ResourceHandle(*next_id);
    *next_id += 1;
    Ok(handle)
  }

  fn deinit(&mut self, handle: ResourceHandle) -> Status {
    self.record("deinit", handle.to_string())
  }

  fn connect(&mut self, handle: ResourceHandle) -> Status {
    self.record("connect", handle.to_string())
  }

  fn disconnect(&mut self, handle: ResourceHandle) -> Status {
    self.record("disconnect", handle.to_string())
  }

  fn subscribe(&mut self, handle: ResourceHandle, topic: &str) -> Status {
    self.record("subscribe", format!("{handle} {topic}"))
  }

  fn unsubscribe(&mut self, handle: ResourceHandle, topic: &str) -> Status {
    self.record("unsubscribe", format!("{handle} {topic}"))
  }

  fn publish(&mut self, handle: ResourceHandle, topic: &str, payload: &str) -> Status {
    self.record("publish", format!("{handle} {topic} {payload}"))
  }
}

/// Runtime wired to a recording backend and a connected channel debugger.
pub struct Harness {
  pub runtime: Runtime,
  pub backend: RecordingBackend,
  pub events: EventSender,
  debugger: UnboundedReceiver<DebuggerEvent>,
}

impl Harness {
  pub fn new(project: &ProjectDef) -> Self {
    let backend = RecordingBackend::new();
    let (tx, debugger) = mpsc::unbounded_channel();

    let runtime = Runtime::from_project(project).expect("project should load");
    let events = runtime.event_sender();
    let mut runtime = runtime
      .with_backend(backend.clone())
      .with_debugger(ChannelDebugger::new(tx));
    runtime.on_debugger_client_connected();

    Self {
      runtime,
      backend,
      events,
      debugger,
    }
  }

  pub fn started(project: &ProjectDef) -> Self {
    let mut harness = Self::new(project);
    harness.runtime.start().expect("start should succeed");
    harness
  }

  pub fn tick(&mut self) -> usize {
    self.runtime.tick().expect("tick should succeed")
  }

  /// Debugger events produced since the last call.
  pub fn drain_debugger(&mut self) -> Vec<DebuggerEvent> {
    self.runtime.flush_debugger_messages();
    std::iter::from_fn(|| self.debugger.try_recv().ok()).collect()
  }

  /// `(output, value)` pairs propagated by `component_index` since the last
  /// drain.
  pub fn propagated_by(&mut self, component_index: usize) -> Vec<(usize, serde_json::Value)> {
    self
      .drain_debugger()
      .into_iter()
      .filter_map(|event| match event {
        DebuggerEvent::ValuePropagated {
          component_index: c,
          output,
          value,
          ..
        } if c == component_index => Some((output, value)),
        _ => None,
      })
      .collect()
  }

  pub fn error_messages(&self) -> Vec<String> {
    self
      .runtime
      .errors()
      .iter()
      .map(|f| f.error.to_string())
      .collect()
  }

  /// Backend handle stored in the `id` field of a connection global.
  pub fn connection_handle(&self, global: &str) -> ResourceHandle {
    let id = self
      .runtime
      .global_variable(global)
      .and_then(|v| v.field_path(&["id"]))
      .and_then(|v| v.as_handle())
      .map(|h| h.id())
      .expect("global should hold a connection");
    ResourceHandle(id)
  }
}
