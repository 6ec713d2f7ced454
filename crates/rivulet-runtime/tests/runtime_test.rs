//! Scheduler behavior: start, ticks, variables, failures and the debugger.

mod common;

use common::{Harness, single_flow};
use rivulet_connection::{EventData, EventKind};
use rivulet_flow::{FlowError, Value};
use rivulet_runtime::{ComponentError, DebuggerEvent, Runtime, RuntimeError};
use serde_json::json;

fn log_chain(length: usize) -> serde_json::Value {
  let mut components = vec![json!({ "type": "start", "outputs": [[{ "component": 1 }]] })];
  for i in 1..=length {
    let outputs = if i < length {
      json!([[{ "component": i + 1 }]])
    } else {
      json!([])
    };
    components.push(json!({ "type": "log", "properties": [format!("'step {i}'")], "outputs": outputs }));
  }
  serde_json::Value::Array(components)
}

#[test]
fn test_tick_before_start() {
  let mut runtime = Runtime::from_project(&single_flow(log_chain(1), json!([]))).unwrap();
  assert!(matches!(runtime.tick(), Err(RuntimeError::NotStarted)));
}

#[test]
fn test_start_twice() {
  let mut runtime = Runtime::from_project(&single_flow(log_chain(1), json!([]))).unwrap();
  runtime.start().unwrap();

  assert!(matches!(runtime.start(), Err(RuntimeError::AlreadyStarted)));
  assert_eq!(runtime.flow_states().count(), 1);
}

#[test]
fn test_invalid_project_is_rejected() {
  let project = single_flow(
    json!([{ "type": "start", "outputs": [[{ "component": 9 }]] }]),
    json!([]),
  );
  assert!(matches!(
    Runtime::from_project(&project),
    Err(RuntimeError::Flow(FlowError::InvalidConnection { target: 9, .. }))
  ));
}

#[test]
fn test_set_variable_evaluates_expressions() {
  let project = single_flow(
    json!([
      { "type": "start", "outputs": [[{ "component": 1 }]] },
      { "type": "set_variable", "properties": ["count", "count + 1"], "outputs": [[{ "component": 2 }]] },
      { "type": "set_variable", "properties": ["label", "'count is ' ~ count"] }
    ]),
    json!([
      { "name": "count", "default": 41 },
      { "name": "label", "default": "" }
    ]),
  );
  let mut h = Harness::started(&project);

  assert_eq!(h.tick(), 3);
  assert_eq!(h.runtime.global_variable("count"), Some(&Value::Int32(42)));
  assert_eq!(h.runtime.global_variable("label"), Some(&Value::from("count is 42")));
}

#[test]
fn test_local_variables_shadow_globals() {
  let project = common::project(json!({
    "name": "locals",
    "global_variables": [{ "name": "greeting", "default": "global" }],
    "flows": [{
      "name": "main",
      "local_variables": [{ "name": "greeting", "default": "hi" }],
      "components": [
        { "type": "start", "outputs": [[{ "component": 1 }]] },
        { "type": "set_variable", "properties": ["greeting", "greeting ~ '!'"] }
      ]
    }]
  }));
  let mut h = Harness::started(&project);
  h.tick();

  let root = h.runtime.root_flow_state().unwrap();
  assert_eq!(root.local("greeting"), Some(&Value::from("hi!")));
  assert_eq!(h.runtime.global_variable("greeting"), Some(&Value::from("global")));
}

#[test]
fn test_stateless_components_keep_no_state() {
  let project = single_flow(
    json!([
      { "type": "start", "outputs": [[{ "component": 1 }]] },
      { "type": "log", "properties": ["'hello'"], "outputs": [[{ "component": 2 }]] },
      { "type": "set_variable", "properties": ["x", "1"] }
    ]),
    json!([{ "name": "x", "default": 0 }]),
  );
  let mut h = Harness::started(&project);
  assert_eq!(h.tick(), 3);

  let seqouts: Vec<usize> = h
    .drain_debugger()
    .into_iter()
    .filter_map(|e| match e {
      DebuggerEvent::ValuePropagated {
        component_index,
        output: 0,
        ..
      } => Some(component_index),
      _ => None,
    })
    .collect();
  assert_eq!(seqouts, vec![0, 1, 2]);
  assert_eq!(h.runtime.root_flow_state().unwrap().live_state_count(), 0);
  assert_eq!(h.runtime.queued(), 0);
  assert_eq!(h.tick(), 0);
}

#[test]
fn test_step_limit_spreads_work_over_ticks() {
  let project = common::project(json!({
    "name": "limited",
    "engine": { "max_steps_per_tick": 2 },
    "flows": [{ "name": "main", "components": log_chain(4) }]
  }));
  let mut h = Harness::started(&project);

  let steps: Vec<usize> = (0..4).map(|_| h.tick()).collect();
  assert_eq!(steps, vec![2, 2, 1, 0]);
}

#[test]
fn test_failure_suppresses_only_its_branch() {
  let project = single_flow(
    json!([
      { "type": "start", "outputs": [[{ "component": 1 }, { "component": 3 }]] },
      { "type": "log", "properties": ["missing"], "outputs": [[{ "component": 2 }]] },
      { "type": "set_variable", "properties": ["reached", "true"] },
      { "type": "set_variable", "properties": ["sibling", "true"] }
    ]),
    json!([
      { "name": "reached", "default": false },
      { "name": "sibling", "default": false }
    ]),
  );
  let mut h = Harness::started(&project);
  h.tick();

  assert_eq!(h.runtime.global_variable("reached"), Some(&Value::Boolean(false)));
  assert_eq!(h.runtime.global_variable("sibling"), Some(&Value::Boolean(true)));

  let errors = h.runtime.take_errors();
  assert_eq!(errors.len(), 1);
  assert_eq!(errors[0].component_index, 1);
  assert!(matches!(
    &errors[0].error,
    ComponentError::PropertyEvaluation { property, component: "Log", .. } if property == "Value"
  ));
  assert!(h.runtime.errors().is_empty());
  assert!(!h.runtime.is_halted());
}

#[test]
fn test_assignment_needs_a_known_variable() {
  let project = single_flow(
    json!([
      { "type": "start", "outputs": [[{ "component": 1 }]] },
      { "type": "set_variable", "properties": ["nowhere", "1"] }
    ]),
    json!([]),
  );
  let mut h = Harness::started(&project);
  h.tick();

  assert!(matches!(
    h.runtime.errors()[0].error,
    ComponentError::PropertyEvaluation { component: "SetVariable", .. }
  ));
}

#[test]
fn test_call_action_rejects_reentry() {
  let project = common::project(json!({
    "name": "reentry",
    "flows": [
      {
        "name": "main",
        "components": [
          { "type": "start", "outputs": [[{ "component": 1 }, { "component": 1 }]] },
          { "type": "call_action", "flow": 1 }
        ]
      },
      {
        "name": "never_ends",
        "components": [{ "type": "start" }]
      }
    ]
  }));
  let mut h = Harness::started(&project);
  h.tick();

  assert_eq!(h.runtime.flow_states().count(), 2);
  assert_eq!(h.runtime.errors().len(), 1);
  assert!(matches!(
    h.runtime.errors()[0].error,
    ComponentError::AlreadyRunning { .. }
  ));

  let child = h.runtime.flow_state(1).unwrap();
  assert_eq!(child.flow_index(), 1);
  assert_eq!(child.parent().map(|p| p.component_index), Some(1));
}

#[test]
fn test_call_action_seeds_child_locals() {
  let project = common::project(json!({
    "name": "seeding",
    "global_variables": [
      { "name": "conn", "default": null },
      { "name": "greeting", "default": null }
    ],
    "flows": [
      {
        "name": "main",
        "components": [
          { "type": "start", "outputs": [[{ "component": 1 }]] },
          {
            "type": "mqtt_init",
            "properties": ["conn", "'mqtt'", "'broker.local'", "1883", "", ""],
            "outputs": [[{ "component": 2 }]]
          },
          {
            "type": "mqtt_event",
            "events": { "message": 1 },
            "properties": ["conn"],
            "outputs": [[], [{ "component": 3, "input": 1 }]]
          },
          { "type": "call_action", "flow": 1, "inputs": ["", "msg"] }
        ]
      },
      {
        "name": "greet",
        "local_variables": [{ "name": "msg", "default": null }],
        "components": [
          { "type": "start", "outputs": [[{ "component": 1 }]] },
          { "type": "set_variable", "properties": ["greeting", "'hello ' ~ msg.payload"], "outputs": [[{ "component": 2 }]] },
          { "type": "end" }
        ]
      }
    ]
  }));
  let mut h = Harness::started(&project);
  h.tick();
  let handle = h.connection_handle("conn");

  h.events
    .dispatch_event(
      handle,
      EventKind::Message,
      EventData::Message {
        topic: "names".to_string(),
        payload: "ada".to_string(),
      },
    )
    .unwrap();
  h.tick();

  assert_eq!(h.runtime.global_variable("greeting"), Some(&Value::from("hello ada")));
  assert_eq!(h.runtime.flow_states().count(), 1);
  assert!(h.runtime.errors().is_empty());
}

#[test]
fn test_disconnected_debugger_gets_nothing() {
  let mut h = Harness::new(&single_flow(log_chain(2), json!([])));
  h.runtime.on_debugger_client_disconnected();
  h.runtime.start().unwrap();
  h.tick();
  assert!(h.drain_debugger().is_empty());

  h.runtime.on_debugger_client_connected();
  h.tick();
  assert!(h.drain_debugger().is_empty());
}

#[test]
fn test_debugger_sees_flow_state_lifecycle() {
  let mut h = Harness::started(&single_flow(log_chain(1), json!([])));
  h.tick();

  let events = h.drain_debugger();
  assert_eq!(
    events.first(),
    Some(&DebuggerEvent::FlowStateCreated {
      flow_state_index: 0,
      flow: 0,
      parent_flow_state_index: None,
    })
  );
  assert_eq!(
    events
      .iter()
      .filter(|e| matches!(e, DebuggerEvent::ValuePropagated { .. }))
      .count(),
    2
  );
}
