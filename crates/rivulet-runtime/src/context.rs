//! The surface a component sees while it executes.
//!
//! Output propagations and self re-arming are buffered here and only
//! committed by the runtime when `execute` returns `Ok`. A failing component
//! therefore never enqueues anything downstream.

use rivulet_config::EngineConfig;
use rivulet_connection::{ConnectionRegistry, MqttBackend};
use rivulet_flow::{Assets, Component, Flow, SEQOUT, Value};
use tokio::sync::mpsc::UnboundedSender;

use crate::components::type_name;
use crate::engine::Engine;
use crate::error::ComponentError;
use crate::expression::{AssignTarget, ExpressionEvaluator, Scope};
use crate::flow_state::{FlowState, FlowStateId, ParentLink};
use crate::state::{ExecutionState, StateKey};

pub struct ComponentContext<'a> {
  assets: &'a Assets,
  evaluator: &'a dyn ExpressionEvaluator,
  engine: &'a mut Engine,
  flow_state: FlowStateId,
  component: &'a Component,
  trigger_input: Option<usize>,
  outputs: Vec<(usize, Value)>,
  rearm: Option<bool>,
}

/// What an invocation asked for, to be applied on success.
pub(crate) struct Effects {
  pub outputs: Vec<(usize, Value)>,
  pub rearm: Option<bool>,
}

impl<'a> ComponentContext<'a> {
  pub(crate) fn new(
    assets: &'a Assets,
    evaluator: &'a dyn ExpressionEvaluator,
    engine: &'a mut Engine,
    flow_state: FlowStateId,
    component: &'a Component,
    trigger_input: Option<usize>,
  ) -> Self {
    Self {
      assets,
      evaluator,
      engine,
      flow_state,
      component,
      trigger_input,
      outputs: Vec::new(),
      rearm: None,
    }
  }

  pub(crate) fn into_effects(self) -> Effects {
    Effects {
      outputs: self.outputs,
      rearm: self.rearm,
    }
  }

  pub fn component(&self) -> &'a Component {
    self.component
  }

  pub fn flow_state_id(&self) -> FlowStateId {
    self.flow_state
  }

  pub fn key(&self) -> StateKey {
    StateKey {
      flow_state: self.flow_state,
      component_index: self.component.index,
    }
  }

  pub fn trigger_input(&self) -> Option<usize> {
    self.trigger_input
  }

  pub fn config(&self) -> &EngineConfig {
    &self.engine.config
  }

  pub fn flow_state(&self) -> Result<&FlowState, ComponentError> {
    self
      .engine
      .flow_states
      .get(self.flow_state)
      .ok_or_else(|| ComponentError::integrity(format!("flow state {} is gone", self.flow_state)))
  }

  fn flow_state_mut(&mut self) -> Result<&mut FlowState, ComponentError> {
    let id = self.flow_state;
    self
      .engine
      .flow_states
      .get_mut(id)
      .ok_or_else(|| ComponentError::integrity(format!("flow state {id} is gone")))
  }

  /// Last value received on one of this component's inputs.
  pub fn input_value(&self, input: usize) -> Option<&Value> {
    self
      .engine
      .flow_states
      .get(self.flow_state)?
      .input_value(self.component.index, input)
  }

  pub fn parent(&self) -> Option<ParentLink> {
    self.flow_state().ok()?.parent()
  }

  fn expression(&self, property: usize, name: &str) -> Result<&'a str, ComponentError> {
    self
      .component
      .properties
      .get(property)
      .map(String::as_str)
      .ok_or_else(|| ComponentError::PropertyEvaluation {
        property: name.to_string(),
        component: type_name(&self.component.component_type),
        reason: format!("property {property} is missing"),
      })
  }

  fn with_scope<T>(
    &self,
    f: impl FnOnce(&Scope<'_>) -> Result<T, String>,
  ) -> Result<Result<T, String>, ComponentError> {
    let flow_state = self.flow_state()?;
    let inputs: Vec<(&str, &Value)> = self
      .component
      .inputs
      .iter()
      .enumerate()
      .filter(|(_, name)| !name.is_empty())
      .filter_map(|(i, name)| {
        flow_state
          .input_value(self.component.index, i)
          .map(|v| (name.as_str(), v))
      })
      .collect();
    let scope = Scope {
      locals: flow_state.locals(),
      inputs: &inputs,
      globals: &self.engine.globals,
    };
    Ok(f(&scope))
  }

  /// Evaluate property `property`; `name` labels it in error messages.
  pub fn eval_property(&self, property: usize, name: &str) -> Result<Value, ComponentError> {
    let expression = self.expression(property, name)?;
    self
      .with_scope(|scope| self.evaluator.eval(expression, scope))?
      .map_err(|reason| ComponentError::PropertyEvaluation {
        property: name.to_string(),
        component: type_name(&self.component.component_type),
        reason,
      })
  }

  /// Resolve an assignable property to the variable it names.
  pub fn eval_assignable_property(
    &self,
    property: usize,
    name: &str,
  ) -> Result<AssignTarget, ComponentError> {
    let expression = self.expression(property, name)?;
    self
      .with_scope(|scope| self.evaluator.resolve_target(expression, scope))?
      .map_err(|reason| ComponentError::PropertyEvaluation {
        property: name.to_string(),
        component: type_name(&self.component.component_type),
        reason,
      })
  }

  pub fn assign(&mut self, target: AssignTarget, value: Value) -> Result<(), ComponentError> {
    match target {
      AssignTarget::Local(name) => {
        self.flow_state_mut()?.set_local(&name, value);
      }
      AssignTarget::Global(name) => {
        self.engine.globals.insert(name, value);
      }
    }
    Ok(())
  }

  pub fn propagate_value(&mut self, output: usize, value: Value) {
    self.outputs.push((output, value));
  }

  pub fn propagate_seqout(&mut self) {
    self.propagate_value(SEQOUT, Value::Null);
  }

  /// Queue this component again. A continuous entry runs on the next tick.
  pub fn add_to_queue(&mut self, continuous: bool) {
    self.rearm = Some(continuous);
  }

  pub fn execution_state(&self) -> Option<&ExecutionState> {
    self
      .engine
      .flow_states
      .get(self.flow_state)?
      .execution_state(self.component.index)
  }

  pub fn execution_state_mut(&mut self) -> Option<&mut ExecutionState> {
    let index = self.component.index;
    self
      .engine
      .flow_states
      .get_mut(self.flow_state)?
      .execution_state_mut(index)
  }

  pub fn allocate_execution_state(
    &mut self,
    state: ExecutionState,
  ) -> Result<&mut ExecutionState, ComponentError> {
    let index = self.component.index;
    self.flow_state_mut()?.allocate(index, state)
  }

  pub fn deallocate_execution_state(&mut self) {
    let key = self.key();
    self.engine.free_state(key);
  }

  pub fn backend_mut(&mut self) -> &mut dyn MqttBackend {
    self.engine.backend.as_mut()
  }

  pub fn registry(&self) -> &ConnectionRegistry<StateKey> {
    &self.engine.registry
  }

  pub fn registry_mut(&mut self) -> &mut ConnectionRegistry<StateKey> {
    &mut self.engine.registry
  }

  /// Channel that hears about dropped resource handles.
  pub fn release_sender(&self) -> UnboundedSender<u64> {
    self.engine.release_sender.clone()
  }

  pub(crate) fn flow(&self, index: usize) -> Result<&'a Flow, ComponentError> {
    self
      .assets
      .flow(index)
      .ok_or_else(|| ComponentError::integrity(format!("unknown flow {index}")))
  }

  /// Start a child instance of `flow_index`, linked back to this component.
  ///
  /// Named inputs of this component that match a local variable of the
  /// child flow seed that variable.
  pub(crate) fn start_child_flow(&mut self, flow_index: usize) -> Result<FlowStateId, ComponentError> {
    let flow = self.flow(flow_index)?;
    let seeds: Vec<(String, Value)> = {
      let flow_state = self.flow_state()?;
      self
        .component
        .inputs
        .iter()
        .enumerate()
        .filter_map(|(i, name)| {
          flow_state
            .input_value(self.component.index, i)
            .map(|v| (name.clone(), v.clone()))
        })
        .collect()
    };

    let parent = ParentLink {
      flow_state: self.flow_state,
      component_index: self.component.index,
    };
    let child = self.engine.create_flow_state(flow, Some(parent));
    if let Some(child_state) = self.engine.flow_states.get_mut(child) {
      for (name, value) in seeds {
        if child_state.has_local(&name) {
          child_state.set_local(&name, value);
        }
      }
    }
    Ok(child)
  }

  /// Finish this (child) flow state: destroy it, free the caller's state and
  /// resume the caller with `value` on output 1 and its Seqout.
  pub(crate) fn finish_child_flow(&mut self, parent: ParentLink, value: Value) -> Result<(), ComponentError> {
    let child = self.flow_state;
    let caller_state = self
      .engine
      .flow_states
      .get(parent.flow_state)
      .ok_or_else(|| ComponentError::integrity(format!("caller flow state {} is gone", parent.flow_state)))?;
    let caller_flow = self.flow(caller_state.flow_index())?;
    let caller = caller_flow
      .component(parent.component_index)
      .ok_or_else(|| ComponentError::integrity(format!("unknown caller component {}", parent.component_index)))?;

    let recorded = caller_state
      .execution_state(parent.component_index)
      .ok_or_else(|| ComponentError::integrity("caller has no CallAction state"))?
      .child()?;
    if recorded != child {
      return Err(ComponentError::integrity(format!(
        "caller is waiting for flow state {recorded}, not {child}"
      )));
    }

    self.engine.free_state(StateKey {
      flow_state: parent.flow_state,
      component_index: parent.component_index,
    });
    self.engine.propagate(parent.flow_state, caller, 1, value);
    self.engine.propagate(parent.flow_state, caller, SEQOUT, Value::Null);
    Ok(())
  }
}
