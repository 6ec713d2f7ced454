//! Running flow instances.
//!
//! Flow states live in a [`FlowStateArena`] and are referred to by
//! [`FlowStateId`], an index plus a generation. Removing a flow state bumps
//! its slot's generation, so ids held by queue entries or handlers that
//! outlive it simply stop resolving.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use rivulet_flow::{Flow, Value};

use crate::error::ComponentError;
use crate::state::ExecutionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowStateId {
  index: u32,
  generation: u32,
}

impl fmt::Display for FlowStateId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}v{}", self.index, self.generation)
  }
}

/// The component that started a child flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentLink {
  pub flow_state: FlowStateId,
  pub component_index: usize,
}

/// One running instance of a flow.
#[derive(Debug)]
pub struct FlowState {
  id: FlowStateId,
  flow_state_index: usize,
  flow_index: usize,
  parent: Option<ParentLink>,
  states: Vec<Option<ExecutionState>>,
  locals: BTreeMap<String, Value>,
  /// Last value received per (component, input).
  input_values: HashMap<(usize, usize), Value>,
}

impl FlowState {
  pub(crate) fn new(flow: &Flow, parent: Option<ParentLink>) -> Self {
    Self {
      id: FlowStateId {
        index: 0,
        generation: 0,
      },
      flow_state_index: 0,
      flow_index: flow.index,
      parent,
      states: std::iter::repeat_with(|| None)
        .take(flow.components.len())
        .collect(),
      locals: flow
        .local_variables
        .iter()
        .map(|v| (v.name.clone(), v.default.clone()))
        .collect(),
      input_values: HashMap::new(),
    }
  }

  pub fn id(&self) -> FlowStateId {
    self.id
  }

  /// Stable index for external lookup. Never reused.
  pub fn flow_state_index(&self) -> usize {
    self.flow_state_index
  }

  pub fn flow_index(&self) -> usize {
    self.flow_index
  }

  pub fn parent(&self) -> Option<ParentLink> {
    self.parent
  }

  pub fn local(&self, name: &str) -> Option<&Value> {
    self.locals.get(name)
  }

  pub fn locals(&self) -> &BTreeMap<String, Value> {
    &self.locals
  }

  pub(crate) fn has_local(&self, name: &str) -> bool {
    self.locals.contains_key(name)
  }

  /// Replace a local binding, returning the previous value.
  pub(crate) fn set_local(&mut self, name: &str, value: Value) -> Option<Value> {
    self.locals.insert(name.to_string(), value)
  }

  pub fn input_value(&self, component_index: usize, input: usize) -> Option<&Value> {
    self.input_values.get(&(component_index, input))
  }

  pub(crate) fn set_input_value(&mut self, component_index: usize, input: usize, value: Value) {
    self.input_values.insert((component_index, input), value);
  }

  pub fn execution_state(&self, component_index: usize) -> Option<&ExecutionState> {
    self.states.get(component_index)?.as_ref()
  }

  pub(crate) fn execution_state_mut(&mut self, component_index: usize) -> Option<&mut ExecutionState> {
    self.states.get_mut(component_index)?.as_mut()
  }

  /// Component indices with a live execution state.
  pub fn occupied_states(&self) -> impl Iterator<Item = usize> + '_ {
    self
      .states
      .iter()
      .enumerate()
      .filter(|(_, s)| s.is_some())
      .map(|(i, _)| i)
  }

  pub fn live_state_count(&self) -> usize {
    self.states.iter().filter(|s| s.is_some()).count()
  }

  /// Put `state` into an empty slot.
  pub(crate) fn allocate(
    &mut self,
    component_index: usize,
    state: ExecutionState,
  ) -> Result<&mut ExecutionState, ComponentError> {
    let Some(slot) = self.states.get_mut(component_index) else {
      return Err(ComponentError::integrity(format!(
        "component {component_index} out of range in flow state {}",
        self.id
      )));
    };
    if let Some(existing) = slot {
      return Err(ComponentError::integrity(format!(
        "component {component_index} in flow state {} already holds a {} state",
        self.id,
        existing.kind()
      )));
    }
    Ok(slot.insert(state))
  }

  pub(crate) fn take_state(&mut self, component_index: usize) -> Option<ExecutionState> {
    self.states.get_mut(component_index)?.take()
  }
}

#[derive(Debug, Default)]
struct Slot {
  generation: u32,
  flow_state: Option<FlowState>,
}

/// Generation-checked storage for flow states.
#[derive(Debug, Default)]
pub struct FlowStateArena {
  slots: Vec<Slot>,
  free: Vec<u32>,
  next_flow_state_index: usize,
}

impl FlowStateArena {
  pub fn new() -> Self {
    Self::default()
  }

  pub(crate) fn insert(&mut self, mut flow_state: FlowState) -> FlowStateId {
    let index = match self.free.pop() {
      Some(index) => index,
      None => {
        self.slots.push(Slot::default());
        (self.slots.len() - 1) as u32
      }
    };
    let slot = &mut self.slots[index as usize];
    let id = FlowStateId {
      index,
      generation: slot.generation,
    };

    flow_state.id = id;
    flow_state.flow_state_index = self.next_flow_state_index;
    self.next_flow_state_index += 1;
    slot.flow_state = Some(flow_state);
    id
  }

  pub fn get(&self, id: FlowStateId) -> Option<&FlowState> {
    self
      .slots
      .get(id.index as usize)
      .filter(|s| s.generation == id.generation)?
      .flow_state
      .as_ref()
  }

  pub(crate) fn get_mut(&mut self, id: FlowStateId) -> Option<&mut FlowState> {
    self
      .slots
      .get_mut(id.index as usize)
      .filter(|s| s.generation == id.generation)?
      .flow_state
      .as_mut()
  }

  pub fn contains(&self, id: FlowStateId) -> bool {
    self.get(id).is_some()
  }

  pub(crate) fn remove(&mut self, id: FlowStateId) -> Option<FlowState> {
    let slot = self
      .slots
      .get_mut(id.index as usize)
      .filter(|s| s.generation == id.generation)?;
    let flow_state = slot.flow_state.take()?;
    slot.generation = slot.generation.wrapping_add(1);
    self.free.push(id.index);
    Some(flow_state)
  }

  pub fn find_by_index(&self, flow_state_index: usize) -> Option<&FlowState> {
    self.iter().find(|fs| fs.flow_state_index == flow_state_index)
  }

  pub fn iter(&self) -> impl Iterator<Item = &FlowState> + '_ {
    self.slots.iter().filter_map(|s| s.flow_state.as_ref())
  }

  pub fn len(&self) -> usize {
    self.iter().count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}
