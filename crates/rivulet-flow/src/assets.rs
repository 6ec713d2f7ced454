use std::collections::HashSet;

use rivulet_config::{ComponentDef, ComponentType, FlowDef, ProjectDef, VariableDef};

use crate::error::FlowError;
use crate::value::Value;

/// Index of the sequence output on every component.
pub const SEQOUT: usize = 0;

/// All flows of a loaded project. Read-only for the runtime's lifetime.
#[derive(Debug, Clone)]
pub struct Assets {
  pub name: String,
  pub flows: Vec<Flow>,
  pub global_variables: Vec<Variable>,
}

#[derive(Debug, Clone)]
pub struct Flow {
  pub index: usize,
  pub name: String,
  pub components: Vec<Component>,
  pub local_variables: Vec<Variable>,
  /// Components of type `Start`, fired when an instance of this flow begins.
  start_components: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Component {
  pub index: usize,
  pub component_type: ComponentType,
  pub properties: Vec<String>,
  pub inputs: Vec<String>,
  pub outputs: Vec<Vec<Connection>>,
  pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
  pub target_component: usize,
  pub target_input: usize,
}

#[derive(Debug, Clone)]
pub struct Variable {
  pub name: String,
  pub default: Value,
}

impl Assets {
  /// Validate a project and build its runtime assets.
  pub fn load(project: &ProjectDef) -> Result<Self, FlowError> {
    if project.flows.is_empty() {
      return Err(FlowError::NoFlows);
    }

    let flows = project
      .flows
      .iter()
      .enumerate()
      .map(|(index, def)| Flow::load(index, def, project.flows.len()))
      .collect::<Result<Vec<_>, _>>()?;

    Ok(Self {
      name: project.name.clone(),
      flows,
      global_variables: load_variables(&project.global_variables)?,
    })
  }

  pub fn flow(&self, index: usize) -> Option<&Flow> {
    self.flows.get(index)
  }
}

impl Flow {
  fn load(index: usize, def: &FlowDef, flow_count: usize) -> Result<Self, FlowError> {
    let count = def.components.len();
    let mut components = Vec::with_capacity(count);

    for (component_index, component) in def.components.iter().enumerate() {
      validate_component(def, component_index, component, flow_count)?;
      components.push(Component {
        index: component_index,
        component_type: component.component_type.clone(),
        properties: component.properties.clone(),
        inputs: component.inputs.clone(),
        outputs: component
          .outputs
          .iter()
          .map(|connections| {
            connections
              .iter()
              .map(|c| Connection {
                target_component: c.component,
                target_input: c.input,
              })
              .collect()
          })
          .collect(),
        label: component.label.clone(),
      });
    }

    let start_components = components
      .iter()
      .filter(|c| matches!(c.component_type, ComponentType::Start))
      .map(|c| c.index)
      .collect();

    Ok(Self {
      index,
      name: def.name.clone(),
      components,
      local_variables: load_variables(&def.local_variables)?,
      start_components,
    })
  }

  pub fn component(&self, index: usize) -> Option<&Component> {
    self.components.get(index)
  }

  pub fn start_components(&self) -> &[usize] {
    &self.start_components
  }
}

impl Component {
  /// Connections of one output; empty for unknown or unwired outputs.
  pub fn connections(&self, output: usize) -> &[Connection] {
    self.outputs.get(output).map(|v| v.as_slice()).unwrap_or(&[])
  }

  /// Human readable name for logs: the label if set, else the type.
  pub fn describe(&self) -> String {
    match &self.label {
      Some(label) => label.clone(),
      None => format!("{:?}#{}", self.component_type, self.index),
    }
  }
}

/// Number of properties each component type reads.
fn required_properties(component_type: &ComponentType) -> usize {
  match component_type {
    ComponentType::Start | ComponentType::End | ComponentType::CallAction { .. } => 0,
    ComponentType::Log => 1,
    ComponentType::SetVariable => 2,
    ComponentType::MqttInit => 6,
    ComponentType::MqttConnect | ComponentType::MqttDisconnect => 1,
    ComponentType::MqttSubscribe | ComponentType::MqttUnsubscribe => 2,
    ComponentType::MqttPublish => 3,
    ComponentType::MqttEvent { .. } => 1,
  }
}

fn validate_component(
  flow: &FlowDef,
  index: usize,
  component: &ComponentDef,
  flow_count: usize,
) -> Result<(), FlowError> {
  let expected = required_properties(&component.component_type);
  if component.properties.len() < expected {
    return Err(FlowError::MissingProperties {
      flow: flow.name.clone(),
      component: index,
      expected,
      found: component.properties.len(),
    });
  }

  for (output, connections) in component.outputs.iter().enumerate() {
    for connection in connections {
      let Some(target) = flow.components.get(connection.component) else {
        return Err(FlowError::InvalidConnection {
          flow: flow.name.clone(),
          component: index,
          output,
          target: connection.component,
        });
      };

      // Input 0 (sequence input) always exists, named or not
      if connection.input >= target.inputs.len().max(1) {
        return Err(FlowError::InvalidInput {
          flow: flow.name.clone(),
          component: index,
          output,
          target: connection.component,
          input: connection.input,
        });
      }
    }
  }

  match &component.component_type {
    ComponentType::CallAction { flow: target } if *target >= flow_count => {
      Err(FlowError::UnknownFlow {
        flow: flow.name.clone(),
        component: index,
        target: *target,
      })
    }
    ComponentType::MqttEvent { events } => {
      match events.wired().find(|o| *o >= component.outputs.len()) {
        Some(output) => Err(FlowError::UnknownOutput {
          flow: flow.name.clone(),
          component: index,
          output,
        }),
        None => Ok(()),
      }
    }
    _ => Ok(()),
  }
}

fn load_variables(defs: &[VariableDef]) -> Result<Vec<Variable>, FlowError> {
  let mut seen = HashSet::new();
  defs
    .iter()
    .map(|def| {
      if !seen.insert(def.name.as_str()) {
        return Err(FlowError::DuplicateVariable(def.name.clone()));
      }
      Ok(Variable {
        name: def.name.clone(),
        default: Value::from(&def.default),
      })
    })
    .collect()
}
