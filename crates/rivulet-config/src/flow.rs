use serde::{Deserialize, Serialize};

use crate::component::ComponentDef;
use crate::engine::EngineConfig;
use crate::variable::VariableDef;

/// A single flow: its components in index order and its local variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowDef {
  pub name: String,
  pub components: Vec<ComponentDef>,
  #[serde(default)]
  pub local_variables: Vec<VariableDef>,
}

/// A complete project. Flow 0 is the main flow started by the runtime;
/// the others run only when called.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDef {
  pub name: String,
  pub flows: Vec<FlowDef>,
  #[serde(default)]
  pub global_variables: Vec<VariableDef>,
  #[serde(default)]
  pub engine: EngineConfig,
}
