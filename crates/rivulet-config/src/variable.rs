use serde::{Deserialize, Serialize};

/// A named variable with its initial value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDef {
  pub name: String,
  #[serde(default)]
  pub default: serde_json::Value,
}
