use serde::{Deserialize, Serialize};

/// One output connection: the downstream component and which of its inputs
/// receives the propagated value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDef {
  pub component: usize,
  #[serde(default)]
  pub input: usize,
}
