use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
  #[error("project has no flows")]
  NoFlows,

  #[error(
    "flow '{flow}' component {component} output {output} targets unknown component {target}"
  )]
  InvalidConnection {
    flow: String,
    component: usize,
    output: usize,
    target: usize,
  },

  #[error("flow '{flow}' component {component} output {output} targets unknown input {input} of component {target}")]
  InvalidInput {
    flow: String,
    component: usize,
    output: usize,
    target: usize,
    input: usize,
  },

  #[error("flow '{flow}' component {component} calls unknown flow {target}")]
  UnknownFlow {
    flow: String,
    component: usize,
    target: usize,
  },

  #[error("flow '{flow}' component {component} maps an event to missing output {output}")]
  UnknownOutput {
    flow: String,
    component: usize,
    output: usize,
  },

  #[error("flow '{flow}' component {component} needs {expected} properties, found {found}")]
  MissingProperties {
    flow: String,
    component: usize,
    expected: usize,
    found: usize,
  },

  #[error("duplicate variable name: {0}")]
  DuplicateVariable(String),
}
