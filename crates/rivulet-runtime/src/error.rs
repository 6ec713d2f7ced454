//! Runtime error types.

use rivulet_connection::Status;
use rivulet_flow::FlowError;
use serde::Serialize;
use thiserror::Error;

/// Why a single component invocation failed.
///
/// Everything except [`ComponentError::Integrity`] is recoverable: the
/// failure is recorded, nothing is propagated for that invocation, and the
/// rest of the graph keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum ComponentError {
  /// The expression evaluator rejected a property.
  #[error("Failed to evaluate {property} in {component}: {reason}")]
  PropertyEvaluation {
    property: String,
    component: &'static str,
    reason: String,
  },

  /// A property evaluated to a value of the wrong type or shape.
  #[error("{0}")]
  PropertyType(String),

  /// A backend call returned a non-OK status.
  #[error("{operation} with error code: {code}")]
  ExternalOperation { operation: &'static str, code: i32 },

  /// No backend is compiled in for this operation.
  #[error("{operation} with error code: {code}")]
  UnsupportedBackend { operation: &'static str, code: i32 },

  /// The component was triggered again while its previous run is active.
  #[error("{component} is already running")]
  AlreadyRunning { component: String },

  /// Execution state bookkeeping is corrupt. Not recoverable.
  #[error("integrity violation: {0}")]
  Integrity(String),
}

impl ComponentError {
  /// Wrap a failed backend status. A failure that carries the OK code is
  /// reported as [`Status::OTHER`].
  pub fn backend(operation: &'static str, status: Status) -> Self {
    match status.normalized() {
      Status::NotImplemented => ComponentError::UnsupportedBackend {
        operation,
        code: Status::NOT_IMPLEMENTED,
      },
      Status::Ok => ComponentError::ExternalOperation {
        operation,
        code: Status::OTHER,
      },
      Status::Error(code) => ComponentError::ExternalOperation { operation, code },
    }
  }

  pub fn integrity(message: impl Into<String>) -> Self {
    ComponentError::Integrity(message.into())
  }
}

/// A recorded component failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentFailure {
  pub flow_state_index: usize,
  pub flow: usize,
  pub component_index: usize,
  /// Label or type of the failing component.
  pub component: String,
  pub error: ComponentError,
}

/// Errors surfaced by the [`Runtime`](crate::Runtime) itself.
#[derive(Debug, Error)]
pub enum RuntimeError {
  #[error("project has no flows")]
  NoFlows,

  #[error("runtime not started")]
  NotStarted,

  #[error("runtime already started")]
  AlreadyStarted,

  /// A previous tick hit an integrity violation.
  #[error("runtime halted after an integrity violation")]
  Halted,

  #[error("integrity violation: {0}")]
  Integrity(String),

  #[error(transparent)]
  Flow(#[from] FlowError),
}
