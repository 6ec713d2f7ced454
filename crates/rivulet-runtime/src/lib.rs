//! Rivulet Runtime
//!
//! A cooperative, single-threaded scheduler for flow graphs. Components run
//! to completion one at a time, propagate values along their output
//! connections, keep per-instance state across ticks, and receive
//! asynchronous backend events without ever blocking the tick loop.
//!
//! # Example
//!
//! ```ignore
//! let mut runtime = Runtime::from_project(&project)?;
//! let events = runtime.event_sender();
//! let mut runtime = runtime.with_backend(MemoryBackend::new(events));
//!
//! runtime.start()?;
//! loop {
//!   runtime.tick()?;
//! }
//! ```

mod components;
mod context;
mod debugger;
mod engine;
mod error;
mod expression;
mod flow_state;
mod queue;
mod runtime;
mod state;

pub use components::type_name;
pub use context::ComponentContext;
pub use debugger::{ChannelDebugger, DebuggerBridge, DebuggerEvent, NoopDebugger};
pub use error::{ComponentError, ComponentFailure, RuntimeError};
pub use expression::{AssignTarget, ExpressionEvaluator, Scope, TemplateEvaluator};
pub use flow_state::{FlowState, FlowStateArena, FlowStateId, ParentLink};
pub use queue::{ExecutionQueue, QueueEntry};
pub use runtime::Runtime;
pub use state::{ExecutionState, PendingEvent, PendingEvents, StateKey};
