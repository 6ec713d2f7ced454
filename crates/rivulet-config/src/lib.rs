//! Rivulet Config
//!
//! This crate contains the serializable project configuration types for Rivulet.
//! These types represent flow definitions as produced by the authoring tool,
//! before they are validated and loaded into read-only runtime assets.
//!
//! Configuration can be loaded from:
//! - JSON project files (via CLI with `rivulet run project.json`)
//! - Embedded asset blobs (as JSON)
//!
//! The runtime takes these configuration types, validates every index against
//! the flow it belongs to, and resolves them into `rivulet-flow` assets.

mod component;
mod connection;
mod engine;
mod flow;
mod property;
mod variable;

pub use component::{ComponentDef, ComponentType, MqttEventOutputs};
pub use connection::ConnectionDef;
pub use engine::EngineConfig;
pub use flow::{FlowDef, ProjectDef};
pub use property::PropertyExpression;
pub use variable::VariableDef;
