//! Rivulet Flow
//!
//! This crate provides the read-only flow representation the runtime executes,
//! and the [`Value`] type that travels along connections.
//!
//! Key differences from `rivulet-config`:
//! - Every connection, flow reference and output index is validated
//! - Each component knows its own index and its flow's start components
//! - Variable defaults are converted into runtime values
//! - Nothing here is mutated once loaded

mod assets;
mod error;
mod value;

pub use assets::{Assets, Component, Connection, Flow, Variable, SEQOUT};
pub use error::FlowError;
pub use value::{ResourceRef, StructValue, Value};
