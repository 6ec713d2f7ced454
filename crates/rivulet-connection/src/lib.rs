//! Rivulet Connection
//!
//! This crate provides the boundary between the flow runtime and external
//! asynchronous resources such as an MQTT client.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐   calls (non-blocking)   ┌──────────────────┐
//! │        flow components       │ ───────────────────────▶ │   MqttBackend    │
//! └──────────────────────────────┘                          └──────────────────┘
//!                ▲                                                   │
//!                │ drained on each tick                              │ callbacks,
//!                │                                                   │ any thread
//! ┌──────────────────────────────┐      bounded channel     ┌──────────────────┐
//! │  EventInbox → registry →     │ ◀─────────────────────── │   EventSender    │
//! │  handler execution states    │                          └──────────────────┘
//! └──────────────────────────────┘
//! ```
//!
//! The [`ConnectionRegistry`] is owned by the runtime and is only touched on
//! the tick thread. Backends never see it; they only hold an [`EventSender`].

mod backend;
mod event;
mod memory;
mod registry;
mod status;

pub use backend::{MqttBackend, MqttConfig, ResourceHandle, UnsupportedBackend};
pub use event::{BackendEvent, EventData, EventDropped, EventInbox, EventKind, EventSender, event_channel};
pub use memory::{MemoryBackend, topic_matches};
pub use registry::{Connection, ConnectionRegistry, HandlerRef};
pub use status::Status;
