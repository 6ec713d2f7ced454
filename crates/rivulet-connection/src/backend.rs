use std::fmt;

use crate::status::Status;

/// Opaque id of a resource created by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle(pub u64);

impl fmt::Display for ResourceHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// Parameters for creating a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttConfig {
  pub protocol: String,
  pub host: String,
  pub port: i32,
  pub username: Option<String>,
  pub password: Option<String>,
}

/// Capability interface of an MQTT-like client library.
///
/// Every call must return promptly: anything that needs the network is
/// started here and completes later as an event sent through the
/// [`EventSender`](crate::EventSender) the backend was built with.
pub trait MqttBackend {
  /// Create a client. Does not connect.
  fn init(&mut self, config: &MqttConfig) -> Result<ResourceHandle, Status>;

  /// Destroy a client and release everything it holds.
  fn deinit(&mut self, handle: ResourceHandle) -> Status;

  fn connect(&mut self, handle: ResourceHandle) -> Status;

  fn disconnect(&mut self, handle: ResourceHandle) -> Status;

  fn subscribe(&mut self, handle: ResourceHandle, topic: &str) -> Status;

  fn unsubscribe(&mut self, handle: ResourceHandle, topic: &str) -> Status;

  fn publish(&mut self, handle: ResourceHandle, topic: &str, payload: &str) -> Status;
}

/// Backend used when no client library is compiled in.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedBackend;

impl MqttBackend for UnsupportedBackend {
  fn init(&mut self, _config: &MqttConfig) -> Result<ResourceHandle, Status> {
    Err(Status::NotImplemented)
  }

  fn deinit(&mut self, _handle: ResourceHandle) -> Status {
    Status::NotImplemented
  }

  fn connect(&mut self, _handle: ResourceHandle) -> Status {
    Status::NotImplemented
  }

  fn disconnect(&mut self, _handle: ResourceHandle) -> Status {
    Status::NotImplemented
  }

  fn subscribe(&mut self, _handle: ResourceHandle, _topic: &str) -> Status {
    Status::NotImplemented
  }

  fn unsubscribe(&mut self, _handle: ResourceHandle, _topic: &str) -> Status {
    Status::NotImplemented
  }

  fn publish(&mut self, _handle: ResourceHandle, _topic: &str, _payload: &str) -> Status {
    Status::NotImplemented
  }
}
