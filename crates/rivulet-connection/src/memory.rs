//! In-process loopback broker.
//!
//! Publishing on any client delivers a message event to every connected
//! client subscribed to a matching topic filter, including the publisher.
//! Useful for tests and for running flows without a network.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::backend::{MqttBackend, MqttConfig, ResourceHandle};
use crate::event::{EventData, EventKind, EventSender};
use crate::status::Status;

#[derive(Debug)]
struct MemoryClient {
  config: MqttConfig,
  connected: bool,
  subscriptions: BTreeSet<String>,
}

#[derive(Debug)]
pub struct MemoryBackend {
  events: EventSender,
  clients: HashMap<u64, MemoryClient>,
  next_id: u64,
}

impl MemoryBackend {
  pub fn new(events: EventSender) -> Self {
    Self {
      events,
      clients: HashMap::new(),
      next_id: 1,
    }
  }

  pub fn is_connected(&self, handle: ResourceHandle) -> bool {
    self.clients.get(&handle.0).is_some_and(|c| c.connected)
  }

  pub fn client_count(&self) -> usize {
    self.clients.len()
  }

  pub fn broker_address(&self, handle: ResourceHandle) -> Option<String> {
    self.clients.get(&handle.0).map(|c| {
      format!("{}://{}:{}", c.config.protocol, c.config.host, c.config.port)
    })
  }

  fn emit(&self, handle: ResourceHandle, kind: EventKind, data: EventData) {
    if let Err(e) = self.events.dispatch_event(handle, kind, data) {
      warn!(error = %e, "memory backend dropped event");
    }
  }

  fn client_mut(&mut self, handle: ResourceHandle) -> Result<&mut MemoryClient, Status> {
    self
      .clients
      .get_mut(&handle.0)
      .ok_or(Status::Error(Status::UNKNOWN_HANDLE))
  }
}

impl MqttBackend for MemoryBackend {
  fn init(&mut self, config: &MqttConfig) -> Result<ResourceHandle, Status> {
    if config.host.is_empty() {
      return Err(Status::Error(Status::OTHER));
    }

    let handle = ResourceHandle(self.next_id);
    self.next_id += 1;
    self.clients.insert(
      handle.0,
      MemoryClient {
        config: config.clone(),
        connected: false,
        subscriptions: BTreeSet::new(),
      },
    );
    debug!(%handle, host = %config.host, port = config.port, "memory client created");
    Ok(handle)
  }

  fn deinit(&mut self, handle: ResourceHandle) -> Status {
    match self.clients.remove(&handle.0) {
      Some(_) => Status::Ok,
      None => Status::Error(Status::UNKNOWN_HANDLE),
    }
  }

  fn connect(&mut self, handle: ResourceHandle) -> Status {
    let client = match self.client_mut(handle) {
      Ok(client) => client,
      Err(status) => return status,
    };
    let reconnect = client.connected;
    client.connected = true;

    let kind = if reconnect {
      EventKind::Reconnect
    } else {
      EventKind::Connect
    };
    self.emit(handle, kind, EventData::None);
    Status::Ok
  }

  fn disconnect(&mut self, handle: ResourceHandle) -> Status {
    let client = match self.client_mut(handle) {
      Ok(client) => client,
      Err(status) => return status,
    };
    if !client.connected {
      return Status::Error(Status::NOT_CONNECTED);
    }
    client.connected = false;

    self.emit(handle, EventKind::Disconnect, EventData::None);
    self.emit(handle, EventKind::Close, EventData::None);
    Status::Ok
  }

  fn subscribe(&mut self, handle: ResourceHandle, topic: &str) -> Status {
    match self.client_mut(handle) {
      Ok(client) if client.connected => {
        client.subscriptions.insert(topic.to_string());
        Status::Ok
      }
      Ok(_) => Status::Error(Status::NOT_CONNECTED),
      Err(status) => status,
    }
  }

  fn unsubscribe(&mut self, handle: ResourceHandle, topic: &str) -> Status {
    match self.client_mut(handle) {
      Ok(client) => {
        client.subscriptions.remove(topic);
        Status::Ok
      }
      Err(status) => status,
    }
  }

  fn publish(&mut self, handle: ResourceHandle, topic: &str, payload: &str) -> Status {
    match self.client_mut(handle) {
      Ok(client) if client.connected => {}
      Ok(_) => return Status::Error(Status::NOT_CONNECTED),
      Err(status) => return status,
    }

    let mut receivers: Vec<u64> = self
      .clients
      .iter()
      .filter(|(_, c)| c.connected && c.subscriptions.iter().any(|f| topic_matches(f, topic)))
      .map(|(id, _)| *id)
      .collect();
    receivers.sort_unstable();

    for id in receivers {
      self.emit(
        ResourceHandle(id),
        EventKind::Message,
        EventData::Message {
          topic: topic.to_string(),
          payload: payload.to_string(),
        },
      );
    }
    Status::Ok
  }
}

/// MQTT topic filter matching with `+` (one level) and `#` (rest) wildcards.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
  let mut filter_levels = filter.split('/');
  let mut topic_levels = topic.split('/');

  loop {
    match (filter_levels.next(), topic_levels.next()) {
      (Some("#"), _) => return true,
      (Some("+"), Some(_)) => {}
      (Some(f), Some(t)) if f == t => {}
      (None, None) => return true,
      _ => return false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::event::event_channel;

  fn config() -> MqttConfig {
    MqttConfig {
      protocol: "mqtt".to_string(),
      host: "broker.local".to_string(),
      port: 1883,
      username: None,
      password: None,
    }
  }

  #[test]
  fn test_topic_matches() {
    assert!(topic_matches("a/b", "a/b"));
    assert!(topic_matches("a/+/c", "a/x/c"));
    assert!(topic_matches("a/#", "a/b/c"));
    assert!(topic_matches("#", "anything"));
    assert!(!topic_matches("a/b", "a/b/c"));
    assert!(!topic_matches("a/+", "a/b/c"));
    assert!(!topic_matches("a/b/c", "a/b"));
  }

  #[test]
  fn test_loopback_publish() {
    let (sender, mut inbox) = event_channel(16);
    let mut backend = MemoryBackend::new(sender);

    let handle = backend.init(&config()).unwrap();
    assert_eq!(backend.subscribe(handle, "t"), Status::Error(Status::NOT_CONNECTED));

    assert_eq!(backend.connect(handle), Status::Ok);
    assert_eq!(backend.subscribe(handle, "sensors/+"), Status::Ok);
    assert_eq!(backend.publish(handle, "sensors/temp", "21.5"), Status::Ok);
    assert_eq!(backend.publish(handle, "other", "x"), Status::Ok);

    let events = inbox.drain();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, EventKind::Connect);
    assert_eq!(
      events[1].data,
      EventData::Message {
        topic: "sensors/temp".to_string(),
        payload: "21.5".to_string()
      }
    );
  }

  #[test]
  fn test_unknown_handle() {
    let (sender, _inbox) = event_channel(4);
    let mut backend = MemoryBackend::new(sender);
    let unknown = ResourceHandle(42);

    assert_eq!(backend.connect(unknown), Status::Error(Status::UNKNOWN_HANDLE));
    assert_eq!(
      backend.publish(unknown, "t", "p"),
      Status::Error(Status::UNKNOWN_HANDLE)
    );
    assert_eq!(backend.deinit(unknown), Status::Error(Status::UNKNOWN_HANDLE));
  }

  #[test]
  fn test_deinit_forgets_client() {
    let (sender, _inbox) = event_channel(4);
    let mut backend = MemoryBackend::new(sender);
    let first = backend.init(&config()).unwrap();
    let second = backend.init(&config()).unwrap();
    assert_ne!(first, second);
    assert_eq!(backend.client_count(), 2);

    assert_eq!(backend.deinit(first), Status::Ok);
    assert_eq!(backend.client_count(), 1);
    assert_eq!(backend.connect(first), Status::Error(Status::UNKNOWN_HANDLE));
    assert!(backend.broker_address(first).is_none());
  }

  #[test]
  fn test_reconnect_and_disconnect_events() {
    let (sender, mut inbox) = event_channel(16);
    let mut backend = MemoryBackend::new(sender);
    let handle = backend.init(&config()).unwrap();

    backend.connect(handle);
    backend.connect(handle);
    backend.disconnect(handle);

    let kinds: Vec<_> = inbox.drain().into_iter().map(|e| e.kind).collect();
    assert_eq!(
      kinds,
      vec![
        EventKind::Connect,
        EventKind::Reconnect,
        EventKind::Disconnect,
        EventKind::Close
      ]
    );
    assert!(!backend.is_connected(handle));
    assert_eq!(
      backend.broker_address(handle).as_deref(),
      Some("mqtt://broker.local:1883")
    );
  }
}
