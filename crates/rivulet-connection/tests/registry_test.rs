//! Connection registry and event channel working together.

use rivulet_connection::{
  BackendEvent, ConnectionRegistry, EventData, EventKind, HandlerRef, MemoryBackend, MqttBackend,
  MqttConfig, ResourceHandle, Status, event_channel,
};

type Key = (u32, usize);

fn config() -> MqttConfig {
  MqttConfig {
    protocol: "mqtt".to_string(),
    host: "localhost".to_string(),
    port: 1883,
    username: None,
    password: None,
  }
}

#[test]
fn test_handlers_are_per_connection() {
  let mut registry: ConnectionRegistry<Key> = ConnectionRegistry::new();
  let a = ResourceHandle(1);
  let b = ResourceHandle(2);
  registry.add_connection(a);
  registry.add_connection(b);

  assert_eq!(
    registry.add_handler(a, (0, 3)),
    Some(HandlerRef { handle: a, key: (0, 3) })
  );
  registry.add_handler(a, (1, 1));
  registry.add_handler(b, (0, 4));
  // Second registration of the same key is ignored
  registry.add_handler(a, (0, 3));

  assert_eq!(registry.find_connection(a).unwrap().handlers(), &[(0, 3), (1, 1)]);
  assert_eq!(registry.find_connection(b).unwrap().handlers(), &[(0, 4)]);
  assert_eq!(registry.add_handler(ResourceHandle(9), (0, 0)), None);

  assert!(registry.remove_handler((0, 3)));
  assert!(!registry.remove_handler((0, 3)));
  assert!(!registry.is_bound((0, 3)));
  assert_eq!(registry.find_connection(a).unwrap().handlers(), &[(1, 1)]);
}

#[test]
fn test_delete_returns_remaining_handlers() {
  let mut registry: ConnectionRegistry<Key> = ConnectionRegistry::new();
  let handle = ResourceHandle(5);
  registry.add_connection(handle);
  registry.add_handler(handle, (0, 1));
  registry.add_handler(handle, (2, 7));

  // Adding again keeps the existing record
  registry.add_connection(handle);
  assert_eq!(registry.len(), 1);

  assert_eq!(registry.delete_connection(handle), Some(vec![(0, 1), (2, 7)]));
  assert_eq!(registry.delete_connection(handle), None);
  assert!(registry.is_empty());
  assert!(!registry.is_bound((0, 1)));
}

#[test]
fn test_dispatch_reaches_handlers_in_order() {
  let mut registry: ConnectionRegistry<Key> = ConnectionRegistry::new();
  let handle = ResourceHandle(1);
  registry.add_connection(handle);
  registry.add_handler(handle, (0, 2));
  registry.add_handler(handle, (0, 1));

  let event = BackendEvent {
    handle,
    kind: EventKind::Offline,
    data: EventData::None,
  };
  let mut reached = Vec::new();
  assert_eq!(
    registry.dispatch_event(&event, |key, e| reached.push((key, e.kind))),
    Some(2)
  );
  assert_eq!(reached, vec![((0, 2), EventKind::Offline), ((0, 1), EventKind::Offline)]);

  let stray = BackendEvent {
    handle: ResourceHandle(42),
    ..event
  };
  assert_eq!(registry.dispatch_event(&stray, |_, _| unreachable!()), None);
}

#[test]
fn test_memory_backend_feeds_registry() {
  let (events, mut inbox) = event_channel(16);
  let mut backend = MemoryBackend::new(events);
  let mut registry: ConnectionRegistry<Key> = ConnectionRegistry::new();

  let sensor = backend.init(&config()).unwrap();
  let display = backend.init(&config()).unwrap();
  registry.add_connection(sensor);
  registry.add_connection(display);
  registry.add_handler(display, (0, 1));

  assert_eq!(backend.connect(sensor), Status::Ok);
  assert_eq!(backend.connect(display), Status::Ok);
  assert_eq!(backend.subscribe(display, "home/#"), Status::Ok);
  assert_eq!(backend.publish(sensor, "home/kitchen/temp", "21"), Status::Ok);

  let mut delivered = Vec::new();
  for event in inbox.drain() {
    registry.dispatch_event(&event, |key, e| delivered.push((key, e.kind, e.data.clone())));
  }

  assert_eq!(
    delivered,
    vec![
      ((0, 1), EventKind::Connect, EventData::None),
      (
        (0, 1),
        EventKind::Message,
        EventData::Message {
          topic: "home/kitchen/temp".to_string(),
          payload: "21".to_string(),
        }
      ),
    ]
  );
}
