//! Connection registry.
//!
//! Owns the live external-resource handles and the handlers bound to them.
//! A handler is just the key of an execution state (`K`); the registry never
//! holds a reference into runtime memory, so a stale key can at worst fail a
//! lookup.

use tracing::{debug, warn};

use crate::backend::ResourceHandle;
use crate::event::BackendEvent;

/// One live resource and the execution states listening to it.
#[derive(Debug, Clone)]
pub struct Connection<K> {
  handle: ResourceHandle,
  handlers: Vec<K>,
}

impl<K> Connection<K> {
  pub fn handle(&self) -> ResourceHandle {
    self.handle
  }

  /// Bound handlers in registration order.
  pub fn handlers(&self) -> &[K] {
    &self.handlers
  }
}

/// Proof of a successful handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerRef<K> {
  pub handle: ResourceHandle,
  pub key: K,
}

#[derive(Debug)]
pub struct ConnectionRegistry<K> {
  connections: Vec<Connection<K>>,
}

impl<K> Default for ConnectionRegistry<K> {
  fn default() -> Self {
    Self {
      connections: Vec::new(),
    }
  }
}

impl<K: Copy + Eq + std::fmt::Debug> ConnectionRegistry<K> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a freshly created resource. Registering a handle twice keeps
  /// the existing record and its handlers.
  pub fn add_connection(&mut self, handle: ResourceHandle) -> &Connection<K> {
    let position = match self.position(handle) {
      Some(position) => {
        warn!(%handle, "connection already registered");
        position
      }
      None => {
        self.connections.push(Connection {
          handle,
          handlers: Vec::new(),
        });
        debug!(%handle, "connection added");
        self.connections.len() - 1
      }
    };
    &self.connections[position]
  }

  pub fn find_connection(&self, handle: ResourceHandle) -> Option<&Connection<K>> {
    self.connections.iter().find(|c| c.handle == handle)
  }

  /// Remove a connection record, returning the handlers still bound to it.
  ///
  /// The caller releases the backend resource and frees every returned
  /// execution state: they lost their resource abruptly.
  pub fn delete_connection(&mut self, handle: ResourceHandle) -> Option<Vec<K>> {
    let position = self.position(handle)?;
    let connection = self.connections.remove(position);
    debug!(
      %handle,
      handlers = connection.handlers.len(),
      "connection deleted"
    );
    Some(connection.handlers)
  }

  /// Bind `key` to a connection. Fails when the handle is unknown; binding the
  /// same key twice is a no-op.
  pub fn add_handler(&mut self, handle: ResourceHandle, key: K) -> Option<HandlerRef<K>> {
    let position = self.position(handle)?;
    let connection = &mut self.connections[position];
    if !connection.handlers.contains(&key) {
      connection.handlers.push(key);
    }
    Some(HandlerRef { handle, key })
  }

  /// Detach `key` from whichever connection holds it.
  pub fn remove_handler(&mut self, key: K) -> bool {
    for connection in &mut self.connections {
      if let Some(position) = connection.handlers.iter().position(|k| *k == key) {
        connection.handlers.remove(position);
        debug!(handle = %connection.handle, ?key, "handler removed");
        return true;
      }
    }
    false
  }

  /// Hand `event` to every handler of its connection, in registration order.
  /// Returns the number of handlers reached; `None` if the handle is unknown.
  pub fn dispatch_event(
    &self,
    event: &BackendEvent,
    mut deliver: impl FnMut(K, &BackendEvent),
  ) -> Option<usize> {
    let Some(connection) = self.find_connection(event.handle) else {
      debug!(handle = %event.handle, kind = ?event.kind, "event for unknown connection");
      return None;
    };

    for key in &connection.handlers {
      deliver(*key, event);
    }
    Some(connection.handlers.len())
  }

  /// Live handles in insertion order.
  pub fn handles(&self) -> impl Iterator<Item = ResourceHandle> + '_ {
    self.connections.iter().map(|c| c.handle)
  }

  /// Whether any connection still has `key` bound.
  pub fn is_bound(&self, key: K) -> bool {
    self.connections.iter().any(|c| c.handlers.contains(&key))
  }

  pub fn len(&self) -> usize {
    self.connections.len()
  }

  pub fn is_empty(&self) -> bool {
    self.connections.is_empty()
  }

  fn position(&self, handle: ResourceHandle) -> Option<usize> {
    self.connections.iter().position(|c| c.handle == handle)
  }
}
