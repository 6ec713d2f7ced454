//! MQTT components.
//!
//! `MQTTInit` creates a backend client and stores an `MQTTConnection` struct
//! in a variable. The struct's `id` field holds the client handle; once the
//! last copy of it is dropped the connection is deleted. The other
//! operations take that struct as their `Connection` property.
//!
//! `MQTTEvent` bridges backend callbacks into the flow. Its first invocation
//! binds a handler to the connection and emits Seqout; every later
//! invocation delivers at most one pending event. `Connection` is only read
//! while arming. It re-arms itself on every invocation.

use rivulet_config::MqttEventOutputs;
use rivulet_connection::{EventData, EventKind, MqttConfig, ResourceHandle, Status};
use rivulet_flow::{ResourceRef, StructValue, Value};

use crate::context::ComponentContext;
use crate::error::ComponentError;
use crate::state::ExecutionState;

const CONNECTION_TYPE: &str = "MQTTConnection";
const MESSAGE_TYPE: &str = "MQTTMessage";
const STATUS_TYPE: &str = "ObjectVariableStatus";

/// Icon shown by status widgets for a connection object.
const STATUS_IMAGE: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8BQDwAEhQGAhKmMIQAAAABJRU5ErkJggg==";

mod property {
  pub const CONNECTION: usize = 0;
  pub const PROTOCOL: usize = 1;
  pub const HOST: usize = 2;
  pub const PORT: usize = 3;
  pub const USERNAME: usize = 4;
  pub const PASSWORD: usize = 5;
  pub const TOPIC: usize = 1;
  pub const PAYLOAD: usize = 2;
}

pub(super) fn init(ctx: &mut ComponentContext<'_>) -> Result<(), ComponentError> {
  let target = ctx.eval_assignable_property(property::CONNECTION, "Connection")?;

  let protocol = ctx.eval_property(property::PROTOCOL, "Protocol")?;
  let protocol = required_string(&protocol, "Protocol must be a string")?;
  let host = ctx.eval_property(property::HOST, "Host")?;
  let host = required_string(&host, "Host must be a string")?;
  let port = ctx.eval_property(property::PORT, "Port")?;
  let port = port
    .as_i32()
    .ok_or_else(|| ComponentError::PropertyType("Port must be an integer".to_string()))?;
  let username = ctx.eval_property(property::USERNAME, "Username")?;
  let username_str = optional_string(&username, "Username must be a string")?;
  let password = ctx.eval_property(property::PASSWORD, "Password")?;
  let password_str = optional_string(&password, "Password must be a string")?;

  let config = MqttConfig {
    protocol: protocol.to_string(),
    host: host.to_string(),
    port,
    username: username_str,
    password: password_str,
  };
  let handle = ctx
    .backend_mut()
    .init(&config)
    .map_err(|status| ComponentError::backend("Failed to initialize MQTT connection", status))?;
  ctx.registry_mut().add_connection(handle);

  let status = StructValue::new(STATUS_TYPE)
    .with("label", Value::from(""))
    .with("image", Value::from(STATUS_IMAGE))
    .with("color", Value::from("gray"))
    .with("error", Value::Undefined);
  let connection = StructValue::new(CONNECTION_TYPE)
    .with("protocol", Value::from(protocol))
    .with("host", Value::from(host))
    .with("port", Value::Int32(port))
    .with("username", username)
    .with("password", password)
    .with("isConnected", Value::Boolean(false))
    .with(
      "id",
      Value::Handle(ResourceRef::new(handle.0, ctx.release_sender())),
    )
    .with("status", Value::record(status));

  ctx.assign(target, Value::record(connection))?;
  ctx.propagate_seqout();
  Ok(())
}

pub(super) fn connect(ctx: &mut ComponentContext<'_>) -> Result<(), ComponentError> {
  let handle = registered_connection(ctx, "Failed to connect to MQTT broker")?;
  let status = ctx.backend_mut().connect(handle);
  check(status, "Failed to connect to MQTT broker")?;
  ctx.propagate_seqout();
  Ok(())
}

pub(super) fn disconnect(ctx: &mut ComponentContext<'_>) -> Result<(), ComponentError> {
  let handle = registered_connection(ctx, "Failed to disconnect from MQTT broker")?;
  let status = ctx.backend_mut().disconnect(handle);
  check(status, "Failed to disconnect from MQTT broker")?;
  ctx.propagate_seqout();
  Ok(())
}

pub(super) fn subscribe(ctx: &mut ComponentContext<'_>) -> Result<(), ComponentError> {
  let operation = "Failed to subscribe to MQTT topic";
  let handle = connection_handle(ctx)?;
  let topic = ctx.eval_property(property::TOPIC, "Topic")?;
  let topic = required_string(&topic, "Topic must be a string")?;
  ensure_registered(ctx, handle, operation)?;

  let status = ctx.backend_mut().subscribe(handle, topic);
  check(status, operation)?;
  ctx.propagate_seqout();
  Ok(())
}

pub(super) fn unsubscribe(ctx: &mut ComponentContext<'_>) -> Result<(), ComponentError> {
  let operation = "Failed to unsubscribe from MQTT topic";
  let handle = connection_handle(ctx)?;
  let topic = ctx.eval_property(property::TOPIC, "Topic")?;
  let topic = required_string(&topic, "Topic must be a string")?;
  ensure_registered(ctx, handle, operation)?;

  let status = ctx.backend_mut().unsubscribe(handle, topic);
  check(status, operation)?;
  ctx.propagate_seqout();
  Ok(())
}

pub(super) fn publish(ctx: &mut ComponentContext<'_>) -> Result<(), ComponentError> {
  let operation = "Failed to publish to MQTT topic";
  let handle = connection_handle(ctx)?;
  let topic = ctx.eval_property(property::TOPIC, "Topic")?;
  let topic = required_string(&topic, "Topic must be a string")?;
  let payload = ctx.eval_property(property::PAYLOAD, "Payload")?;
  let payload = required_string(&payload, "Payload must be a string")?;
  ensure_registered(ctx, handle, operation)?;

  let status = ctx.backend_mut().publish(handle, topic, payload);
  check(status, operation)?;
  ctx.propagate_seqout();
  Ok(())
}

pub(super) fn event(ctx: &mut ComponentContext<'_>) -> Result<(), ComponentError> {
  // Once armed, the bound handler decides what arrives; the property is not
  // looked at again.
  if ctx.execution_state().is_none() {
    let handle = connection_handle(ctx)?;
    ensure_registered(ctx, handle, "Failed to add MQTT event handler")?;
    let capacity = ctx.config().pending_event_capacity;
    ctx.allocate_execution_state(ExecutionState::mqtt_event(capacity))?;
    let key = ctx.key();
    if ctx.registry_mut().add_handler(handle, key).is_none() {
      return Err(ComponentError::integrity(format!(
        "connection {handle} vanished while binding a handler"
      )));
    }
    ctx.propagate_seqout();
  } else {
    let event = ctx
      .execution_state_mut()
      .ok_or_else(|| ComponentError::integrity("event state vanished"))?
      .pending_events_mut()?
      .pop();
    if let Some(event) = event {
      ctx.propagate_value(event.output, event.value);
    }
  }

  ctx.add_to_queue(true);
  Ok(())
}

/// Output a component routes `kind` to, if wired.
pub(crate) fn event_output(outputs: &MqttEventOutputs, kind: EventKind) -> Option<usize> {
  match kind {
    EventKind::Connect => outputs.connect,
    EventKind::Reconnect => outputs.reconnect,
    EventKind::Close => outputs.close,
    EventKind::Disconnect => outputs.disconnect,
    EventKind::Offline => outputs.offline,
    EventKind::Error => outputs.error,
    EventKind::Message => outputs.message,
  }
}

/// Value carried by an event: the error text, an `MQTTMessage`, or null.
pub(crate) fn event_value(data: &EventData) -> Value {
  match data {
    EventData::None => Value::Null,
    EventData::Error(message) => Value::string(message),
    EventData::Message { topic, payload } => Value::record(
      StructValue::new(MESSAGE_TYPE)
        .with("topic", Value::string(topic))
        .with("payload", Value::string(payload)),
    ),
  }
}

/// Evaluate the `Connection` property down to its backend handle.
fn connection_handle(ctx: &ComponentContext<'_>) -> Result<ResourceHandle, ComponentError> {
  let connection = ctx.eval_property(property::CONNECTION, "Connection")?;
  connection
    .as_struct_of(CONNECTION_TYPE)
    .and_then(|c| c.get("id"))
    .and_then(Value::as_handle)
    .map(|h| ResourceHandle(h.id()))
    .ok_or_else(|| {
      ComponentError::PropertyType(format!("Connection must be a object:{CONNECTION_TYPE}"))
    })
}

fn registered_connection(
  ctx: &ComponentContext<'_>,
  operation: &'static str,
) -> Result<ResourceHandle, ComponentError> {
  let handle = connection_handle(ctx)?;
  ensure_registered(ctx, handle, operation)?;
  Ok(handle)
}

fn ensure_registered(
  ctx: &ComponentContext<'_>,
  handle: ResourceHandle,
  operation: &'static str,
) -> Result<(), ComponentError> {
  match ctx.registry().find_connection(handle) {
    Some(_) => Ok(()),
    None => Err(ComponentError::ExternalOperation {
      operation,
      code: Status::UNKNOWN_HANDLE,
    }),
  }
}

fn check(status: Status, operation: &'static str) -> Result<(), ComponentError> {
  if status.is_ok() {
    Ok(())
  } else {
    Err(ComponentError::backend(operation, status))
  }
}

fn required_string<'v>(value: &'v Value, message: &str) -> Result<&'v str, ComponentError> {
  value
    .as_str()
    .ok_or_else(|| ComponentError::PropertyType(message.to_string()))
}

/// Undefined means "not set"; anything else must be a string.
fn optional_string(value: &Value, message: &str) -> Result<Option<String>, ComponentError> {
  match value {
    Value::Undefined => Ok(None),
    Value::String(s) => Ok(Some(s.to_string())),
    _ => Err(ComponentError::PropertyType(message.to_string())),
  }
}
