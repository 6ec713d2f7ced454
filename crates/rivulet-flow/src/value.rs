//! Runtime values.
//!
//! [`Value`] is what properties evaluate to, what variables hold, and what
//! travels along connections. Compound values are reference counted, so
//! cloning a value is cheap and never copies its contents.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Default)]
pub enum Value {
  #[default]
  Undefined,
  Null,
  Boolean(bool),
  Int32(i32),
  Double(f64),
  String(Arc<str>),
  Array(Arc<Vec<Value>>),
  Struct(Arc<StructValue>),
  Handle(ResourceRef),
}

/// A record with a type name and named fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
  pub type_name: String,
  pub fields: BTreeMap<String, Value>,
}

impl StructValue {
  pub fn new(type_name: impl Into<String>) -> Self {
    Self {
      type_name: type_name.into(),
      fields: BTreeMap::new(),
    }
  }

  /// Builder-style field setter.
  pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
    self.fields.insert(field.into(), value);
    self
  }

  pub fn get(&self, field: &str) -> Option<&Value> {
    self.fields.get(field)
  }
}

/// Reference to an external resource owned by a backend.
///
/// All clones share one token. When the last clone is dropped, the id is sent
/// on the release channel (if any) so the owner can free the resource.
#[derive(Debug, Clone)]
pub struct ResourceRef(Arc<ResourceToken>);

#[derive(Debug)]
struct ResourceToken {
  id: u64,
  on_release: Option<UnboundedSender<u64>>,
}

impl ResourceRef {
  /// A reference whose release is reported on `on_release`.
  pub fn new(id: u64, on_release: UnboundedSender<u64>) -> Self {
    Self(Arc::new(ResourceToken {
      id,
      on_release: Some(on_release),
    }))
  }

  /// A reference nobody is notified about.
  pub fn detached(id: u64) -> Self {
    Self(Arc::new(ResourceToken {
      id,
      on_release: None,
    }))
  }

  pub fn id(&self) -> u64 {
    self.0.id
  }
}

impl PartialEq for ResourceRef {
  fn eq(&self, other: &Self) -> bool {
    self.0.id == other.0.id
  }
}

impl Drop for ResourceToken {
  fn drop(&mut self) {
    if let Some(sender) = self.on_release.take() {
      // Receiver gone means the runtime is already shut down
      let _ = sender.send(self.id);
    }
  }
}

impl PartialEq for Value {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Value::Undefined, Value::Undefined) => true,
      (Value::Null, Value::Null) => true,
      (Value::Boolean(a), Value::Boolean(b)) => a == b,
      (Value::Int32(a), Value::Int32(b)) => a == b,
      (Value::Double(a), Value::Double(b)) => a == b,
      (Value::String(a), Value::String(b)) => a == b,
      (Value::Array(a), Value::Array(b)) => a == b,
      (Value::Struct(a), Value::Struct(b)) => a == b,
      (Value::Handle(a), Value::Handle(b)) => a == b,
      _ => false,
    }
  }
}

impl Value {
  pub fn string(s: impl AsRef<str>) -> Self {
    Value::String(Arc::from(s.as_ref()))
  }

  pub fn record(value: StructValue) -> Self {
    Value::Struct(Arc::new(value))
  }

  pub fn is_undefined(&self) -> bool {
    matches!(self, Value::Undefined)
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::String(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_i32(&self) -> Option<i32> {
    match self {
      Value::Int32(n) => Some(*n),
      _ => None,
    }
  }

  pub fn as_struct(&self) -> Option<&StructValue> {
    match self {
      Value::Struct(s) => Some(s),
      _ => None,
    }
  }

  /// The struct's fields, if this is a struct of the given type.
  pub fn as_struct_of(&self, type_name: &str) -> Option<&StructValue> {
    self.as_struct().filter(|s| s.type_name == type_name)
  }

  pub fn as_handle(&self) -> Option<&ResourceRef> {
    match self {
      Value::Handle(h) => Some(h),
      _ => None,
    }
  }

  /// Follow a dotted field path through nested structs.
  pub fn field_path(&self, path: &[&str]) -> Option<&Value> {
    path.iter().try_fold(self, |value, field| value.as_struct()?.get(field))
  }

  /// JSON projection. Handles become `{"$handle": id}`, undefined becomes null.
  pub fn to_json(&self) -> serde_json::Value {
    match self {
      Value::Undefined | Value::Null => serde_json::Value::Null,
      Value::Boolean(b) => serde_json::Value::Bool(*b),
      Value::Int32(n) => serde_json::Value::from(*n),
      Value::Double(n) => serde_json::Number::from_f64(*n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null),
      Value::String(s) => serde_json::Value::String(s.to_string()),
      Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
      Value::Struct(s) => serde_json::Value::Object(
        s.fields
          .iter()
          .map(|(k, v)| (k.clone(), v.to_json()))
          .collect(),
      ),
      Value::Handle(h) => serde_json::json!({ "$handle": h.id() }),
    }
  }
}

impl From<&serde_json::Value> for Value {
  fn from(json: &serde_json::Value) -> Self {
    match json {
      serde_json::Value::Null => Value::Null,
      serde_json::Value::Bool(b) => Value::Boolean(*b),
      serde_json::Value::Number(n) => match n.as_i64().and_then(|i| i32::try_from(i).ok()) {
        Some(i) => Value::Int32(i),
        None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
      },
      serde_json::Value::String(s) => Value::string(s),
      serde_json::Value::Array(items) => {
        Value::Array(Arc::new(items.iter().map(Value::from).collect()))
      }
      serde_json::Value::Object(map) => Value::record(StructValue {
        type_name: "object".to_string(),
        fields: map.iter().map(|(k, v)| (k.clone(), Value::from(v))).collect(),
      }),
    }
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Boolean(b)
  }
}

impl From<i32> for Value {
  fn from(n: i32) -> Self {
    Value::Int32(n)
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::string(s)
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Undefined => f.write_str("undefined"),
      Value::String(s) => f.write_str(s),
      Value::Handle(h) => write!(f, "<handle {}>", h.id()),
      other => write!(f, "{}", other.to_json()),
    }
  }
}
