use serde::{Deserialize, Serialize};

use crate::connection::ConnectionDef;
use crate::property::PropertyExpression;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDef {
  #[serde(flatten)]
  pub component_type: ComponentType,
  /// Property expressions, indexed by the component type's property ids.
  #[serde(default)]
  pub properties: Vec<PropertyExpression>,
  /// Input names. Values arriving on an input are visible to property
  /// expressions under this name.
  #[serde(default)]
  pub inputs: Vec<String>,
  /// Output table: `outputs[i]` lists the connections of output `i`.
  /// Output 0 is the sequence output.
  #[serde(default)]
  pub outputs: Vec<Vec<ConnectionDef>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComponentType {
  /// Entry point; fires once when its flow instance starts.
  Start,
  /// Ends a called flow instance and resumes the caller.
  End,
  /// Logs the value of property 0.
  Log,
  /// Assigns property 1 to the variable named by property 0.
  SetVariable,
  /// Runs another flow as a nested instance.
  CallAction {
    flow: usize,
  },
  MqttInit,
  MqttConnect,
  MqttDisconnect,
  MqttSubscribe,
  MqttUnsubscribe,
  MqttPublish,
  /// Delivers connection events into the flow.
  MqttEvent {
    #[serde(default)]
    events: MqttEventOutputs,
  },
}

/// Output index for each connection event kind. `None` means the event is
/// not wired and gets dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttEventOutputs {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub connect: Option<usize>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reconnect: Option<usize>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub close: Option<usize>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub disconnect: Option<usize>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub offline: Option<usize>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<usize>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub message: Option<usize>,
}

impl MqttEventOutputs {
  /// Iterate over the wired output indices.
  pub fn wired(&self) -> impl Iterator<Item = usize> {
    [
      self.connect,
      self.reconnect,
      self.close,
      self.disconnect,
      self.offline,
      self.error,
      self.message,
    ]
    .into_iter()
    .flatten()
  }
}
