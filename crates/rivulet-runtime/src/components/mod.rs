//! Built-in component types.
//!
//! Every component implements the same contract against a
//! [`ComponentContext`]: evaluate properties, optionally allocate state,
//! perform its effect, propagate outputs, optionally re-arm. Returning an
//! error fails the invocation and discards everything it propagated.

mod control;
mod mqtt;

use rivulet_config::ComponentType;

use crate::context::ComponentContext;
use crate::error::ComponentError;

pub(crate) use mqtt::{event_output, event_value};

/// Run one invocation of the context's component.
pub(crate) fn execute(ctx: &mut ComponentContext<'_>) -> Result<(), ComponentError> {
  match &ctx.component().component_type {
    ComponentType::Start => control::start(ctx),
    ComponentType::End => control::end(ctx),
    ComponentType::Log => control::log(ctx),
    ComponentType::SetVariable => control::set_variable(ctx),
    ComponentType::CallAction { flow } => control::call_action(ctx, *flow),
    ComponentType::MqttInit => mqtt::init(ctx),
    ComponentType::MqttConnect => mqtt::connect(ctx),
    ComponentType::MqttDisconnect => mqtt::disconnect(ctx),
    ComponentType::MqttSubscribe => mqtt::subscribe(ctx),
    ComponentType::MqttUnsubscribe => mqtt::unsubscribe(ctx),
    ComponentType::MqttPublish => mqtt::publish(ctx),
    ComponentType::MqttEvent { .. } => mqtt::event(ctx),
  }
}

/// Display name of a component type, as used in error messages.
pub fn type_name(component_type: &ComponentType) -> &'static str {
  match component_type {
    ComponentType::Start => "Start",
    ComponentType::End => "End",
    ComponentType::Log => "Log",
    ComponentType::SetVariable => "SetVariable",
    ComponentType::CallAction { .. } => "CallAction",
    ComponentType::MqttInit => "MQTTInit",
    ComponentType::MqttConnect => "MQTTConnect",
    ComponentType::MqttDisconnect => "MQTTDisconnect",
    ComponentType::MqttSubscribe => "MQTTSubscribe",
    ComponentType::MqttUnsubscribe => "MQTTUnsubscribe",
    ComponentType::MqttPublish => "MQTTPublish",
    ComponentType::MqttEvent { .. } => "MQTTEvent",
  }
}
