use serde::{Deserialize, Serialize};

/// Runtime tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Capacity of the channel that carries backend events into the tick loop.
  /// Events sent while it is full are dropped.
  pub event_channel_capacity: usize,

  /// Maximum number of undelivered events queued on one event component.
  /// Newer events are dropped once it is reached.
  pub pending_event_capacity: usize,

  /// Upper bound on components dispatched in a single tick. Entries left
  /// over stay queued for the next tick.
  pub max_steps_per_tick: usize,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      event_channel_capacity: 256,
      pending_event_capacity: 64,
      max_steps_per_tick: 10_000,
    }
  }
}
