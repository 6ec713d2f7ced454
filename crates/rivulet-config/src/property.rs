//! Property expression types for component configuration.
//!
//! Every component property is an expression string that gets evaluated by
//! the runtime's expression evaluator each time the component executes.
//!
//! # Examples
//!
//! ```json
//! {
//!   "properties": [
//!     "connection",
//!     "'sensors/' ~ device_id",
//!     "1883"
//!   ]
//! }
//! ```
//!
//! - `"connection"` resolves the variable named `connection` as-is
//! - `"'sensors/' ~ device_id"` is computed from the current scope
//! - `"1883"` is a literal integer

/// A property expression, evaluated at runtime against the flow's scope.
///
/// Bare identifiers and dotted paths (`msg.topic`) name values directly;
/// anything else is handed to the template expression engine.
pub type PropertyExpression = String;
