//! Property evaluation.
//!
//! Components never interpret expression syntax. They ask an
//! [`ExpressionEvaluator`] for a [`Value`] and only type-check what comes
//! back.
//!
//! The default [`TemplateEvaluator`] handles two shapes:
//! - A bare identifier or dotted path (`conn`, `msg.topic`) resolves straight
//!   to the stored value, so structs and handles keep their identity
//! - Anything else is a minijinja expression evaluated against a JSON
//!   projection of the scope:
//! ```text
//! 'broker.local'      count + 1      "sensors/" ~ room      none
//! ```

use std::collections::BTreeMap;

use minijinja::{Environment, UndefinedBehavior};
use rivulet_flow::Value;

/// Names visible to a property expression.
///
/// Lookup order: local variables, then the component's named inputs, then
/// global variables.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
  pub locals: &'a BTreeMap<String, Value>,
  pub inputs: &'a [(&'a str, &'a Value)],
  pub globals: &'a BTreeMap<String, Value>,
}

impl<'a> Scope<'a> {
  pub fn lookup(&self, name: &str) -> Option<&'a Value> {
    self
      .locals
      .get(name)
      .or_else(|| {
        self
          .inputs
          .iter()
          .find(|(input, _)| *input == name)
          .map(|(_, value)| *value)
      })
      .or_else(|| self.globals.get(name))
  }

  /// Every visible name as JSON, with the lookup order's precedence.
  pub fn to_json(&self) -> serde_json::Value {
    let mut context = serde_json::Map::new();
    for (name, value) in self.globals {
      context.insert(name.clone(), value.to_json());
    }
    for (name, value) in self.inputs {
      context.insert(name.to_string(), value.to_json());
    }
    for (name, value) in self.locals {
      context.insert(name.clone(), value.to_json());
    }
    serde_json::Value::Object(context)
  }
}

/// Where an assignable property writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignTarget {
  Local(String),
  Global(String),
}

/// Resolves property expressions to values.
///
/// Evaluation must be synchronous and must not touch the graph. Failures are
/// human readable reasons.
pub trait ExpressionEvaluator {
  fn eval(&self, expression: &str, scope: &Scope<'_>) -> Result<Value, String>;

  fn resolve_target(&self, expression: &str, scope: &Scope<'_>) -> Result<AssignTarget, String>;
}

/// Default evaluator backed by minijinja.
#[derive(Debug)]
pub struct TemplateEvaluator {
  env: Environment<'static>,
}

impl Default for TemplateEvaluator {
  fn default() -> Self {
    Self::new()
  }
}

impl TemplateEvaluator {
  pub fn new() -> Self {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    Self { env }
  }
}

impl ExpressionEvaluator for TemplateEvaluator {
  fn eval(&self, expression: &str, scope: &Scope<'_>) -> Result<Value, String> {
    let expression = expression.trim();
    if expression.is_empty() {
      return Ok(Value::Undefined);
    }

    if let Some(path) = variable_path(expression) {
      if let Some(root) = scope.lookup(path[0]) {
        return root
          .field_path(&path[1..])
          .cloned()
          .ok_or_else(|| format!("'{expression}' does not resolve to a field"));
      }
      return Err(format!("unknown variable '{}'", path[0]));
    }

    let compiled = self
      .env
      .compile_expression(expression)
      .map_err(|e| e.to_string())?;
    let result = compiled
      .eval(minijinja::Value::from_serialize(scope.to_json()))
      .map_err(|e| e.to_string())?;

    if result.is_undefined() {
      return Ok(Value::Undefined);
    }
    let json = serde_json::to_value(&result).map_err(|e| e.to_string())?;
    Ok(Value::from(&json))
  }

  fn resolve_target(&self, expression: &str, scope: &Scope<'_>) -> Result<AssignTarget, String> {
    let name = expression.trim();
    if !is_identifier(name) {
      return Err(format!("'{name}' is not an assignable variable"));
    }

    if scope.locals.contains_key(name) {
      Ok(AssignTarget::Local(name.to_string()))
    } else if scope.globals.contains_key(name) {
      Ok(AssignTarget::Global(name.to_string()))
    } else {
      Err(format!("unknown variable '{name}'"))
    }
  }
}

const KEYWORDS: &[&str] = &["true", "false", "none", "True", "False", "None"];

/// Split `a.b.c` into segments when every segment is an identifier.
fn variable_path(expression: &str) -> Option<Vec<&str>> {
  let path: Vec<&str> = expression.split('.').collect();
  if path.iter().all(|s| is_identifier(s)) && !KEYWORDS.contains(&path[0]) {
    Some(path)
  } else {
    None
  }
}

fn is_identifier(s: &str) -> bool {
  let mut chars = s.chars();
  match chars.next() {
    Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
    _ => return false,
  }
  chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
