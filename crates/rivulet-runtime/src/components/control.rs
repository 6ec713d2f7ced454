use rivulet_flow::Value;
use tracing::info;

use crate::context::ComponentContext;
use crate::error::ComponentError;
use crate::state::ExecutionState;

pub(super) fn start(ctx: &mut ComponentContext<'_>) -> Result<(), ComponentError> {
  ctx.propagate_seqout();
  Ok(())
}

/// Ends a called flow and resumes its caller. In a root flow it only logs.
///
/// The value last received on input 1 (or null) goes out on the caller's
/// output 1.
pub(super) fn end(ctx: &mut ComponentContext<'_>) -> Result<(), ComponentError> {
  match ctx.parent() {
    Some(parent) => {
      let value = ctx.input_value(1).cloned().unwrap_or(Value::Null);
      ctx.finish_child_flow(parent, value)
    }
    None => {
      info!(
        flow_state = %ctx.flow_state_id(),
        component = %ctx.component().describe(),
        "flow_ended"
      );
      Ok(())
    }
  }
}

pub(super) fn log(ctx: &mut ComponentContext<'_>) -> Result<(), ComponentError> {
  let value = ctx.eval_property(0, "Value")?;
  info!(
    flow_state = %ctx.flow_state_id(),
    component = %ctx.component().describe(),
    value = %value,
    "log"
  );
  ctx.propagate_seqout();
  Ok(())
}

pub(super) fn set_variable(ctx: &mut ComponentContext<'_>) -> Result<(), ComponentError> {
  let target = ctx.eval_assignable_property(0, "Variable")?;
  let value = ctx.eval_property(1, "Value")?;
  ctx.assign(target, value)?;
  ctx.propagate_seqout();
  Ok(())
}

/// Starts a child flow. The state records the child until its `End` runs.
pub(super) fn call_action(ctx: &mut ComponentContext<'_>, flow: usize) -> Result<(), ComponentError> {
  if ctx.execution_state().is_some() {
    return Err(ComponentError::AlreadyRunning {
      component: ctx.component().describe(),
    });
  }

  let child = ctx.start_child_flow(flow)?;
  ctx.allocate_execution_state(ExecutionState::CallAction { child })?;
  Ok(())
}
