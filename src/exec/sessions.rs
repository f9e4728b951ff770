//! Deep-work session handlers. The executor keeps no session state; all
//! three delegate to the wired [`SessionHandler`](crate::session::SessionHandler).

use crate::call::{FunctionCall, FunctionParameter};
use crate::context::VoiceContext;
use crate::error::{ExecError, VoxResult};
use crate::events::{UiEvent, UiEventKind};
use crate::result::ExecutionResult;
use crate::session::SessionError;

use super::ToolExecutor;

fn session_err(e: SessionError) -> ExecError {
    ExecError::ExecutionFailed { message: e.to_string() }
}

pub(super) fn start_deep_work(
    exec: &ToolExecutor,
    call: &FunctionCall,
    _ctx: &VoiceContext,
) -> VoxResult<ExecutionResult> {
    let duration = call
        .get("duration_minutes")
        .and_then(FunctionParameter::int_value)
        .and_then(|m| u32::try_from(m).ok());
    let pomodoro = call
        .get("pomodoro_mode")
        .and_then(FunctionParameter::bool_value)
        .unwrap_or(false);

    let minutes = exec
        .sessions()?
        .start_session(duration, pomodoro)
        .map_err(session_err)?;
    exec.ui().publish(
        UiEvent::new(UiEventKind::SessionChanged)
            .with("state", "started")
            .with("minutes", minutes.to_string()),
    );
    Ok(ExecutionResult::SessionStarted { minutes })
}

pub(super) fn stop_deep_work(
    exec: &ToolExecutor,
    _call: &FunctionCall,
    _ctx: &VoiceContext,
) -> VoxResult<ExecutionResult> {
    let summary = exec.sessions()?.stop_session().map_err(session_err)?;
    exec.ui().publish(
        UiEvent::new(UiEventKind::SessionChanged)
            .with("state", "stopped")
            .with("elapsed_minutes", summary.elapsed_minutes.to_string()),
    );
    Ok(ExecutionResult::SessionStopped(summary))
}

pub(super) fn extend_deep_work(
    exec: &ToolExecutor,
    call: &FunctionCall,
    _ctx: &VoiceContext,
) -> VoxResult<ExecutionResult> {
    let additional = call
        .get("additional_minutes")
        .and_then(FunctionParameter::int_value)
        .and_then(|m| u32::try_from(m).ok())
        .ok_or_else(|| ExecError::ExecutionFailed {
            message: "parameter \"additional_minutes\" is missing or not a positive integer"
                .into(),
        })?;
    let total_minutes = exec
        .sessions()?
        .extend_session(additional)
        .map_err(session_err)?;
    exec.ui().publish(
        UiEvent::new(UiEventKind::SessionChanged)
            .with("state", "extended")
            .with("total_minutes", total_minutes.to_string()),
    );
    Ok(ExecutionResult::SessionExtended { total_minutes })
}
