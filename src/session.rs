//! Timed work-session collaborator interface.
//!
//! The executor owns no session state; it delegates start/stop/extend to a
//! [`SessionHandler`]. [`ClockSessionHandler`] is the in-process
//! implementation used by tests and the CLI.

use std::sync::Mutex;
use std::time::Instant;

use miette::Diagnostic;
use thiserror::Error;

/// Errors a session handler may report. The executor wraps these as
/// `ExecError::ExecutionFailed`.
#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error("no session is active")]
    #[diagnostic(
        code(voxa::session::none_active),
        help("Start a session before stopping or extending one.")
    )]
    NoneActive,

    #[error("a session is already running ({remaining_minutes} minutes left)")]
    #[diagnostic(
        code(voxa::session::already_active),
        help("Stop or extend the current session instead of starting another.")
    )]
    AlreadyActive { remaining_minutes: u32 },
}

/// Result type for session operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Summary returned when a session ends.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    /// Minutes actually elapsed.
    pub elapsed_minutes: u32,
    /// Minutes the session was planned for.
    pub planned_minutes: u32,
}

/// The session collaborator the executor dispatches to.
pub trait SessionHandler: Send + Sync {
    /// Start a session. `duration_minutes` defaults per implementation;
    /// `pomodoro` requests the fixed 25-minute pomodoro shape.
    fn start_session(&self, duration_minutes: Option<u32>, pomodoro: bool)
        -> SessionResult<u32>;
    fn stop_session(&self) -> SessionResult<SessionSummary>;
    /// Extend the running session; returns the new total planned minutes.
    fn extend_session(&self, additional_minutes: u32) -> SessionResult<u32>;
}

// ---------------------------------------------------------------------------
// In-process implementation
// ---------------------------------------------------------------------------

const DEFAULT_MINUTES: u32 = 50;
const POMODORO_MINUTES: u32 = 25;

struct ActiveSession {
    started: Instant,
    planned_minutes: u32,
}

/// Wall-clock session handler with a single mutex-guarded active session.
pub struct ClockSessionHandler {
    active: Mutex<Option<ActiveSession>>,
}

impl ClockSessionHandler {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
        }
    }
}

impl Default for ClockSessionHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandler for ClockSessionHandler {
    fn start_session(
        &self,
        duration_minutes: Option<u32>,
        pomodoro: bool,
    ) -> SessionResult<u32> {
        let mut guard = self.active.lock().expect("session lock poisoned");
        if let Some(session) = guard.as_ref() {
            let elapsed = (session.started.elapsed().as_secs() / 60) as u32;
            return Err(SessionError::AlreadyActive {
                remaining_minutes: session.planned_minutes.saturating_sub(elapsed),
            });
        }
        let minutes = if pomodoro {
            POMODORO_MINUTES
        } else {
            duration_minutes.unwrap_or(DEFAULT_MINUTES)
        };
        *guard = Some(ActiveSession {
            started: Instant::now(),
            planned_minutes: minutes,
        });
        tracing::info!(minutes, pomodoro, "deep work session started");
        Ok(minutes)
    }

    fn stop_session(&self) -> SessionResult<SessionSummary> {
        let mut guard = self.active.lock().expect("session lock poisoned");
        let session = guard.take().ok_or(SessionError::NoneActive)?;
        Ok(SessionSummary {
            elapsed_minutes: (session.started.elapsed().as_secs() / 60) as u32,
            planned_minutes: session.planned_minutes,
        })
    }

    fn extend_session(&self, additional_minutes: u32) -> SessionResult<u32> {
        let mut guard = self.active.lock().expect("session lock poisoned");
        let session = guard.as_mut().ok_or(SessionError::NoneActive)?;
        session.planned_minutes += additional_minutes;
        Ok(session.planned_minutes)
    }
}

impl std::fmt::Debug for ClockSessionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let active = self.active.lock().map(|g| g.is_some()).unwrap_or(false);
        f.debug_struct("ClockSessionHandler").field("active", &active).finish()
    }
}
