//! Tool executor: dispatch table mapping every [`FunctionName`] to a handler.
//!
//! The executor is a thin dispatcher. All real work lives in collaborators
//! (repository, session handler, cloud client, UI bus) wired in once at
//! construction; handlers are free functions grouped by concern in the
//! submodules. The table is built eagerly so a missing registration is caught
//! by the completeness test, not at dispatch time.

mod atoms;
mod panels;
mod sessions;
mod wellness;

pub use wellness::{mood_to_scores, LevelSnapshot};

use std::collections::HashMap;
use std::sync::Arc;

use crate::call::{FunctionCall, FunctionName, FunctionParameter};
use crate::cloud::CloudClient;
use crate::context::VoiceContext;
use crate::error::{ExecError, ExecResult, VoxResult};
use crate::events::UiEventBus;
use crate::repo::Repository;
use crate::result::ExecutionResult;
use crate::session::SessionHandler;

type HandlerFn = fn(&ToolExecutor, &FunctionCall, &VoiceContext) -> VoxResult<ExecutionResult>;

/// Executes validated function calls against the wired collaborators.
pub struct ToolExecutor {
    repo: Option<Arc<dyn Repository>>,
    sessions: Option<Arc<dyn SessionHandler>>,
    cloud: Option<Arc<dyn CloudClient>>,
    ui: Arc<UiEventBus>,
    levels: Option<LevelSnapshot>,
    table: HashMap<FunctionName, HandlerFn>,
}

/// Builder for [`ToolExecutor`]; collaborators are set once, before any
/// dispatch happens.
#[derive(Default)]
pub struct ToolExecutorBuilder {
    repo: Option<Arc<dyn Repository>>,
    sessions: Option<Arc<dyn SessionHandler>>,
    cloud: Option<Arc<dyn CloudClient>>,
    ui: Option<Arc<UiEventBus>>,
    levels: Option<LevelSnapshot>,
}

impl ToolExecutorBuilder {
    pub fn repository(mut self, repo: Arc<dyn Repository>) -> Self {
        self.repo = Some(repo);
        self
    }

    pub fn sessions(mut self, sessions: Arc<dyn SessionHandler>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn cloud(mut self, cloud: Arc<dyn CloudClient>) -> Self {
        self.cloud = Some(cloud);
        self
    }

    pub fn ui(mut self, ui: Arc<UiEventBus>) -> Self {
        self.ui = Some(ui);
        self
    }

    /// Level-system data for status queries. Without it those queries get a
    /// generic response rather than failing.
    pub fn levels(mut self, levels: LevelSnapshot) -> Self {
        self.levels = Some(levels);
        self
    }

    pub fn build(self) -> ToolExecutor {
        ToolExecutor {
            repo: self.repo,
            sessions: self.sessions,
            cloud: self.cloud,
            ui: self.ui.unwrap_or_else(|| Arc::new(UiEventBus::disconnected())),
            levels: self.levels,
            table: ToolExecutor::dispatch_table(),
        }
    }
}

impl ToolExecutor {
    pub fn builder() -> ToolExecutorBuilder {
        ToolExecutorBuilder::default()
    }

    /// One entry per name in the closed enumeration. The completeness test
    /// below asserts nothing is missing.
    fn dispatch_table() -> HashMap<FunctionName, HandlerFn> {
        let mut table: HashMap<FunctionName, HandlerFn> = HashMap::new();
        table.insert(FunctionName::CreateAtom, atoms::create_atom);
        table.insert(FunctionName::UpdateAtom, atoms::update_atom);
        table.insert(FunctionName::DeleteAtom, atoms::delete_atom);
        table.insert(FunctionName::SearchAtoms, atoms::search_atoms);
        table.insert(FunctionName::BatchCreate, atoms::batch_create);
        table.insert(FunctionName::Navigate, panels::navigate);
        table.insert(FunctionName::TogglePanel, panels::toggle_panel);
        table.insert(FunctionName::StartDeepWork, sessions::start_deep_work);
        table.insert(FunctionName::StopDeepWork, sessions::stop_deep_work);
        table.insert(FunctionName::ExtendDeepWork, sessions::extend_deep_work);
        table.insert(FunctionName::QueryLevelSystem, wellness::query_level_system);
        table.insert(FunctionName::LogWorkout, wellness::log_workout);
        table.insert(FunctionName::LogMood, wellness::log_mood);
        table.insert(
            FunctionName::TriggerCorrelationAnalysis,
            wellness::trigger_correlation_analysis,
        );
        table
    }

    /// Dispatch one validated call to its handler.
    pub fn dispatch(
        &self,
        call: &FunctionCall,
        ctx: &VoiceContext,
    ) -> VoxResult<ExecutionResult> {
        let handler = self.table.get(&call.name()).ok_or_else(|| {
            ExecError::UnhandledFunction {
                name: call.name().to_string(),
            }
        })?;
        tracing::debug!(function = %call.name(), "dispatching");
        handler(self, call, ctx)
    }

    // -- collaborator access --------------------------------------------------

    fn repo(&self) -> ExecResult<&dyn Repository> {
        self.repo.as_deref().ok_or_else(|| ExecError::MissingDependency {
            what: "repository".into(),
        })
    }

    fn sessions(&self) -> ExecResult<&dyn SessionHandler> {
        self.sessions.as_deref().ok_or_else(|| ExecError::MissingDependency {
            what: "session handler".into(),
        })
    }

    fn cloud(&self) -> ExecResult<&dyn CloudClient> {
        self.cloud.as_deref().ok_or_else(|| ExecError::MissingDependency {
            what: "cloud client".into(),
        })
    }

    fn ui(&self) -> &UiEventBus {
        &self.ui
    }

    fn levels(&self) -> Option<&LevelSnapshot> {
        self.levels.as_ref()
    }

    // -- shared helpers -------------------------------------------------------

    /// Resolve a `target` parameter to a concrete atom id.
    ///
    /// `context` needs an open editor atom, `lastCreated` needs a prior
    /// creation. `firstResult` always fails: there is no cross-request search
    /// memory, so the reference cannot be resolved honestly.
    fn resolve_target(&self, target: &str, ctx: &VoiceContext) -> ExecResult<String> {
        match target {
            "context" => ctx.editing_atom.clone().ok_or(ExecError::NoContextTarget),
            "lastCreated" => self.repo()?.last_created_id().ok_or(ExecError::NoLastCreated),
            "firstResult" => Err(ExecError::SearchRequired),
            id => Ok(id.to_string()),
        }
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("has_repo", &self.repo.is_some())
            .field("has_sessions", &self.sessions.is_some())
            .field("has_cloud", &self.cloud.is_some())
            .field("functions", &self.table.len())
            .finish()
    }
}

/// A string parameter that validation guaranteed present; its absence here is
/// a handler/table mismatch, reported as an execution failure.
fn str_param(call: &FunctionCall, key: &str) -> ExecResult<String> {
    call.get(key)
        .and_then(FunctionParameter::str_value)
        .ok_or_else(|| ExecError::ExecutionFailed {
            message: format!("parameter \"{key}\" is missing or not a string"),
        })
}

/// Optional string parameter; absent or non-string reads as `None`.
fn opt_str_param(call: &FunctionCall, key: &str) -> Option<String> {
    call.get(key).and_then(FunctionParameter::str_value)
}
