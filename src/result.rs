//! Execution outcomes and their one-line confirmations.
//!
//! [`ExecutionResult`] is the closed variant set describing what a dispatched
//! command did. [`ExecutionResult::confirmation`] is the pure mapping from
//! variant to the single human-readable line the UI speaks or shows.

use crate::repo::{Atom, SearchHit};
use crate::session::SessionSummary;

/// The outcome of dispatching one function call.
#[derive(Debug, Clone)]
pub enum ExecutionResult {
    Created(Atom),
    Updated(Atom),
    Deleted { id: String },
    Searched(Vec<SearchHit>),
    BatchCreated { count: usize },
    Navigated { destination: String },
    PanelToggled { panel: String },
    /// Answer to a level-system or status query.
    QueryResponse { text: String },
    SessionStarted { minutes: u32 },
    SessionStopped(SessionSummary),
    SessionExtended { total_minutes: u32 },
    WorkoutLogged { workout_type: String },
    MoodLogged { valence: f32, energy: f32 },
    AnalysisTriggered { analysis_id: String },
    /// Free-form cloud synthesis, spoken verbatim.
    Synthesized { text: String },
}

impl ExecutionResult {
    /// The one-line confirmation for this outcome. Pure, no side effects.
    pub fn confirmation(&self) -> String {
        match self {
            Self::Created(atom) => format!("Created {} \"{}\"", atom.atom_type, atom.title),
            Self::Updated(atom) => format!("Updated \"{}\"", atom.title),
            Self::Deleted { .. } => "Deleted".to_string(),
            Self::Searched(hits) => format!("Found {} results", hits.len()),
            Self::BatchCreated { count } => format!("Created {count} items"),
            Self::Navigated { destination } => format!("Going to {destination}"),
            Self::PanelToggled { panel } => format!("Toggled {panel}"),
            Self::QueryResponse { text } => text.clone(),
            Self::SessionStarted { minutes } => {
                format!("Deep work started, {minutes} minutes on the clock")
            }
            Self::SessionStopped(summary) => {
                format!("Session done after {} minutes", summary.elapsed_minutes)
            }
            Self::SessionExtended { total_minutes } => {
                format!("Extended, {total_minutes} minutes total")
            }
            Self::WorkoutLogged { workout_type } => format!("Logged your {workout_type}"),
            Self::MoodLogged { valence, .. } => {
                if *valence >= 0.3 {
                    "Glad to hear it, mood logged".to_string()
                } else if *valence <= -0.3 {
                    "Noted, hope things look up".to_string()
                } else {
                    "Mood logged".to_string()
                }
            }
            Self::AnalysisTriggered { .. } => "Deep analysis started, results soon".to_string(),
            Self::Synthesized { text } => text.clone(),
        }
    }
}
