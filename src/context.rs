//! Read-only situational context attached to each utterance.
//!
//! The context disambiguates target references ("this", "the current project")
//! and is injected verbatim into the model's system prompt.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The UI section the user is looking at when they speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Section {
    Home,
    Canvas,
    FocusMode,
    Projects,
    Journal,
    Health,
    Settings,
}

impl Section {
    /// Label used in prompts and navigation payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Canvas => "canvas",
            Self::FocusMode => "focusMode",
            Self::Projects => "projects",
            Self::Journal => "journal",
            Self::Health => "health",
            Self::Settings => "settings",
        }
    }
}

/// Situational context for a single utterance. Consumed read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceContext {
    /// Current UI section.
    pub section: Section,
    /// Atom currently open in the editor, if any.
    pub editing_atom: Option<String>,
    /// Project the user is working inside, if any.
    pub current_project: Option<String>,
    /// Current date, rendered ISO-8601 in prompts.
    pub date: NaiveDate,
}

impl VoiceContext {
    /// Context for a section with nothing open.
    pub fn new(section: Section, date: NaiveDate) -> Self {
        Self {
            section,
            editing_atom: None,
            current_project: None,
            date,
        }
    }

    /// Builder: set the atom being edited.
    pub fn editing(mut self, atom_id: impl Into<String>) -> Self {
        self.editing_atom = Some(atom_id.into());
        self
    }

    /// Builder: set the current project.
    pub fn in_project(mut self, project_id: impl Into<String>) -> Self {
        self.current_project = Some(project_id.into());
        self
    }
}
