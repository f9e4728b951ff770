//! Repository interface consumed by the tool executor.
//!
//! The executor treats persistence as an external collaborator: it only needs
//! create/update/delete/search plus two small lookups. [`MemoryRepository`]
//! is the in-process implementation used by tests and the CLI.

use std::collections::BTreeMap;
use std::sync::Mutex;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a repository implementation may report. The executor wraps these
/// as `ExecError::ExecutionFailed`.
#[derive(Debug, Error, Diagnostic)]
pub enum RepoError {
    #[error("atom not found: {id}")]
    #[diagnostic(
        code(voxa::repo::not_found),
        help("The atom id does not exist. It may have been deleted.")
    )]
    NotFound { id: String },

    #[error("storage failure: {message}")]
    #[diagnostic(
        code(voxa::repo::storage),
        help("The backing store reported an error. Check its logs.")
    )]
    Storage { message: String },
}

/// Result type for repository operations.
pub type RepoResult<T> = std::result::Result<T, RepoError>;

/// A persisted entity: idea, task, note, or project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub id: String,
    pub atom_type: String,
    pub title: String,
    pub body: Option<String>,
    pub project: Option<String>,
    /// Opaque payload passed through by the executor, never interpreted.
    pub metadata: serde_json::Value,
}

/// Fields for a new atom.
#[derive(Debug, Clone, Default)]
pub struct AtomDraft {
    pub atom_type: String,
    pub title: String,
    pub body: Option<String>,
    pub project: Option<String>,
    pub metadata: serde_json::Value,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct AtomPatch {
    pub title: Option<String>,
    pub body: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// A scored search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub atom: Atom,
    pub score: f32,
}

/// The persistence interface the executor dispatches against.
pub trait Repository: Send + Sync {
    fn create(&self, draft: AtomDraft) -> RepoResult<Atom>;
    fn update(&self, id: &str, patch: AtomPatch) -> RepoResult<Atom>;
    fn delete(&self, id: &str) -> RepoResult<()>;
    fn search(&self, query: &str, types: Option<&[String]>) -> RepoResult<Vec<SearchHit>>;
    /// Case-insensitive fuzzy lookup of a project by spoken name.
    fn fuzzy_find_project(&self, name: &str) -> RepoResult<Option<Atom>>;
    /// Id of the most recently created atom, if any.
    fn last_created_id(&self) -> Option<String>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// Simple in-process repository for tests and the CLI.
pub struct MemoryRepository {
    inner: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    atoms: BTreeMap<String, Atom>,
    next_id: u64,
    last_created: Option<String>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryState::default()),
        }
    }

    /// Number of stored atoms.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("repository lock poisoned").atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for MemoryRepository {
    fn create(&self, draft: AtomDraft) -> RepoResult<Atom> {
        let mut state = self.inner.lock().expect("repository lock poisoned");
        state.next_id += 1;
        let id = format!("atom-{}", state.next_id);
        let atom = Atom {
            id: id.clone(),
            atom_type: draft.atom_type,
            title: draft.title,
            body: draft.body,
            project: draft.project,
            metadata: draft.metadata,
        };
        state.atoms.insert(id.clone(), atom.clone());
        state.last_created = Some(id);
        Ok(atom)
    }

    fn update(&self, id: &str, patch: AtomPatch) -> RepoResult<Atom> {
        let mut state = self.inner.lock().expect("repository lock poisoned");
        let atom = state.atoms.get_mut(id).ok_or_else(|| RepoError::NotFound {
            id: id.to_string(),
        })?;
        if let Some(title) = patch.title {
            atom.title = title;
        }
        if let Some(body) = patch.body {
            atom.body = Some(body);
        }
        if let Some(metadata) = patch.metadata {
            atom.metadata = metadata;
        }
        Ok(atom.clone())
    }

    fn delete(&self, id: &str) -> RepoResult<()> {
        let mut state = self.inner.lock().expect("repository lock poisoned");
        state
            .atoms
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepoError::NotFound { id: id.to_string() })
    }

    fn search(&self, query: &str, types: Option<&[String]>) -> RepoResult<Vec<SearchHit>> {
        let state = self.inner.lock().expect("repository lock poisoned");
        let needle = query.to_lowercase();
        let mut hits: Vec<SearchHit> = state
            .atoms
            .values()
            .filter(|a| {
                types
                    .map(|ts| ts.iter().any(|t| t == &a.atom_type))
                    .unwrap_or(true)
            })
            .filter_map(|a| {
                let haystack = format!(
                    "{} {}",
                    a.title.to_lowercase(),
                    a.body.as_deref().unwrap_or("").to_lowercase()
                );
                if haystack.contains(&needle) {
                    // Crude relevance: earlier matches score higher.
                    let pos = haystack.find(&needle).unwrap_or(haystack.len());
                    let score = 1.0 - (pos as f32 / (haystack.len().max(1)) as f32);
                    Some(SearchHit {
                        atom: a.clone(),
                        score,
                    })
                } else {
                    None
                }
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(hits)
    }

    fn fuzzy_find_project(&self, name: &str) -> RepoResult<Option<Atom>> {
        let state = self.inner.lock().expect("repository lock poisoned");
        let needle = name.to_lowercase();
        Ok(state
            .atoms
            .values()
            .filter(|a| a.atom_type == "project")
            .find(|a| {
                let t = a.title.to_lowercase();
                t == needle || t.contains(&needle) || needle.contains(&t)
            })
            .cloned())
    }

    fn last_created_id(&self) -> Option<String> {
        self.inner
            .lock()
            .expect("repository lock poisoned")
            .last_created
            .clone()
    }
}

impl std::fmt::Debug for MemoryRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRepository")
            .field("atoms", &self.len())
            .finish()
    }
}
