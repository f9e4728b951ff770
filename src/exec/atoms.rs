//! CRUD and batch handlers over the repository.

use crate::call::{FunctionCall, FunctionParameter};
use crate::context::VoiceContext;
use crate::error::{ExecError, ExecResult, VoxResult};
use crate::repo::{AtomDraft, AtomPatch, RepoError};
use crate::result::ExecutionResult;

use super::{opt_str_param, str_param, ToolExecutor};

fn repo_err(e: RepoError) -> ExecError {
    match e {
        RepoError::NotFound { id } => ExecError::ExecutionFailed {
            message: format!("atom {id} not found"),
        },
        RepoError::Storage { message } => ExecError::ExecutionFailed { message },
    }
}

/// Resolve an optional spoken project name to a stored project id.
///
/// Falls back to the context's current project, then to none. An unmatched
/// spoken name is kept verbatim so the atom still lands somewhere findable.
fn resolve_project(
    exec: &ToolExecutor,
    call: &FunctionCall,
    ctx: &VoiceContext,
) -> ExecResult<Option<String>> {
    if let Some(spoken) = opt_str_param(call, "project") {
        let found = exec.repo()?.fuzzy_find_project(&spoken).map_err(repo_err)?;
        return Ok(Some(found.map(|a| a.id).unwrap_or(spoken)));
    }
    Ok(ctx.current_project.clone())
}

pub(super) fn create_atom(
    exec: &ToolExecutor,
    call: &FunctionCall,
    ctx: &VoiceContext,
) -> VoxResult<ExecutionResult> {
    let draft = AtomDraft {
        atom_type: str_param(call, "atom_type")?,
        title: str_param(call, "title")?,
        body: opt_str_param(call, "body"),
        project: resolve_project(exec, call, ctx)?,
        // Opaque pass-through; the executor never interprets metadata.
        metadata: call
            .get("metadata")
            .map(FunctionParameter::to_json)
            .unwrap_or(serde_json::Value::Null),
    };
    let atom = exec.repo()?.create(draft).map_err(repo_err)?;
    tracing::info!(id = %atom.id, atom_type = %atom.atom_type, "atom created");
    Ok(ExecutionResult::Created(atom))
}

pub(super) fn update_atom(
    exec: &ToolExecutor,
    call: &FunctionCall,
    ctx: &VoiceContext,
) -> VoxResult<ExecutionResult> {
    let target = str_param(call, "target")?;
    let id = exec.resolve_target(&target, ctx)?;
    let patch = AtomPatch {
        title: opt_str_param(call, "title"),
        body: opt_str_param(call, "body"),
        metadata: call.get("metadata").map(FunctionParameter::to_json),
    };
    let atom = exec.repo()?.update(&id, patch).map_err(repo_err)?;
    tracing::info!(id = %atom.id, "atom updated");
    Ok(ExecutionResult::Updated(atom))
}

pub(super) fn delete_atom(
    exec: &ToolExecutor,
    call: &FunctionCall,
    ctx: &VoiceContext,
) -> VoxResult<ExecutionResult> {
    let target = str_param(call, "target")?;
    let id = exec.resolve_target(&target, ctx)?;
    exec.repo()?.delete(&id).map_err(repo_err)?;
    tracing::info!(id = %id, "atom deleted");
    Ok(ExecutionResult::Deleted { id })
}

pub(super) fn search_atoms(
    exec: &ToolExecutor,
    call: &FunctionCall,
    _ctx: &VoiceContext,
) -> VoxResult<ExecutionResult> {
    let query = str_param(call, "query")?;
    let types: Option<Vec<String>> = call.get("types").and_then(|p| {
        p.array_value().map(|items| {
            items
                .iter()
                .filter_map(FunctionParameter::str_value)
                .collect()
        })
    });
    let hits = exec
        .repo()?
        .search(&query, types.as_deref())
        .map_err(repo_err)?;
    tracing::debug!(query = %query, hits = hits.len(), "search complete");
    Ok(ExecutionResult::Searched(hits))
}

/// Brain-dump: create each item in order. A malformed item aborts the batch
/// with an error naming its position; items before it are already persisted.
pub(super) fn batch_create(
    exec: &ToolExecutor,
    call: &FunctionCall,
    ctx: &VoiceContext,
) -> VoxResult<ExecutionResult> {
    let items = call
        .get("items")
        .and_then(FunctionParameter::array_value)
        .ok_or_else(|| ExecError::ExecutionFailed {
            message: "parameter \"items\" is missing or not an array".into(),
        })?;

    let project = ctx.current_project.clone();
    let repo = exec.repo()?;
    let mut count = 0usize;
    for (i, item) in items.iter().enumerate() {
        let obj = item.object_value().ok_or_else(|| ExecError::ExecutionFailed {
            message: format!("batch item {i} is not an object"),
        })?;
        let title = obj
            .get("title")
            .and_then(FunctionParameter::str_value)
            .ok_or_else(|| ExecError::ExecutionFailed {
                message: format!("batch item {i} has no title"),
            })?;
        let atom_type = obj
            .get("atom_type")
            .and_then(FunctionParameter::str_value)
            .unwrap_or_else(|| "note".to_string());
        repo.create(AtomDraft {
            atom_type,
            title,
            project: project.clone(),
            ..Default::default()
        })
        .map_err(repo_err)?;
        count += 1;
    }
    tracing::info!(count, "batch create complete");
    Ok(ExecutionResult::BatchCreated { count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::FunctionName;
    use crate::context::Section;
    use crate::error::VoxError;
    use crate::repo::{MemoryRepository, Repository};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn ctx() -> VoiceContext {
        VoiceContext::new(Section::Canvas, NaiveDate::from_ymd_opt(2026, 8, 27).unwrap())
    }

    fn setup() -> (Arc<MemoryRepository>, ToolExecutor) {
        let repo = Arc::new(MemoryRepository::new());
        let exec = ToolExecutor::builder().repository(repo.clone()).build();
        (repo, exec)
    }

    #[test]
    fn create_then_delete_last_created() {
        let (repo, exec) = setup();
        let create = FunctionCall::new(FunctionName::CreateAtom)
            .with_str("atom_type", "idea")
            .with_str("title", "Viral loops");
        let result = exec.dispatch(&create, &ctx()).unwrap();
        assert!(matches!(result, ExecutionResult::Created(_)));
        assert_eq!(repo.len(), 1);

        let delete = FunctionCall::new(FunctionName::DeleteAtom)
            .with_str("target", "lastCreated");
        exec.dispatch(&delete, &ctx()).unwrap();
        assert!(repo.is_empty());
    }

    #[test]
    fn create_resolves_spoken_project_name() {
        let (repo, exec) = setup();
        let project = repo
            .create(crate::repo::AtomDraft {
                atom_type: "project".into(),
                title: "Q3 Launch".into(),
                ..Default::default()
            })
            .unwrap();

        let call = FunctionCall::new(FunctionName::CreateAtom)
            .with_str("atom_type", "task")
            .with_str("title", "draft announcement")
            .with_str("project", "q3 launch");
        let result = exec.dispatch(&call, &ctx()).unwrap();
        match result {
            ExecutionResult::Created(atom) => {
                assert_eq!(atom.project.as_deref(), Some(project.id.as_str()))
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn create_inherits_context_project() {
        let (_repo, exec) = setup();
        let call = FunctionCall::new(FunctionName::CreateAtom)
            .with_str("atom_type", "note")
            .with_str("title", "standup notes");
        let result = exec.dispatch(&call, &ctx().in_project("proj-7")).unwrap();
        match result {
            ExecutionResult::Created(atom) => {
                assert_eq!(atom.project.as_deref(), Some("proj-7"))
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn update_context_target_uses_editing_atom() {
        let (repo, exec) = setup();
        let atom = repo
            .create(crate::repo::AtomDraft {
                atom_type: "task".into(),
                title: "old title".into(),
                ..Default::default()
            })
            .unwrap();
        let call = FunctionCall::new(FunctionName::UpdateAtom)
            .with_str("target", "context")
            .with_str("title", "new title");
        let result = exec.dispatch(&call, &ctx().editing(&atom.id)).unwrap();
        match result {
            ExecutionResult::Updated(updated) => assert_eq!(updated.title, "new title"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn metadata_passes_through_opaquely() {
        let (repo, exec) = setup();
        let mut meta = BTreeMap::new();
        meta.insert("energy".to_string(), FunctionParameter::Int(3));
        let call = FunctionCall::new(FunctionName::CreateAtom)
            .with_str("atom_type", "idea")
            .with_str("title", "x")
            .with_param("metadata", FunctionParameter::Object(meta));
        exec.dispatch(&call, &ctx()).unwrap();
        let id = repo.last_created_id().unwrap();
        let hits = repo.search("x", None).unwrap();
        assert_eq!(hits[0].atom.id, id);
        assert_eq!(hits[0].atom.metadata["energy"], serde_json::json!(3));
    }

    #[test]
    fn batch_create_counts_items() {
        let (repo, exec) = setup();
        let items = FunctionParameter::Array(
            ["call Sam", "send invoice", "book flights"]
                .iter()
                .map(|t| {
                    let mut obj = BTreeMap::new();
                    obj.insert("atom_type".into(), FunctionParameter::Str("task".into()));
                    obj.insert("title".into(), FunctionParameter::Str((*t).into()));
                    FunctionParameter::Object(obj)
                })
                .collect(),
        );
        let call = FunctionCall::new(FunctionName::BatchCreate).with_param("items", items);
        let result = exec.dispatch(&call, &ctx()).unwrap();
        assert!(matches!(result, ExecutionResult::BatchCreated { count: 3 }));
        assert_eq!(repo.len(), 3);
    }

    #[test]
    fn batch_item_without_title_fails_naming_position() {
        let (_repo, exec) = setup();
        let items = FunctionParameter::Array(vec![FunctionParameter::Object(BTreeMap::new())]);
        let call = FunctionCall::new(FunctionName::BatchCreate).with_param("items", items);
        let err = exec.dispatch(&call, &ctx()).unwrap_err();
        match err {
            VoxError::Exec(ExecError::ExecutionFailed { message }) => {
                assert!(message.contains("item 0"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn search_with_type_filter() {
        let (repo, exec) = setup();
        for (ty, title) in [("idea", "marketing plan"), ("task", "marketing email")] {
            repo.create(crate::repo::AtomDraft {
                atom_type: ty.into(),
                title: title.into(),
                ..Default::default()
            })
            .unwrap();
        }
        let call = FunctionCall::new(FunctionName::SearchAtoms)
            .with_str("query", "marketing")
            .with_param(
                "types",
                FunctionParameter::Array(vec![FunctionParameter::Str("idea".into())]),
            );
        let result = exec.dispatch(&call, &ctx()).unwrap();
        match result {
            ExecutionResult::Searched(hits) => {
                assert_eq!(hits.len(), 1);
                assert_eq!(hits[0].atom.atom_type, "idea");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
