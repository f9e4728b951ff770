//! Level-system queries, workout/mood logging, and the one cloud escalation.

use std::collections::BTreeMap;

use crate::call::{FunctionCall, FunctionParameter};
use crate::context::VoiceContext;
use crate::error::{CloudError, VoxResult};
use crate::events::{UiEvent, UiEventKind};
use crate::repo::AtomDraft;
use crate::result::ExecutionResult;

use super::{opt_str_param, str_param, ToolExecutor};

// ---------------------------------------------------------------------------
// Level queries
// ---------------------------------------------------------------------------

/// Point-in-time level-system data the executor answers status queries from.
#[derive(Debug, Clone, Default)]
pub struct LevelSnapshot {
    pub level: u32,
    pub xp_today: u32,
    pub streak_days: u32,
    pub readiness: Option<f32>,
    pub sleep_score: Option<u32>,
    /// Per-dimension levels, keyed by dimension name.
    pub dimensions: BTreeMap<String, u32>,
}

/// Status queries never fail: unknown query types and missing data both
/// degrade to a generic response.
pub(super) fn query_level_system(
    exec: &ToolExecutor,
    call: &FunctionCall,
    _ctx: &VoiceContext,
) -> VoxResult<ExecutionResult> {
    let query_type = str_param(call, "query_type")?;
    let Some(levels) = exec.levels() else {
        return Ok(ExecutionResult::QueryResponse {
            text: "I don't have level data to hand right now".into(),
        });
    };

    let text = match query_type.as_str() {
        "levelStatus" => format!(
            "You're level {} with a {}-day streak",
            levels.level, levels.streak_days
        ),
        "dimensionStatus" => {
            let dimension = opt_str_param(call, "dimension");
            match dimension.as_deref().and_then(|d| levels.dimensions.get(d)) {
                Some(lvl) => format!(
                    "{} is at level {lvl}",
                    dimension.as_deref().unwrap_or("that dimension")
                ),
                None => "I don't have data for that dimension".into(),
            }
        }
        "readinessScore" => match levels.readiness {
            Some(r) => format!("Readiness is {:.0} percent", r * 100.0),
            None => "No readiness score yet today".into(),
        },
        "sleepScore" => match levels.sleep_score {
            Some(s) => format!("Sleep score was {s}"),
            None => "No sleep data yet".into(),
        },
        "dailySummary" => format!(
            "{} XP today, level {}, streak {} days",
            levels.xp_today, levels.level, levels.streak_days
        ),
        "weeklySummary" => format!(
            "Level {} overall with {} dimensions tracked",
            levels.level,
            levels.dimensions.len()
        ),
        other => {
            tracing::debug!(query_type = %other, "unknown level query, degrading");
            "I can check your level, dimensions, readiness, sleep, or summaries".into()
        }
    };
    Ok(ExecutionResult::QueryResponse { text })
}

// ---------------------------------------------------------------------------
// Workout / mood logging
// ---------------------------------------------------------------------------

pub(super) fn log_workout(
    exec: &ToolExecutor,
    call: &FunctionCall,
    ctx: &VoiceContext,
) -> VoxResult<ExecutionResult> {
    let workout_type = str_param(call, "workout_type")?;
    let mut metadata = serde_json::Map::new();
    if let Some(km) = call.get("distance_km").and_then(FunctionParameter::double_value) {
        metadata.insert("distance_km".into(), serde_json::json!(km));
    }
    if let Some(mins) = call
        .get("duration_minutes")
        .and_then(FunctionParameter::int_value)
    {
        metadata.insert("duration_minutes".into(), serde_json::json!(mins));
    }
    if let Some(sets) = call.get("sets").and_then(FunctionParameter::int_value) {
        metadata.insert("sets".into(), serde_json::json!(sets));
    }
    metadata.insert("date".into(), serde_json::json!(ctx.date.to_string()));

    exec.repo()?
        .create(AtomDraft {
            atom_type: "workout".into(),
            title: workout_type.clone(),
            metadata: serde_json::Value::Object(metadata),
            ..Default::default()
        })
        .map_err(|e| crate::error::ExecError::ExecutionFailed { message: e.to_string() })?;
    tracing::info!(workout_type = %workout_type, "workout logged");
    Ok(ExecutionResult::WorkoutLogged { workout_type })
}

/// Map a spoken or emoji mood to (valence, energy), both in [-1, 1] and
/// [0, 1] respectively. Unmapped input gets the neutral default.
pub fn mood_to_scores(mood: &str) -> (f32, f32) {
    match mood.trim().to_lowercase().as_str() {
        "😊" | "happy" | "great" | "good" | "excited" => (0.8, 0.7),
        "🔥" | "energized" | "pumped" | "motivated" => (0.7, 0.9),
        "😌" | "calm" | "relaxed" | "content" => (0.5, 0.3),
        "😐" | "okay" | "fine" | "meh" | "neutral" => (0.0, 0.4),
        "😴" | "tired" | "exhausted" | "drained" => (-0.2, 0.1),
        "😰" | "anxious" | "stressed" | "overwhelmed" => (-0.5, 0.7),
        "😢" | "sad" | "down" | "low" => (-0.7, 0.2),
        "😡" | "angry" | "frustrated" | "annoyed" => (-0.6, 0.8),
        _ => (0.0, 0.5),
    }
}

pub(super) fn log_mood(
    exec: &ToolExecutor,
    call: &FunctionCall,
    ctx: &VoiceContext,
) -> VoxResult<ExecutionResult> {
    let mood = str_param(call, "mood")?;
    let (valence, energy) = mood_to_scores(&mood);

    let mut metadata = serde_json::Map::new();
    metadata.insert("valence".into(), serde_json::json!(valence));
    metadata.insert("energy".into(), serde_json::json!(energy));
    metadata.insert("date".into(), serde_json::json!(ctx.date.to_string()));
    if let Some(note) = opt_str_param(call, "note") {
        metadata.insert("note".into(), serde_json::json!(note));
    }

    exec.repo()?
        .create(AtomDraft {
            atom_type: "mood".into(),
            title: mood.clone(),
            metadata: serde_json::Value::Object(metadata),
            ..Default::default()
        })
        .map_err(|e| crate::error::ExecError::ExecutionFailed { message: e.to_string() })?;

    exec.ui().publish(
        UiEvent::new(UiEventKind::MoodLogged)
            .with("valence", valence.to_string())
            .with("energy", energy.to_string()),
    );
    tracing::info!(mood = %mood, valence, energy, "mood logged");
    Ok(ExecutionResult::MoodLogged { valence, energy })
}

// ---------------------------------------------------------------------------
// Cloud escalation
// ---------------------------------------------------------------------------

pub(super) fn trigger_correlation_analysis(
    exec: &ToolExecutor,
    call: &FunctionCall,
    _ctx: &VoiceContext,
) -> VoxResult<ExecutionResult> {
    let dimensions: Vec<String> = call
        .get("dimensions")
        .and_then(FunctionParameter::array_value)
        .map(|items| items.iter().filter_map(FunctionParameter::str_value).collect())
        .unwrap_or_default();
    let reason = opt_str_param(call, "reason");

    // Escalation is the one function that genuinely needs the cloud; absence
    // surfaces as the cloud error, not a generic dependency failure.
    let cloud = exec.cloud().map_err(|_| CloudError::NotConfigured)?;
    let analysis_id = cloud.trigger_correlation_analysis(&dimensions, reason.as_deref())?;
    tracing::info!(analysis_id = %analysis_id, dimensions = dimensions.len(), "analysis triggered");
    Ok(ExecutionResult::AnalysisTriggered { analysis_id })
}
