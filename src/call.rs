//! Structured function calls: the canonical command extracted from a model's
//! text output or the deterministic pattern matcher.
//!
//! A [`FunctionCall`] pairs a name from the closed [`FunctionName`] enumeration
//! with an ordered map of [`FunctionParameter`] values. Calls are immutable
//! once constructed and consumed exactly once by the executor.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// FunctionName
// ---------------------------------------------------------------------------

/// The closed enumeration of dispatchable function names.
///
/// Every name maps to exactly one executor handler; the completeness test in
/// `exec` asserts that at startup-table level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionName {
    CreateAtom,
    UpdateAtom,
    DeleteAtom,
    SearchAtoms,
    BatchCreate,
    Navigate,
    QueryLevelSystem,
    StartDeepWork,
    StopDeepWork,
    ExtendDeepWork,
    LogWorkout,
    LogMood,
    TogglePanel,
    TriggerCorrelationAnalysis,
}

impl FunctionName {
    /// All function names, in declaration order.
    pub const ALL: [FunctionName; 14] = [
        Self::CreateAtom,
        Self::UpdateAtom,
        Self::DeleteAtom,
        Self::SearchAtoms,
        Self::BatchCreate,
        Self::Navigate,
        Self::QueryLevelSystem,
        Self::StartDeepWork,
        Self::StopDeepWork,
        Self::ExtendDeepWork,
        Self::LogWorkout,
        Self::LogMood,
        Self::TogglePanel,
        Self::TriggerCorrelationAnalysis,
    ];

    /// The wire name used in the model's output grammar.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateAtom => "create_atom",
            Self::UpdateAtom => "update_atom",
            Self::DeleteAtom => "delete_atom",
            Self::SearchAtoms => "search_atoms",
            Self::BatchCreate => "batch_create",
            Self::Navigate => "navigate",
            Self::QueryLevelSystem => "query_level_system",
            Self::StartDeepWork => "start_deep_work",
            Self::StopDeepWork => "stop_deep_work",
            Self::ExtendDeepWork => "extend_deep_work",
            Self::LogWorkout => "log_workout",
            Self::LogMood => "log_mood",
            Self::TogglePanel => "toggle_panel",
            Self::TriggerCorrelationAnalysis => "trigger_correlation_analysis",
        }
    }

    /// Look up a wire name in the closed enumeration.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_str() == name)
    }

    /// Parameter names the executor handler requires as non-optional.
    ///
    /// The validator checks these before any dispatch happens.
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            Self::CreateAtom => &["atom_type", "title"],
            Self::UpdateAtom => &["target"],
            Self::DeleteAtom => &["target"],
            Self::SearchAtoms => &["query"],
            Self::BatchCreate => &["items"],
            Self::Navigate => &["destination"],
            Self::QueryLevelSystem => &["query_type"],
            Self::StartDeepWork => &[],
            Self::StopDeepWork => &[],
            Self::ExtendDeepWork => &["additional_minutes"],
            Self::LogWorkout => &["workout_type"],
            Self::LogMood => &["mood"],
            Self::TogglePanel => &["panel"],
            Self::TriggerCorrelationAnalysis => &["dimensions"],
        }
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FunctionParameter
// ---------------------------------------------------------------------------

/// A typed parameter value.
///
/// Decoding from untyped input tries types in a fixed priority order
/// (null → bool → int → double → string → array → object) so that e.g.
/// `"42"` inside an escape span stays a string while a bare `42` is an int.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FunctionParameter {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    Array(Vec<FunctionParameter>),
    Object(BTreeMap<String, FunctionParameter>),
}

impl FunctionParameter {
    /// Decode a bare (unescaped) token using the fixed priority order.
    pub fn decode_bare(token: &str) -> Self {
        let t = token.trim();
        if t.is_empty() || t == "null" {
            return Self::Null;
        }
        if t == "true" {
            return Self::Bool(true);
        }
        if t == "false" {
            return Self::Bool(false);
        }
        if let Ok(i) = t.parse::<i64>() {
            return Self::Int(i);
        }
        if let Ok(d) = t.parse::<f64>() {
            return Self::Double(d);
        }
        Self::Str(t.to_string())
    }

    /// Decode a JSON value using the same priority order.
    ///
    /// JSON already disambiguates scalars, so this mostly maps shapes; the
    /// priority order matters for numbers (integral doubles become ints).
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Double(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => Self::Str(s.clone()),
            Value::Array(items) => Self::Array(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => Self::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Render back to a JSON value (used for opaque metadata pass-through).
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Double(d) => {
                serde_json::Number::from_f64(*d).map(Value::Number).unwrap_or(Value::Null)
            }
            Self::Str(s) => Value::String(s.clone()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(map) => Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Best-effort integer coercion: ints, truncated doubles, numeric strings.
    pub fn int_value(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Double(d) => Some(*d as i64),
            Self::Str(s) => s.trim().parse::<i64>().ok().or_else(|| {
                s.trim().parse::<f64>().ok().map(|d| d as i64)
            }),
            _ => None,
        }
    }

    /// Best-effort double coercion.
    pub fn double_value(&self) -> Option<f64> {
        match self {
            Self::Double(d) => Some(*d),
            Self::Int(i) => Some(*i as f64),
            Self::Str(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Best-effort boolean coercion ("true"/"false" strings accepted).
    pub fn bool_value(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Str(s) => match s.trim() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// String view: strings as-is, scalars rendered, containers refused.
    pub fn str_value(&self) -> Option<String> {
        match self {
            Self::Str(s) => Some(s.clone()),
            Self::Int(i) => Some(i.to_string()),
            Self::Double(d) => Some(d.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Array view, no coercion.
    pub fn array_value(&self) -> Option<&[FunctionParameter]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Object view, no coercion.
    pub fn object_value(&self) -> Option<&BTreeMap<String, FunctionParameter>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Whether this value is coercible to the named schema type.
    pub fn coercible_to(&self, ty: ParamType) -> bool {
        match ty {
            ParamType::Str => self.str_value().is_some(),
            ParamType::Int => self.int_value().is_some(),
            ParamType::Double => self.double_value().is_some(),
            ParamType::Bool => self.bool_value().is_some(),
            ParamType::Array => self.array_value().is_some(),
            ParamType::Object => self.object_value().is_some(),
        }
    }
}

/// Schema-level parameter types used by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Str,
    Int,
    Double,
    Bool,
    Array,
    Object,
}

/// Expected type of a required parameter, for validation.
pub fn required_param_type(name: &str) -> ParamType {
    match name {
        "items" | "dimensions" => ParamType::Array,
        "additional_minutes" => ParamType::Int,
        _ => ParamType::Str,
    }
}

// ---------------------------------------------------------------------------
// FunctionCall
// ---------------------------------------------------------------------------

/// A validated, structured command. Immutable; equality is structural
/// (raw-text provenance is ignored).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    name: FunctionName,
    /// Ordered parameter map (insertion order is the wire order).
    params: Vec<(String, FunctionParameter)>,
    /// Raw model output this call was parsed from, for debugging.
    #[serde(skip_serializing_if = "Option::is_none")]
    raw: Option<String>,
}

impl FunctionCall {
    /// Construct a call with no parameters.
    pub fn new(name: FunctionName) -> Self {
        Self {
            name,
            params: Vec::new(),
            raw: None,
        }
    }

    /// Builder: append a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: FunctionParameter) -> Self {
        self.params.push((key.into(), value));
        self
    }

    /// Builder: append a string parameter.
    pub fn with_str(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_param(key, FunctionParameter::Str(value.into()))
    }

    /// Builder: attach raw-text provenance.
    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    /// The function name.
    pub fn name(&self) -> FunctionName {
        self.name
    }

    /// Look up a parameter by key.
    pub fn get(&self, key: &str) -> Option<&FunctionParameter> {
        self.params.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Parameters in wire order.
    pub fn params(&self) -> &[(String, FunctionParameter)] {
        &self.params
    }

    /// Raw-text provenance, if this call was parsed from model output.
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }
}

impl PartialEq for FunctionCall {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.params == other.params
    }
}
