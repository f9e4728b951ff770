//! Tier-0 deterministic pattern matcher.
//!
//! A zero-latency, regex-based classifier for the high-frequency command
//! shapes. On a hit the orchestrator converts the structured action into a
//! [`FunctionCall`] via [`action_to_call`] and dispatches it like any other;
//! actions with no function equivalent carry their own answer and bypass the
//! executor entirely.

use regex::Regex;
use std::sync::OnceLock;

use crate::call::{FunctionCall, FunctionName, FunctionParameter};
use crate::context::VoiceContext;

/// A structured action recognized by the deterministic tier.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedAction {
    Create {
        atom_type: String,
        title: String,
    },
    Update {
        target: String,
        title: Option<String>,
    },
    Delete {
        target: String,
    },
    Search {
        query: String,
    },
    Batch {
        titles: Vec<String>,
    },
    Navigate {
        destination: String,
    },
    Query {
        query_type: String,
    },
    /// A direct answer with no function-call equivalent; dispatched as-is.
    Answer {
        text: String,
    },
}

/// The matcher interface the orchestrator consumes.
///
/// Implementations must be pure and fast: no side effects, tier-0 latency.
pub trait PatternMatcher: Send + Sync {
    fn try_match(&self, transcript: &str, ctx: &VoiceContext) -> Option<ParsedAction>;
}

/// Map a structured action to its function-call equivalent.
///
/// Pure function, one case per action kind. `Answer` has no equivalent and
/// returns `None`.
pub fn action_to_call(action: &ParsedAction) -> Option<FunctionCall> {
    match action {
        ParsedAction::Create { atom_type, title } => Some(
            FunctionCall::new(FunctionName::CreateAtom)
                .with_str("atom_type", atom_type.clone())
                .with_str("title", title.clone()),
        ),
        ParsedAction::Update { target, title } => {
            let mut call =
                FunctionCall::new(FunctionName::UpdateAtom).with_str("target", target.clone());
            if let Some(t) = title {
                call = call.with_str("title", t.clone());
            }
            Some(call)
        }
        ParsedAction::Delete { target } => Some(
            FunctionCall::new(FunctionName::DeleteAtom).with_str("target", target.clone()),
        ),
        ParsedAction::Search { query } => Some(
            FunctionCall::new(FunctionName::SearchAtoms).with_str("query", query.clone()),
        ),
        ParsedAction::Batch { titles } => {
            let items = titles
                .iter()
                .map(|t| {
                    let mut obj = std::collections::BTreeMap::new();
                    obj.insert("atom_type".to_string(), FunctionParameter::Str("task".into()));
                    obj.insert("title".to_string(), FunctionParameter::Str(t.clone()));
                    FunctionParameter::Object(obj)
                })
                .collect();
            Some(
                FunctionCall::new(FunctionName::BatchCreate)
                    .with_param("items", FunctionParameter::Array(items)),
            )
        }
        ParsedAction::Navigate { destination } => Some(
            FunctionCall::new(FunctionName::Navigate)
                .with_str("destination", destination.clone()),
        ),
        ParsedAction::Query { query_type } => Some(
            FunctionCall::new(FunctionName::QueryLevelSystem)
                .with_str("query_type", query_type.clone()),
        ),
        ParsedAction::Answer { .. } => None,
    }
}

// ---------------------------------------------------------------------------
// Default regex matcher
// ---------------------------------------------------------------------------

/// Regex matcher covering the unambiguous command shapes.
///
/// Deliberately conservative: anything with referential ambiguity falls
/// through to the model tiers.
#[derive(Debug, Default)]
pub struct RegexMatcher;

fn create_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:create|add|new)\s+(?:a\s+|an\s+)?(idea|task|note|project)\s*[:,]?\s*(.+)$")
            .expect("create regex is valid")
    })
}

fn search_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:search(?:\s+for)?|find|look\s+up)\s+(?:my\s+)?(.+)$")
            .expect("search regex is valid")
    })
}

fn delete_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:delete|remove)\s+(?:this|that|it)$").expect("delete regex is valid")
    })
}

fn navigate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:go\s+to|open|switch\s+to)\s+(?:the\s+)?(home|canvas|focus\s*mode|projects|journal|health|settings)$")
            .expect("navigate regex is valid")
    })
}

fn level_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^what(?:'s| is)\s+my\s+level\??$").expect("level regex is valid")
    })
}

impl PatternMatcher for RegexMatcher {
    fn try_match(&self, transcript: &str, _ctx: &VoiceContext) -> Option<ParsedAction> {
        let t = transcript.trim().trim_end_matches(['.', '!']);

        if let Some(caps) = create_re().captures(t) {
            return Some(ParsedAction::Create {
                atom_type: caps[1].to_lowercase(),
                title: caps[2].trim().to_string(),
            });
        }
        if delete_re().is_match(t) {
            return Some(ParsedAction::Delete {
                target: "context".to_string(),
            });
        }
        if let Some(caps) = navigate_re().captures(t) {
            let dest = caps[1].to_lowercase().replace(char::is_whitespace, "");
            return Some(ParsedAction::Navigate {
                destination: if dest == "focusmode" { "focusMode".into() } else { dest },
            });
        }
        if level_re().is_match(t) {
            return Some(ParsedAction::Query {
                query_type: "levelStatus".to_string(),
            });
        }
        if let Some(caps) = search_re().captures(t) {
            return Some(ParsedAction::Search {
                query: caps[1].trim().to_string(),
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Section;
    use chrono::NaiveDate;

    fn ctx() -> VoiceContext {
        VoiceContext::new(Section::Home, NaiveDate::from_ymd_opt(2026, 8, 27).unwrap())
    }

    #[test]
    fn matches_create() {
        let action = RegexMatcher.try_match("create a task: ship the build", &ctx()).unwrap();
        assert_eq!(
            action,
            ParsedAction::Create {
                atom_type: "task".into(),
                title: "ship the build".into()
            }
        );
    }

    #[test]
    fn matches_navigate_focus_mode() {
        let action = RegexMatcher.try_match("go to focus mode", &ctx()).unwrap();
        assert_eq!(
            action,
            ParsedAction::Navigate {
                destination: "focusMode".into()
            }
        );
    }

    #[test]
    fn matches_delete_this() {
        let action = RegexMatcher.try_match("delete this", &ctx()).unwrap();
        assert_eq!(action, ParsedAction::Delete { target: "context".into() });
    }

    #[test]
    fn ambiguous_speech_misses() {
        assert!(RegexMatcher
            .try_match("maybe jot something down about the launch", &ctx())
            .is_none());
        assert!(RegexMatcher.try_match("summarize my week", &ctx()).is_none());
    }

    #[test]
    fn action_mapping_is_total_except_answer() {
        let actions = [
            ParsedAction::Create { atom_type: "idea".into(), title: "x".into() },
            ParsedAction::Update { target: "context".into(), title: Some("y".into()) },
            ParsedAction::Delete { target: "lastCreated".into() },
            ParsedAction::Search { query: "z".into() },
            ParsedAction::Batch { titles: vec!["a".into(), "b".into()] },
            ParsedAction::Navigate { destination: "journal".into() },
            ParsedAction::Query { query_type: "levelStatus".into() },
        ];
        for action in &actions {
            let call = action_to_call(action).expect("action should map to a call");
            crate::parser::validate(&call).expect("mapped call should validate");
        }
        assert!(action_to_call(&ParsedAction::Answer { text: "hi".into() }).is_none());
    }

    #[test]
    fn batch_items_carry_titles() {
        let call = action_to_call(&ParsedAction::Batch {
            titles: vec!["call Sam".into(), "send invoice".into()],
        })
        .unwrap();
        let items = call.get("items").unwrap().array_value().unwrap();
        assert_eq!(items.len(), 2);
    }
}
