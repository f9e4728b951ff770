//! Intent classification for voice transcripts.
//!
//! Regex/keyword-based classification that works without a model. Its one
//! load-bearing output is the `is_generative` flag: generative requests skip
//! structured dispatch entirely and route to the cloud tier.

use regex::Regex;
use std::sync::OnceLock;

/// Broad intent categories, coarser than the function enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentKind {
    /// Create / capture something.
    Capture,
    /// Find / recall something.
    Retrieve,
    /// Change or remove something.
    Modify,
    /// Move around the UI.
    Navigate,
    /// Ask about state (levels, health, sessions).
    Query,
    /// Open-ended synthesis: summaries, reflections, advice.
    Generative,
}

/// Classification result for a transcript.
#[derive(Debug, Clone)]
pub struct IntentClassification {
    pub primary: IntentKind,
    /// Heuristic confidence in the primary label, 0.0 to 1.0.
    pub confidence: f32,
    /// Whether this request must bypass structured dispatch.
    pub is_generative: bool,
    pub secondary: Option<IntentKind>,
}

/// The classifier interface the orchestrator consumes.
pub trait IntentClassifier: Send + Sync {
    fn classify(&self, transcript: &str) -> IntentClassification;
}

/// Default keyword/regex classifier.
#[derive(Debug, Default)]
pub struct KeywordClassifier;

fn generative_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(summari[sz]e|reflect|brainstorm|write (?:me )?(?:a|an|some)|draft|compose|explain|what should i|help me think|give me advice|how do i feel)\b",
        )
        .expect("generative regex is valid")
    })
}

fn retrieve_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(search|find|show me|look up|where (?:is|are)|pull up)\b")
            .expect("retrieve regex is valid")
    })
}

fn modify_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(delete|remove|update|rename|change|mark|archive)\b")
            .expect("modify regex is valid")
    })
}

fn navigate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(go to|open|navigate|switch to|take me)\b")
            .expect("navigate regex is valid")
    })
}

fn query_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(what'?s my|how (?:is|was|are)|am i|level|readiness|hrv|sleep score|quest)\b")
            .expect("query regex is valid")
    })
}

impl IntentClassifier for KeywordClassifier {
    /// Patterns are tried in priority order; first match wins. Generative is
    /// checked first because synthesis verbs often co-occur with retrieval
    /// nouns ("summarize my notes").
    fn classify(&self, transcript: &str) -> IntentClassification {
        let t = transcript.trim();

        if generative_re().is_match(t) {
            let secondary = if retrieve_re().is_match(t) {
                Some(IntentKind::Retrieve)
            } else {
                None
            };
            return IntentClassification {
                primary: IntentKind::Generative,
                confidence: 0.85,
                is_generative: true,
                secondary,
            };
        }
        if retrieve_re().is_match(t) {
            return IntentClassification {
                primary: IntentKind::Retrieve,
                confidence: 0.8,
                is_generative: false,
                secondary: None,
            };
        }
        if modify_re().is_match(t) {
            return IntentClassification {
                primary: IntentKind::Modify,
                confidence: 0.75,
                is_generative: false,
                secondary: None,
            };
        }
        if navigate_re().is_match(t) {
            return IntentClassification {
                primary: IntentKind::Navigate,
                confidence: 0.75,
                is_generative: false,
                secondary: None,
            };
        }
        if query_re().is_match(t) {
            return IntentClassification {
                primary: IntentKind::Query,
                confidence: 0.7,
                is_generative: false,
                secondary: None,
            };
        }
        // Default: treat unrecognized speech as capture (the safest action).
        IntentClassification {
            primary: IntentKind::Capture,
            confidence: 0.4,
            is_generative: false,
            secondary: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(t: &str) -> IntentClassification {
        KeywordClassifier.classify(t)
    }

    #[test]
    fn synthesis_verbs_are_generative() {
        assert!(classify("summarize my week").is_generative);
        assert!(classify("write me a reflection on today").is_generative);
        assert!(classify("what should I focus on tomorrow").is_generative);
    }

    #[test]
    fn command_verbs_are_not_generative() {
        assert!(!classify("search for my marketing ideas").is_generative);
        assert!(!classify("delete that note").is_generative);
        assert!(!classify("go to the journal").is_generative);
        assert!(!classify("start a deep work session").is_generative);
    }

    #[test]
    fn generative_wins_over_retrieval() {
        let c = classify("summarize my notes about onboarding");
        assert_eq!(c.primary, IntentKind::Generative);
        assert_eq!(c.secondary, Some(IntentKind::Retrieve));
    }

    #[test]
    fn unrecognized_defaults_to_capture() {
        let c = classify("purple monkey dishwasher");
        assert_eq!(c.primary, IntentKind::Capture);
        assert!(c.confidence < 0.5);
    }
}
