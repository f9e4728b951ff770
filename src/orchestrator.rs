//! Tiered routing orchestrator.
//!
//! One utterance goes through at most three tiers: the deterministic pattern
//! matcher, the local function-calling model, and the cloud synthesizer.
//! Tier 0 short-circuits on a hit. Generative intents go straight to the
//! cloud; an unavailable or failing cloud falls back to the local tier with
//! the outcome flagged as degraded. Tier-1 failures are terminal for the
//! utterance; there is no retry loop.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::call::FunctionCall;
use crate::cloud::CloudClient;
use crate::context::VoiceContext;
use crate::error::{user_message, VoxError};
use crate::exec::ToolExecutor;
use crate::intent::IntentClassifier;
use crate::model::GemmaEngine;
use crate::pattern::{action_to_call, ParsedAction, PatternMatcher};
use crate::result::ExecutionResult;

/// Which tier produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Pattern,
    Gemma,
    Cloud,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pattern => "pattern",
            Self::Gemma => "function-gemma",
            Self::Cloud => "cloud",
        })
    }
}

/// The resolved outcome of routing one utterance. Always a value, never an
/// error: internal failures are translated into `message` here and nowhere
/// else.
#[derive(Debug)]
pub struct RouteOutcome {
    pub success: bool,
    pub tier: Tier,
    /// One-line human message (confirmation or failure).
    pub message: String,
    pub result: Option<ExecutionResult>,
    /// True when the cloud tier was wanted but the local tier answered.
    pub degraded: bool,
    pub latency: Duration,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RouterCounters {
    total: u64,
    successes: u64,
    pattern: u64,
    gemma: u64,
    cloud: u64,
    fallbacks: u64,
    total_latency: Duration,
}

/// Derived router metrics; all rates are computed at read time and an empty
/// router reports zeros, never NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterMetricsSnapshot {
    pub total: u64,
    pub successes: u64,
    pub success_rate: f64,
    pub pattern: u64,
    pub gemma: u64,
    pub cloud: u64,
    pub pattern_share: f64,
    pub gemma_share: f64,
    pub cloud_share: f64,
    pub fallbacks: u64,
    pub avg_latency_ms: f64,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// The front door of the routing core.
pub struct VoiceRouter {
    matcher: Box<dyn PatternMatcher>,
    classifier: Box<dyn IntentClassifier>,
    engine: Arc<GemmaEngine>,
    executor: ToolExecutor,
    cloud: Option<Arc<dyn CloudClient>>,
    counters: Mutex<RouterCounters>,
}

impl VoiceRouter {
    pub fn new(
        matcher: Box<dyn PatternMatcher>,
        classifier: Box<dyn IntentClassifier>,
        engine: Arc<GemmaEngine>,
        executor: ToolExecutor,
    ) -> Self {
        Self {
            matcher,
            classifier,
            engine,
            executor,
            cloud: None,
            counters: Mutex::new(RouterCounters::default()),
        }
    }

    /// Attach the cloud tier. Without it every generative request degrades
    /// to the local tier.
    pub fn with_cloud(mut self, cloud: Arc<dyn CloudClient>) -> Self {
        self.cloud = Some(cloud);
        self
    }

    /// Route one transcript to a resolved outcome.
    pub fn route(&self, transcript: &str, ctx: &VoiceContext) -> RouteOutcome {
        let started = Instant::now();

        // Tier 0: deterministic patterns, zero model latency.
        if let Some(action) = self.matcher.try_match(transcript, ctx) {
            tracing::debug!(action = ?action, "tier-0 pattern hit");
            let outcome = self.run_pattern_action(&action, ctx, started);
            return self.record(outcome);
        }

        let intent = self.classifier.classify(transcript);
        if intent.is_generative {
            match self.try_cloud(transcript, ctx, &intent) {
                Ok(text) => {
                    let outcome = RouteOutcome {
                        success: true,
                        tier: Tier::Cloud,
                        message: text.clone(),
                        result: Some(ExecutionResult::Synthesized { text }),
                        degraded: false,
                        latency: started.elapsed(),
                    };
                    return self.record(outcome);
                }
                Err(err) => {
                    // Unconditional fallback: the cloud being down must never
                    // strand the user.
                    tracing::warn!(error = %err, "cloud tier unavailable, degrading to local model");
                    let mut outcome = self.run_gemma(transcript, ctx, started);
                    outcome.degraded = true;
                    return self.record(outcome);
                }
            }
        }

        let outcome = self.run_gemma(transcript, ctx, started);
        self.record(outcome)
    }

    fn try_cloud(
        &self,
        transcript: &str,
        ctx: &VoiceContext,
        intent: &crate::intent::IntentClassification,
    ) -> Result<String, VoxError> {
        let cloud = self
            .cloud
            .as_deref()
            .ok_or(crate::error::CloudError::NotConfigured)?;
        Ok(cloud.generate_synthesis(transcript, ctx, intent)?)
    }

    fn run_pattern_action(
        &self,
        action: &ParsedAction,
        ctx: &VoiceContext,
        started: Instant,
    ) -> RouteOutcome {
        match action_to_call(action) {
            Some(call) => self.dispatch(Tier::Pattern, &call, ctx, started),
            None => {
                // Direct answer, no executor detour.
                let text = match action {
                    ParsedAction::Answer { text } => text.clone(),
                    _ => String::new(),
                };
                RouteOutcome {
                    success: true,
                    tier: Tier::Pattern,
                    message: text.clone(),
                    result: Some(ExecutionResult::QueryResponse { text }),
                    degraded: false,
                    latency: started.elapsed(),
                }
            }
        }
    }

    fn run_gemma(&self, transcript: &str, ctx: &VoiceContext, started: Instant) -> RouteOutcome {
        if !self.engine.is_ready() {
            if let Err(err) = self.engine.load_model() {
                return self.failure(Tier::Gemma, err.into(), started);
            }
        }
        match self.engine.generate_function_call(transcript, ctx) {
            Ok(call) => self.dispatch(Tier::Gemma, &call, ctx, started),
            // Terminal: a tier-1 parse or generation failure ends the
            // utterance with a human message.
            Err(err) => self.failure(Tier::Gemma, err, started),
        }
    }

    fn dispatch(
        &self,
        tier: Tier,
        call: &FunctionCall,
        ctx: &VoiceContext,
        started: Instant,
    ) -> RouteOutcome {
        match self.executor.dispatch(call, ctx) {
            Ok(result) => RouteOutcome {
                success: true,
                tier,
                message: result.confirmation(),
                result: Some(result),
                degraded: false,
                latency: started.elapsed(),
            },
            Err(err) => self.failure(tier, err, started),
        }
    }

    fn failure(&self, tier: Tier, err: VoxError, started: Instant) -> RouteOutcome {
        tracing::warn!(tier = %tier, error = %err, "routing failed");
        RouteOutcome {
            success: false,
            tier,
            message: user_message(&err),
            result: None,
            degraded: false,
            latency: started.elapsed(),
        }
    }

    fn record(&self, outcome: RouteOutcome) -> RouteOutcome {
        let mut c = self.counters.lock().expect("router metrics lock poisoned");
        c.total += 1;
        c.total_latency += outcome.latency;
        if outcome.success {
            c.successes += 1;
        }
        match outcome.tier {
            Tier::Pattern => c.pattern += 1,
            Tier::Gemma => c.gemma += 1,
            Tier::Cloud => c.cloud += 1,
        }
        if outcome.degraded {
            c.fallbacks += 1;
        }
        drop(c);
        tracing::info!(
            tier = %outcome.tier,
            success = outcome.success,
            degraded = outcome.degraded,
            latency_ms = outcome.latency.as_millis() as u64,
            "utterance routed"
        );
        outcome
    }

    /// Snapshot of routing metrics.
    pub fn metrics(&self) -> RouterMetricsSnapshot {
        let c = self.counters.lock().expect("router metrics lock poisoned");
        let share = |n: u64| {
            if c.total == 0 {
                0.0
            } else {
                n as f64 / c.total as f64
            }
        };
        RouterMetricsSnapshot {
            total: c.total,
            successes: c.successes,
            success_rate: share(c.successes),
            pattern: c.pattern,
            gemma: c.gemma,
            cloud: c.cloud,
            pattern_share: share(c.pattern),
            gemma_share: share(c.gemma),
            cloud_share: share(c.cloud),
            fallbacks: c.fallbacks,
            avg_latency_ms: if c.total == 0 {
                0.0
            } else {
                c.total_latency.as_secs_f64() * 1000.0 / c.total as f64
            },
        }
    }
}

impl std::fmt::Debug for VoiceRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceRouter")
            .field("has_cloud", &self.cloud.is_some())
            .field("engine_ready", &self.engine.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Section;
    use crate::error::CloudResult;
    use crate::intent::{IntentClassification, KeywordClassifier};
    use crate::model::backend::ScriptedBackend;
    use crate::model::{GemmaConfig, GemmaEngine};
    use crate::pattern::RegexMatcher;
    use crate::repo::MemoryRepository;
    use crate::session::ClockSessionHandler;
    use chrono::NaiveDate;

    fn ctx() -> VoiceContext {
        VoiceContext::new(Section::Home, NaiveDate::from_ymd_opt(2026, 8, 27).unwrap())
    }

    /// Engine over scripted outputs; leading "" feeds the warm-up.
    fn scripted_engine(outputs: &[&str]) -> Arc<GemmaEngine> {
        let mut all: Vec<String> = vec![String::new()];
        all.extend(outputs.iter().map(|s| s.to_string()));
        Arc::new(GemmaEngine::with_factory(GemmaConfig::default(), move || {
            Ok(Box::new(ScriptedBackend::with_outputs(all.clone())) as Box<_>)
        }))
    }

    fn router(outputs: &[&str]) -> VoiceRouter {
        let executor = ToolExecutor::builder()
            .repository(Arc::new(MemoryRepository::new()))
            .sessions(Arc::new(ClockSessionHandler::new()))
            .build();
        VoiceRouter::new(
            Box::new(RegexMatcher),
            Box::new(KeywordClassifier),
            scripted_engine(outputs),
            executor,
        )
    }

    struct FailingCloud;
    impl CloudClient for FailingCloud {
        fn trigger_correlation_analysis(
            &self,
            _dimensions: &[String],
            _reason: Option<&str>,
        ) -> CloudResult<String> {
            Err(crate::error::CloudError::RequestFailed { message: "503".into() })
        }
        fn generate_synthesis(
            &self,
            _transcript: &str,
            _ctx: &VoiceContext,
            _intent: &IntentClassification,
        ) -> CloudResult<String> {
            Err(crate::error::CloudError::RequestFailed { message: "503".into() })
        }
    }

    struct EchoCloud;
    impl CloudClient for EchoCloud {
        fn trigger_correlation_analysis(
            &self,
            _dimensions: &[String],
            _reason: Option<&str>,
        ) -> CloudResult<String> {
            Ok("an-1".into())
        }
        fn generate_synthesis(
            &self,
            transcript: &str,
            _ctx: &VoiceContext,
            _intent: &IntentClassification,
        ) -> CloudResult<String> {
            Ok(format!("synthesis of: {transcript}"))
        }
    }

    const SEARCH_CALL: &str = "<start_function_call>call:search_atoms{query:<escape>marketing<escape>}<end_function_call>";

    #[test]
    fn tier_zero_short_circuits_without_touching_the_model() {
        // No scripted outputs at all: any engine call would error.
        let r = router(&[]);
        let outcome = r.route("create a task: ship the build", &ctx());
        assert!(outcome.success);
        assert_eq!(outcome.tier, Tier::Pattern);
        assert!(outcome.message.contains("Created"));
    }

    #[test]
    fn tier_one_handles_pattern_miss() {
        let r = router(&[SEARCH_CALL]);
        let outcome = r.route("could you maybe dig up the marketing stuff", &ctx());
        assert!(outcome.success);
        assert_eq!(outcome.tier, Tier::Gemma);
        assert_eq!(outcome.message, "Found 0 results");
    }

    #[test]
    fn generative_goes_to_cloud() {
        let r = router(&[]).with_cloud(Arc::new(EchoCloud));
        let outcome = r.route("summarize my week", &ctx());
        assert!(outcome.success);
        assert_eq!(outcome.tier, Tier::Cloud);
        assert!(!outcome.degraded);
        assert!(outcome.message.contains("synthesis of"));
    }

    #[test]
    fn cloud_failure_degrades_to_local_tier() {
        let r = router(&[SEARCH_CALL]).with_cloud(Arc::new(FailingCloud));
        let outcome = r.route("summarize my week", &ctx());
        assert_eq!(outcome.tier, Tier::Gemma);
        assert!(outcome.degraded);
        assert!(outcome.success);
    }

    #[test]
    fn missing_cloud_degrades_the_same_way() {
        let r = router(&[SEARCH_CALL]);
        let outcome = r.route("summarize my week", &ctx());
        assert_eq!(outcome.tier, Tier::Gemma);
        assert!(outcome.degraded);
    }

    #[test]
    fn tier_one_parse_failure_is_terminal_with_human_message() {
        let r = router(&["this is not a function call"]);
        let outcome = r.route("do something unusual please", &ctx());
        assert!(!outcome.success);
        assert_eq!(outcome.tier, Tier::Gemma);
        assert!(!outcome.message.is_empty());
        assert!(!outcome.message.contains("voxa::"));
    }

    #[test]
    fn metrics_track_tiers_and_fallbacks_exactly() {
        let r = router(&[SEARCH_CALL, SEARCH_CALL]).with_cloud(Arc::new(FailingCloud));
        r.route("create a task: one", &ctx()); // pattern
        r.route("summarize my week", &ctx()); // degraded to gemma
        r.route("handle the marketing things", &ctx()); // gemma

        let m = r.metrics();
        assert_eq!(m.total, 3);
        assert_eq!(m.pattern, 1);
        assert_eq!(m.gemma, 2);
        assert_eq!(m.cloud, 0);
        assert_eq!(m.fallbacks, 1);
        assert_eq!(m.successes, 3);
        assert!((m.success_rate - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_metrics_are_zero() {
        let r = router(&[]);
        let m = r.metrics();
        assert_eq!(m.total, 0);
        assert_eq!(m.success_rate, 0.0);
        assert_eq!(m.avg_latency_ms, 0.0);
    }
}
