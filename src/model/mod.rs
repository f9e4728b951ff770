//! Small-model engine: tier 1 of the routing core.
//!
//! [`GemmaEngine`] owns a lazily-loaded text-generation backend and produces
//! one structured function call per utterance. The engine is the sole owner
//! of the backend handle and warm flag; all load/generate/flush operations go
//! through one mutex so a concurrent second `load_model` can never observe a
//! load-in-progress as not-loaded and trigger a duplicate load.

pub mod backend;
pub mod prompt;

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::call::FunctionCall;
use crate::context::VoiceContext;
use crate::error::{ModelError, ModelResult, VoxResult};
use crate::parser::{parse_function_call, END_MARKER};

use backend::{GenerationParams, HttpBackend, HttpBackendConfig, TextGenBackend};

/// Configuration for the small-model engine.
#[derive(Debug, Clone)]
pub struct GemmaConfig {
    /// Local inference server settings (ignored by injected backends).
    pub backend: HttpBackendConfig,
    /// Optional fine-tuned adapter. A missing path is logged and skipped;
    /// it never fails the load.
    pub adapter_path: Option<PathBuf>,
    /// Generation cap; output is a single short call.
    pub max_tokens: u32,
}

impl Default for GemmaConfig {
    fn default() -> Self {
        Self {
            backend: HttpBackendConfig::default(),
            adapter_path: None,
            max_tokens: 96,
        }
    }
}

/// Factory producing a fresh backend on load.
pub type BackendFactory =
    Box<dyn Fn() -> ModelResult<Box<dyn TextGenBackend>> + Send + Sync>;

/// Tiny prompt used to pre-compute the fixed-prefix cache after load.
const WARMUP_PROMPT: &str = "ok";

struct EngineState {
    backend: Option<Box<dyn TextGenBackend>>,
    warmed: bool,
}

#[derive(Debug, Default)]
struct EngineMetrics {
    inferences: u64,
    successes: u64,
    total_latency: Duration,
}

/// Derived metrics, computed at read time (never stored pre-computed).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineMetricsSnapshot {
    pub inferences: u64,
    pub successes: u64,
    pub avg_latency_ms: f64,
    pub success_rate: f64,
}

/// The tier-1 function-calling engine.
pub struct GemmaEngine {
    config: GemmaConfig,
    factory: BackendFactory,
    state: Mutex<EngineState>,
    metrics: Mutex<EngineMetrics>,
}

impl GemmaEngine {
    /// Engine backed by the local inference server from `config`.
    pub fn new(config: GemmaConfig) -> Self {
        let backend_config = config.backend.clone();
        Self::with_factory(config, move || {
            Ok(Box::new(HttpBackend::new(backend_config.clone())) as Box<dyn TextGenBackend>)
        })
    }

    /// Engine with an injected backend factory (tests, alternative runtimes).
    pub fn with_factory<F>(config: GemmaConfig, factory: F) -> Self
    where
        F: Fn() -> ModelResult<Box<dyn TextGenBackend>> + Send + Sync + 'static,
    {
        Self {
            config,
            factory: Box::new(factory),
            state: Mutex::new(EngineState {
                backend: None,
                warmed: false,
            }),
            metrics: Mutex::new(EngineMetrics::default()),
        }
    }

    /// Load and warm the backend. Idempotent; safe to call concurrently
    /// because the loaded check and the load share one critical section.
    ///
    /// The warm-up is a throwaway low-token generation, so injected scripted
    /// backends must queue one extra output ahead of the real ones.
    pub fn load_model(&self) -> ModelResult<()> {
        let mut state = self.state.lock().expect("engine state lock poisoned");
        if state.backend.is_some() && state.warmed {
            return Ok(());
        }

        if state.backend.is_none() {
            tracing::info!(model = %self.config.backend.model, "loading function-call model");
            let mut backend = (self.factory)()?;
            match self.config.adapter_path {
                Some(ref path) if path.exists() => {
                    tracing::info!(path = %path.display(), "applying fine-tuned adapter");
                    backend.apply_adapter(path).map_err(|e| ModelError::LoadFailed {
                        message: format!("adapter failed to apply: {e}"),
                    })?;
                }
                Some(ref path) => {
                    tracing::warn!(
                        path = %path.display(),
                        "adapter path does not exist, continuing with base weights"
                    );
                }
                None => {}
            }
            state.backend = Some(backend);
        }

        // Warm-up: pre-compute the fixed-prefix cache before the first real call.
        let warmup = GenerationParams {
            max_tokens: 4,
            temperature: 0.0,
        };
        let backend = state.backend.as_mut().expect("backend just loaded");
        backend
            .generate(WARMUP_PROMPT, WARMUP_PROMPT, &warmup)
            .map_err(|e| ModelError::LoadFailed {
                message: format!("warm-up generation failed: {e}"),
            })?;
        state.warmed = true;
        tracing::info!("model loaded and warm");
        Ok(())
    }

    /// Loaded AND warmed up.
    pub fn is_ready(&self) -> bool {
        let state = self.state.lock().expect("engine state lock poisoned");
        state.backend.is_some() && state.warmed
    }

    /// Release the backend handle entirely.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().expect("engine state lock poisoned");
        state.backend = None;
        state.warmed = false;
        tracing::info!("model engine shut down");
    }

    /// Invalidate the warm state but keep the weights resident; the next
    /// call path must re-warm via `load_model`.
    pub fn flush_cache(&self) {
        let mut state = self.state.lock().expect("engine state lock poisoned");
        state.warmed = false;
    }

    fn params(&self) -> GenerationParams {
        GenerationParams {
            max_tokens: self.config.max_tokens,
            // Deterministic decoding: output must be machine-parseable.
            temperature: 0.0,
        }
    }

    /// Generate, parse, and validate one function call for a transcript.
    ///
    /// Each call is a fresh single-shot session; no history accumulates
    /// across calls.
    pub fn generate_function_call(
        &self,
        transcript: &str,
        ctx: &VoiceContext,
    ) -> VoxResult<FunctionCall> {
        let system = prompt::build_system_prompt(ctx);
        let started = Instant::now();
        let raw = {
            let mut state = self.state.lock().expect("engine state lock poisoned");
            if !state.warmed {
                return Err(ModelError::NotLoaded.into());
            }
            let backend = state.backend.as_mut().ok_or(ModelError::NotLoaded)?;
            backend.generate(&system, transcript, &self.params())?
        };
        self.finish(started, &raw)
    }

    /// Streaming variant: `on_partial` sees each raw chunk, and the engine
    /// stops pulling the instant the accumulated text contains the end
    /// marker, bounding worst-case latency.
    pub fn generate_function_call_streaming(
        &self,
        transcript: &str,
        ctx: &VoiceContext,
        on_partial: &mut dyn FnMut(&str),
    ) -> VoxResult<FunctionCall> {
        let system = prompt::build_system_prompt(ctx);
        let started = Instant::now();
        let raw = {
            let mut state = self.state.lock().expect("engine state lock poisoned");
            if !state.warmed {
                return Err(ModelError::NotLoaded.into());
            }
            let backend = state.backend.as_mut().ok_or(ModelError::NotLoaded)?;
            let mut accumulated = String::new();
            backend.generate_stream(&system, transcript, &self.params(), &mut |chunk| {
                on_partial(chunk);
                accumulated.push_str(chunk);
                !accumulated.contains(END_MARKER)
            })?
        };
        self.finish(started, &raw)
    }

    /// Shared post-generation path: record metrics, parse, validate.
    fn finish(&self, started: Instant, raw: &str) -> VoxResult<FunctionCall> {
        let latency = started.elapsed();
        let parsed = parse_function_call(raw);
        {
            let mut metrics = self.metrics.lock().expect("engine metrics lock poisoned");
            metrics.inferences += 1;
            metrics.total_latency += latency;
            if parsed.is_ok() {
                metrics.successes += 1;
            }
        }
        match &parsed {
            Ok(call) => {
                tracing::debug!(function = %call.name(), latency_ms = latency.as_millis() as u64, "function call generated")
            }
            Err(e) => {
                tracing::warn!(error = %e, latency_ms = latency.as_millis() as u64, "model output rejected")
            }
        }
        Ok(parsed?)
    }

    /// Snapshot of engine metrics; rates are derived here, at read time.
    pub fn metrics(&self) -> EngineMetricsSnapshot {
        let metrics = self.metrics.lock().expect("engine metrics lock poisoned");
        let inferences = metrics.inferences;
        EngineMetricsSnapshot {
            inferences,
            successes: metrics.successes,
            avg_latency_ms: if inferences == 0 {
                0.0
            } else {
                metrics.total_latency.as_secs_f64() * 1000.0 / inferences as f64
            },
            success_rate: if inferences == 0 {
                0.0
            } else {
                metrics.successes as f64 / inferences as f64
            },
        }
    }
}

impl std::fmt::Debug for GemmaEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GemmaEngine")
            .field("config", &self.config)
            .field("ready", &self.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::backend::ScriptedBackend;
    use super::*;
    use crate::call::FunctionName;
    use crate::context::{Section, VoiceContext};
    use crate::error::{ParseError, VoxError};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn ctx() -> VoiceContext {
        VoiceContext::new(Section::Home, NaiveDate::from_ymd_opt(2026, 8, 27).unwrap())
    }

    /// Engine over a scripted backend; the leading "" feeds the warm-up.
    fn scripted_engine(outputs: &[&str]) -> GemmaEngine {
        let mut all: Vec<String> = vec![String::new()];
        all.extend(outputs.iter().map(|s| s.to_string()));
        GemmaEngine::with_factory(GemmaConfig::default(), move || {
            Ok(Box::new(ScriptedBackend::with_outputs(all.clone())) as Box<_>)
        })
    }

    const SEARCH_CALL: &str = "<start_function_call>call:search_atoms{query:<escape>marketing ideas<escape>}<end_function_call>";

    #[test]
    fn generate_before_load_is_not_loaded() {
        let engine = scripted_engine(&[SEARCH_CALL]);
        assert!(!engine.is_ready());
        let err = engine.generate_function_call("search", &ctx()).unwrap_err();
        assert!(matches!(err, VoxError::Model(ModelError::NotLoaded)));
    }

    #[test]
    fn load_is_idempotent() {
        let engine = scripted_engine(&[SEARCH_CALL]);
        engine.load_model().unwrap();
        engine.load_model().unwrap(); // second load is a no-op, consumes nothing
        assert!(engine.is_ready());
        let call = engine
            .generate_function_call("search for my marketing ideas", &ctx())
            .unwrap();
        assert_eq!(call.name(), FunctionName::SearchAtoms);
    }

    #[test]
    fn missing_adapter_does_not_fail_load() {
        let config = GemmaConfig {
            adapter_path: Some(PathBuf::from("/nonexistent/adapter.safetensors")),
            ..Default::default()
        };
        let engine = GemmaEngine::with_factory(config, || {
            Ok(Box::new(ScriptedBackend::with_outputs([""])) as Box<_>)
        });
        engine.load_model().unwrap();
        assert!(engine.is_ready());
    }

    #[test]
    fn existing_adapter_is_applied() {
        let dir = tempfile::TempDir::new().unwrap();
        let adapter = dir.path().join("adapter.safetensors");
        std::fs::write(&adapter, b"weights").unwrap();

        let applied = Arc::new(std::sync::Mutex::new(None::<String>));
        let applied_probe = Arc::clone(&applied);
        let config = GemmaConfig {
            adapter_path: Some(adapter.clone()),
            ..Default::default()
        };
        let engine = GemmaEngine::with_factory(config, move || {
            let mut backend = ScriptedBackend::with_outputs([""]);
            backend.push_output(SEARCH_CALL);
            // Probe adapter application through a shared cell.
            struct Probe {
                inner: ScriptedBackend,
                applied: Arc<std::sync::Mutex<Option<String>>>,
            }
            impl TextGenBackend for Probe {
                fn generate(
                    &mut self,
                    system: &str,
                    prompt: &str,
                    params: &GenerationParams,
                ) -> ModelResult<String> {
                    self.inner.generate(system, prompt, params)
                }
                fn generate_stream(
                    &mut self,
                    system: &str,
                    prompt: &str,
                    params: &GenerationParams,
                    on_chunk: &mut dyn FnMut(&str) -> bool,
                ) -> ModelResult<String> {
                    self.inner.generate_stream(system, prompt, params, on_chunk)
                }
                fn apply_adapter(&mut self, path: &std::path::Path) -> ModelResult<()> {
                    *self.applied.lock().unwrap() = Some(path.display().to_string());
                    Ok(())
                }
            }
            Ok(Box::new(Probe {
                inner: backend,
                applied: Arc::clone(&applied_probe),
            }) as Box<_>)
        });
        engine.load_model().unwrap();
        assert_eq!(
            applied.lock().unwrap().as_deref(),
            Some(adapter.display().to_string().as_str())
        );
    }

    #[test]
    fn flush_forces_rewarm_but_keeps_weights() {
        // Warm-up output, one call, then a second warm-up after flush and another call.
        let engine = scripted_engine(&[SEARCH_CALL, "", SEARCH_CALL]);
        engine.load_model().unwrap();
        engine.generate_function_call("x", &ctx()).unwrap();

        engine.flush_cache();
        assert!(!engine.is_ready());
        let err = engine.generate_function_call("x", &ctx()).unwrap_err();
        assert!(matches!(err, VoxError::Model(ModelError::NotLoaded)));

        engine.load_model().unwrap(); // re-warm only; backend survives
        engine.generate_function_call("x", &ctx()).unwrap();
    }

    #[test]
    fn shutdown_releases_backend() {
        let engine = scripted_engine(&[]);
        engine.load_model().unwrap();
        engine.shutdown();
        assert!(!engine.is_ready());
    }

    #[test]
    fn streaming_stops_at_end_marker() {
        let trailing = format!("{SEARCH_CALL} and here is some chatter the model tacked on");
        let engine = scripted_engine(&[&trailing]);
        engine.load_model().unwrap();

        let mut seen = String::new();
        let call = engine
            .generate_function_call_streaming("search", &ctx(), &mut |chunk| {
                seen.push_str(chunk)
            })
            .unwrap();
        assert_eq!(call.name(), FunctionName::SearchAtoms);
        // Early stop: the trailing chatter was never fully pulled.
        assert!(seen.len() < trailing.len());
        assert!(seen.contains(END_MARKER));
    }

    #[test]
    fn parse_failure_counts_as_unsuccessful_inference() {
        let engine = scripted_engine(&["gibberish without an envelope", SEARCH_CALL]);
        engine.load_model().unwrap();

        let err = engine.generate_function_call("x", &ctx()).unwrap_err();
        assert!(matches!(err, VoxError::Parse(ParseError::InvalidOutput { .. })));
        engine.generate_function_call("x", &ctx()).unwrap();

        let m = engine.metrics();
        assert_eq!(m.inferences, 2);
        assert_eq!(m.successes, 1);
        assert!((m.success_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn metrics_empty_has_no_divide_by_zero() {
        let engine = scripted_engine(&[]);
        let m = engine.metrics();
        assert_eq!(m.success_rate, 0.0);
        assert_eq!(m.avg_latency_ms, 0.0);
    }
}
