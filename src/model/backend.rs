//! Text-generation backends.
//!
//! The engine only needs a black-box "generate text from a prompt" capability
//! with deterministic decoding. [`HttpBackend`] speaks an Ollama-style local
//! inference server; [`ScriptedBackend`] replays canned outputs for tests and
//! offline development.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{ModelError, ModelResult};

/// Fixed decoding parameters for a single-shot generation.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    /// Output is a single short call; cap tokens accordingly.
    pub max_tokens: u32,
    /// Zero for machine-parseable output.
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 96,
            temperature: 0.0,
        }
    }
}

/// A text-generation backend. Each call is a fresh, single-shot session;
/// backends hold no conversation history.
pub trait TextGenBackend: Send {
    /// Generate a full completion.
    fn generate(
        &mut self,
        system: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> ModelResult<String>;

    /// Generate incrementally. `on_chunk` is invoked per text chunk and
    /// returns whether to keep pulling; returning `false` is cooperative
    /// cancellation and the backend must stop producing. Returns the text
    /// accumulated up to the stop point.
    fn generate_stream(
        &mut self,
        system: &str,
        prompt: &str,
        params: &GenerationParams,
        on_chunk: &mut dyn FnMut(&str) -> bool,
    ) -> ModelResult<String>;

    /// Apply a fine-tuned adapter. Backends without adapter support accept
    /// and ignore it.
    fn apply_adapter(&mut self, _path: &Path) -> ModelResult<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HTTP backend
// ---------------------------------------------------------------------------

/// Configuration for the local inference server.
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            model: "functiongemma-270m".into(),
            timeout_secs: 30,
        }
    }
}

/// Backend speaking the Ollama-style `/api/generate` endpoint.
pub struct HttpBackend {
    config: HttpBackendConfig,
    adapter: Option<String>,
}

impl HttpBackend {
    pub fn new(config: HttpBackendConfig) -> Self {
        Self {
            config,
            adapter: None,
        }
    }

    fn agent(&self) -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(self.config.timeout_secs))
            .build()
    }

    fn request_body(
        &self,
        system: &str,
        prompt: &str,
        params: &GenerationParams,
        stream: bool,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.config.model,
            "system": system,
            "prompt": prompt,
            "stream": stream,
            "options": {
                "temperature": params.temperature,
                "num_predict": params.max_tokens,
            },
        });
        if let Some(ref adapter) = self.adapter {
            body["adapter"] = serde_json::Value::String(adapter.clone());
        }
        body
    }

    fn post(&self, body: &serde_json::Value) -> ModelResult<ureq::Response> {
        let url = format!("{}/api/generate", self.config.base_url);
        let body_str = serde_json::to_string(body).map_err(|e| ModelError::Generation {
            message: format!("JSON serialize error: {e}"),
        })?;
        self.agent()
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&body_str)
            .map_err(|e: ureq::Error| ModelError::Generation {
                message: e.to_string(),
            })
    }
}

impl TextGenBackend for HttpBackend {
    fn generate(
        &mut self,
        system: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> ModelResult<String> {
        let resp = self.post(&self.request_body(system, prompt, params, false))?;
        let resp_str = resp.into_string().map_err(|e| ModelError::Generation {
            message: e.to_string(),
        })?;
        let json: serde_json::Value =
            serde_json::from_str(&resp_str).map_err(|e| ModelError::Generation {
                message: format!("malformed server response: {e}"),
            })?;
        json["response"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ModelError::Generation {
                message: "missing 'response' field".into(),
            })
    }

    fn generate_stream(
        &mut self,
        system: &str,
        prompt: &str,
        params: &GenerationParams,
        on_chunk: &mut dyn FnMut(&str) -> bool,
    ) -> ModelResult<String> {
        let resp = self.post(&self.request_body(system, prompt, params, true))?;
        let reader = BufReader::new(resp.into_reader());
        let mut accumulated = String::new();

        // NDJSON: one chunk object per line. Dropping the reader closes the
        // connection, which is how the producer learns to stop.
        for line in reader.lines() {
            let line = line.map_err(|e| ModelError::Generation {
                message: format!("stream read error: {e}"),
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let json: serde_json::Value =
                serde_json::from_str(&line).map_err(|e| ModelError::Generation {
                    message: format!("malformed stream chunk: {e}"),
                })?;
            if let Some(chunk) = json["response"].as_str() {
                accumulated.push_str(chunk);
                if !on_chunk(chunk) {
                    break;
                }
            }
            if json["done"].as_bool() == Some(true) {
                break;
            }
        }
        Ok(accumulated)
    }
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("adapter", &self.adapter)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Scripted backend
// ---------------------------------------------------------------------------

/// Deterministic backend that replays queued outputs in order.
///
/// Used by tests and the CLI's offline mode. Streaming splits the output into
/// small chunks so early-stop behavior is exercised realistically.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    outputs: VecDeque<String>,
    adapter_applied: Option<String>,
    /// Count of generate calls, including the warm-up.
    pub calls: usize,
}

/// Chunk size for scripted streaming.
const SCRIPT_CHUNK: usize = 7;

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an output to be returned by the next generate call.
    pub fn push_output(&mut self, output: impl Into<String>) -> &mut Self {
        self.outputs.push_back(output.into());
        self
    }

    /// Build a backend pre-loaded with outputs.
    pub fn with_outputs<I, S>(outputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut backend = Self::new();
        for o in outputs {
            backend.outputs.push_back(o.into());
        }
        backend
    }

    /// Adapter path recorded by `apply_adapter`, if any.
    pub fn adapter_applied(&self) -> Option<&str> {
        self.adapter_applied.as_deref()
    }

    fn next_output(&mut self) -> ModelResult<String> {
        self.calls += 1;
        self.outputs.pop_front().ok_or_else(|| ModelError::Generation {
            message: "scripted backend exhausted".into(),
        })
    }
}

impl TextGenBackend for ScriptedBackend {
    fn generate(
        &mut self,
        _system: &str,
        _prompt: &str,
        _params: &GenerationParams,
    ) -> ModelResult<String> {
        self.next_output()
    }

    fn generate_stream(
        &mut self,
        _system: &str,
        _prompt: &str,
        _params: &GenerationParams,
        on_chunk: &mut dyn FnMut(&str) -> bool,
    ) -> ModelResult<String> {
        let output = self.next_output()?;
        let mut accumulated = String::new();
        let mut rest = output.as_str();
        while !rest.is_empty() {
            let mut cut = rest.len().min(SCRIPT_CHUNK);
            while !rest.is_char_boundary(cut) {
                cut += 1;
            }
            let (chunk, tail) = rest.split_at(cut);
            accumulated.push_str(chunk);
            if !on_chunk(chunk) {
                return Ok(accumulated);
            }
            rest = tail;
        }
        Ok(accumulated)
    }

    fn apply_adapter(&mut self, path: &Path) -> ModelResult<()> {
        self.adapter_applied = Some(path.display().to_string());
        Ok(())
    }
}
