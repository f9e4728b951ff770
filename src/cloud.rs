//! Large-model (cloud) client.
//!
//! Tier 2 is used for exactly two things: generative synthesis responses and
//! the one escalation function (`trigger_correlation_analysis`). Absence of a
//! configured client is an ordinary state, not an error; the orchestrator
//! degrades to the local tier when the cloud is unreachable.

use crate::context::VoiceContext;
use crate::error::{CloudError, CloudResult};
use crate::intent::IntentClassification;

/// The cloud collaborator interface.
pub trait CloudClient: Send + Sync {
    /// Kick off a deep correlation analysis over the given dimensions.
    /// Returns an analysis id the UI can poll.
    fn trigger_correlation_analysis(
        &self,
        dimensions: &[String],
        reason: Option<&str>,
    ) -> CloudResult<String>;

    /// Free-form synthesis for generative requests.
    fn generate_synthesis(
        &self,
        transcript: &str,
        ctx: &VoiceContext,
        intent: &IntentClassification,
    ) -> CloudResult<String>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// Configuration for the HTTP cloud client.
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// Base URL of the synthesis service.
    pub base_url: String,
    /// Bearer token, if the service requires one.
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8787".into(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// Cloud client speaking a small JSON API over HTTP.
pub struct HttpCloudClient {
    config: CloudConfig,
}

impl HttpCloudClient {
    pub fn new(config: CloudConfig) -> Self {
        Self { config }
    }

    fn agent(&self) -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout(std::time::Duration::from_secs(self.config.timeout_secs))
            .build()
    }

    fn post(&self, path: &str, body: &serde_json::Value) -> CloudResult<serde_json::Value> {
        let url = format!("{}{path}", self.config.base_url);
        let body_str = serde_json::to_string(body).map_err(|e| CloudError::RequestFailed {
            message: format!("JSON serialize error: {e}"),
        })?;

        let mut req = self.agent().post(&url).set("Content-Type", "application/json");
        if let Some(ref key) = self.config.api_key {
            req = req.set("Authorization", &format!("Bearer {key}"));
        }

        let resp = req
            .send_string(&body_str)
            .map_err(|e: ureq::Error| CloudError::RequestFailed {
                message: e.to_string(),
            })?;
        let resp_str = resp.into_string().map_err(|e| CloudError::ResponseParse {
            message: e.to_string(),
        })?;
        serde_json::from_str(&resp_str).map_err(|e| CloudError::ResponseParse {
            message: e.to_string(),
        })
    }
}

impl CloudClient for HttpCloudClient {
    fn trigger_correlation_analysis(
        &self,
        dimensions: &[String],
        reason: Option<&str>,
    ) -> CloudResult<String> {
        let body = serde_json::json!({
            "dimensions": dimensions,
            "reason": reason,
        });
        let json = self.post("/v1/analysis", &body)?;
        json["analysis_id"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| CloudError::ResponseParse {
                message: "missing 'analysis_id' field".into(),
            })
    }

    fn generate_synthesis(
        &self,
        transcript: &str,
        ctx: &VoiceContext,
        intent: &IntentClassification,
    ) -> CloudResult<String> {
        let body = serde_json::json!({
            "transcript": transcript,
            "section": ctx.section.as_str(),
            "project": ctx.current_project,
            "date": ctx.date.to_string(),
            "intent": format!("{:?}", intent.primary),
        });
        let json = self.post("/v1/synthesis", &body)?;
        json["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| CloudError::ResponseParse {
                message: "missing 'text' field".into(),
            })
    }
}

impl std::fmt::Debug for HttpCloudClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCloudClient")
            .field("base_url", &self.config.base_url)
            .field("has_api_key", &self.config.api_key.is_some())
            .finish()
    }
}
