//! # voxa
//!
//! A tiered voice-command routing core: transcripts in, executed commands and
//! one-line confirmations out.
//!
//! ## Architecture
//!
//! - **Tier 0** (`pattern`): deterministic regex matcher for high-frequency
//!   command shapes, zero model latency
//! - **Tier 1** (`model`): small on-device function-calling model emitting a
//!   constrained `<start_function_call>…<end_function_call>` grammar
//! - **Tier 2** (`cloud`): large-model synthesis for generative requests,
//!   with automatic degradation to tier 1 when unreachable
//! - **Parser** (`parser`): envelope parse + typed decode + required-param
//!   validation over the closed function enumeration
//! - **Executor** (`exec`): dispatch table mapping every function name to a
//!   handler over injected collaborators
//! - **Orchestrator** (`orchestrator`): tier selection, fallback, and metrics
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use voxa::context::{Section, VoiceContext};
//! use voxa::exec::ToolExecutor;
//! use voxa::intent::KeywordClassifier;
//! use voxa::model::{GemmaConfig, GemmaEngine};
//! use voxa::orchestrator::VoiceRouter;
//! use voxa::pattern::RegexMatcher;
//! use voxa::repo::MemoryRepository;
//! use voxa::session::ClockSessionHandler;
//!
//! let executor = ToolExecutor::builder()
//!     .repository(Arc::new(MemoryRepository::new()))
//!     .sessions(Arc::new(ClockSessionHandler::new()))
//!     .build();
//! let engine = Arc::new(GemmaEngine::new(GemmaConfig::default()));
//! let router = VoiceRouter::new(
//!     Box::new(RegexMatcher),
//!     Box::new(KeywordClassifier),
//!     engine,
//!     executor,
//! );
//! let ctx = VoiceContext::new(Section::Home, chrono::Local::now().date_naive());
//! let outcome = router.route("create a task: ship the build", &ctx);
//! println!("{}", outcome.message);
//! ```

pub mod call;
pub mod cloud;
pub mod context;
pub mod error;
pub mod events;
pub mod exec;
pub mod intent;
pub mod model;
pub mod orchestrator;
pub mod parser;
pub mod pattern;
pub mod repo;
pub mod result;
pub mod session;

pub use call::{FunctionCall, FunctionName, FunctionParameter};
pub use error::{VoxError, VoxResult};
pub use orchestrator::{RouteOutcome, Tier, VoiceRouter};
