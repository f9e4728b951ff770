//! Rich diagnostic error types for the voxa routing core.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the voxa routing core.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum VoxError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Cloud(#[from] CloudError),
}

/// Result type for top-level operations.
pub type VoxResult<T> = std::result::Result<T, VoxError>;

// ---------------------------------------------------------------------------
// Model errors
// ---------------------------------------------------------------------------

/// Errors from the small-model engine.
#[derive(Debug, Error, Diagnostic)]
pub enum ModelError {
    #[error("model is not loaded")]
    #[diagnostic(
        code(voxa::model::not_loaded),
        help("Call `load_model()` before requesting a generation.")
    )]
    NotLoaded,

    #[error("model backend failed to load: {message}")]
    #[diagnostic(
        code(voxa::model::load_failed),
        help(
            "The text-generation backend could not be initialized. \
             Check that the inference server is running and the model \
             name in the engine config is correct."
        )
    )]
    LoadFailed { message: String },

    #[error("generation failed: {message}")]
    #[diagnostic(
        code(voxa::model::generation),
        help(
            "The backend accepted the request but failed mid-generation. \
             This tier is terminal for the current utterance; retry policy \
             belongs to the caller."
        )
    )]
    Generation { message: String },
}

/// Result type for model-engine operations.
pub type ModelResult<T> = std::result::Result<T, ModelError>;

// ---------------------------------------------------------------------------
// Parse / validation errors
// ---------------------------------------------------------------------------

/// Errors from the function-call parser and validator.
#[derive(Debug, Error, Diagnostic)]
pub enum ParseError {
    #[error("invalid model output: {reason}")]
    #[diagnostic(
        code(voxa::parse::invalid_output),
        help(
            "The model deviated from its constrained output format \
             (missing or malformed envelope markers). No best-effort \
             recovery is attempted."
        )
    )]
    InvalidOutput { reason: String },

    #[error("failed to parse function-call body: {message}")]
    #[diagnostic(
        code(voxa::parse::body),
        help("The envelope was present but the parameter body could not be decoded.")
    )]
    ParsingFailed { message: String },

    #[error("unknown function: \"{name}\"")]
    #[diagnostic(
        code(voxa::parse::unknown_function),
        help("The function name is not in the closed enumeration. See `FunctionName::ALL`.")
    )]
    UnknownFunction { name: String },

    #[error("invalid parameters for {function}: {reason} (field: {field})")]
    #[diagnostic(
        code(voxa::parse::invalid_params),
        help("A required parameter is missing or has a type that cannot be coerced.")
    )]
    InvalidParameters {
        function: String,
        field: String,
        reason: String,
    },
}

/// Result type for parse/validate operations.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

// ---------------------------------------------------------------------------
// Execution errors
// ---------------------------------------------------------------------------

/// Errors from the tool executor and its collaborators.
#[derive(Debug, Error, Diagnostic)]
pub enum ExecError {
    #[error("missing dependency: {what}")]
    #[diagnostic(
        code(voxa::exec::missing_dependency),
        help(
            "The executor was built without a collaborator this function needs. \
             This is a configuration error, not a transient failure; wire the \
             dependency in at construction time."
        )
    )]
    MissingDependency { what: String },

    #[error("execution failed: {message}")]
    #[diagnostic(
        code(voxa::exec::failed),
        help("A collaborator (repository, session handler) reported a failure.")
    )]
    ExecutionFailed { message: String },

    #[error("no atom is being edited, cannot resolve \"context\" target")]
    #[diagnostic(
        code(voxa::exec::no_context_target),
        help("The \"context\" target requires an atom to be open in the editor.")
    )]
    NoContextTarget,

    #[error("nothing has been created yet, cannot resolve \"lastCreated\" target")]
    #[diagnostic(
        code(voxa::exec::no_last_created),
        help("The \"lastCreated\" target requires at least one prior creation.")
    )]
    NoLastCreated,

    #[error("\"firstResult\" target requires a prior search in the same request")]
    #[diagnostic(
        code(voxa::exec::search_required),
        help(
            "There is no cross-request search-result memory. Search and act \
             on the result in the same utterance, or name the atom directly."
        )
    )]
    SearchRequired,

    #[error("no handler registered for function \"{name}\"")]
    #[diagnostic(
        code(voxa::exec::unhandled_function),
        help(
            "Validation should have rejected this call; a registered function \
             without a handler is a programming error. The completeness test \
             in the executor module catches this at test time."
        )
    )]
    UnhandledFunction { name: String },
}

/// Result type for executor operations.
pub type ExecResult<T> = std::result::Result<T, ExecError>;

// ---------------------------------------------------------------------------
// Cloud client errors
// ---------------------------------------------------------------------------

/// Errors from the large-model (cloud) client.
#[derive(Debug, Error, Diagnostic)]
pub enum CloudError {
    #[error("no cloud client is configured")]
    #[diagnostic(
        code(voxa::cloud::not_configured),
        help(
            "Cloud synthesis is unavailable. The orchestrator degrades to the \
             local tier automatically; this error only surfaces when the cloud \
             is called directly."
        )
    )]
    NotConfigured,

    #[error("cloud request failed: {message}")]
    #[diagnostic(
        code(voxa::cloud::request_failed),
        help("Check network connectivity and the configured base URL / API key.")
    )]
    RequestFailed { message: String },

    #[error("failed to parse cloud response: {message}")]
    #[diagnostic(
        code(voxa::cloud::parse_error),
        help("The cloud service returned an unexpected response format.")
    )]
    ResponseParse { message: String },
}

/// Result type for cloud-client operations.
pub type CloudResult<T> = std::result::Result<T, CloudError>;

/// Translate an internal error into the one-line message shown to the user.
///
/// This is the only place raw error kinds cross into user-visible text; no
/// error codes or chains leak through.
pub fn user_message(err: &VoxError) -> String {
    match err {
        VoxError::Model(ModelError::NotLoaded) => {
            "The voice model isn't ready yet, try again in a moment".to_string()
        }
        VoxError::Model(_) => "The voice model couldn't process that".to_string(),
        VoxError::Parse(ParseError::UnknownFunction { name }) => {
            format!("I don't know how to \"{name}\"")
        }
        VoxError::Parse(_) => "Sorry, I didn't catch that".to_string(),
        VoxError::Exec(ExecError::NoContextTarget) => {
            "Open something first so I know what to change".to_string()
        }
        VoxError::Exec(ExecError::NoLastCreated) => {
            "Nothing has been created yet".to_string()
        }
        VoxError::Exec(ExecError::SearchRequired) => {
            "Search for it first, then tell me which one".to_string()
        }
        VoxError::Exec(ExecError::ExecutionFailed { message }) => {
            format!("That didn't work: {message}")
        }
        VoxError::Exec(_) => "That didn't work".to_string(),
        VoxError::Cloud(_) => "The assistant service is unreachable right now".to_string(),
    }
}
