//! System-prompt construction for the function-calling model.
//!
//! The prompt is a fixed instruction preamble (never reason, emit exactly one
//! call, explicit output grammar, enumerated function names) followed by a
//! situational context block. Kept deliberately short: prompt length is paid
//! on every utterance.

use std::fmt::Write;

use crate::call::FunctionName;
use crate::context::VoiceContext;
use crate::parser::{CALL_PREFIX, END_MARKER, START_MARKER};

/// Build the per-utterance system prompt.
pub fn build_system_prompt(ctx: &VoiceContext) -> String {
    let mut functions = String::new();
    for (i, name) in FunctionName::ALL.iter().enumerate() {
        if i > 0 {
            functions.push_str(", ");
        }
        functions.push_str(name.as_str());
    }

    let mut prompt = format!(
        "You interpret user voice commands and output exactly ONE function call.\n\
         You NEVER reason, explain, or generate text. You ONLY output function calls in the format:\n\
         {START_MARKER}{CALL_PREFIX}FUNCTION_NAME{{params}}{END_MARKER}\n\n\
         Available functions: {functions}\n\n\
         Context:\n\
         - section: {}\n",
        ctx.section.as_str()
    );
    if let Some(ref atom) = ctx.editing_atom {
        let _ = writeln!(prompt, "- editing: {atom}");
    }
    if let Some(ref project) = ctx.current_project {
        let _ = writeln!(prompt, "- project: {project}");
    }
    let _ = writeln!(prompt, "- date: {}", ctx.date.format("%Y-%m-%d"));
    prompt
}
