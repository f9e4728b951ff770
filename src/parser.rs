//! Function-call parser and validator.
//!
//! Converts the small model's constrained text output
//! `<start_function_call>call:NAME{params}<end_function_call>` into a
//! [`FunctionCall`], then checks it against the function's parameter schema.
//! The envelope grammar is the only contract this module relies on: anything
//! else is a parse failure, never a best-effort scrape.

use crate::call::{
    required_param_type, FunctionCall, FunctionName, FunctionParameter,
};
use crate::error::{ParseError, ParseResult};

/// Marker opening a function call in model output.
pub const START_MARKER: &str = "<start_function_call>";
/// Marker terminating a function call. Streaming consumers stop pulling the
/// moment the accumulated text contains this.
pub const END_MARKER: &str = "<end_function_call>";
/// Prefix between the start marker and the function name.
pub const CALL_PREFIX: &str = "call:";
/// Delimiter wrapping string values; the same token opens and closes.
pub const ESCAPE: &str = "<escape>";

// ---------------------------------------------------------------------------
// Parse
// ---------------------------------------------------------------------------

/// Parse raw model output into a validated [`FunctionCall`].
///
/// Fails with [`ParseError::InvalidOutput`] if either envelope marker is
/// absent, [`ParseError::ParsingFailed`] if the body cannot be decoded, and
/// the validation errors from [`validate`] otherwise.
pub fn parse_function_call(raw: &str) -> ParseResult<FunctionCall> {
    let call = parse_envelope(raw)?;
    validate(&call)?;
    Ok(call)
}

/// Parse the envelope without validating parameter schemas.
pub fn parse_envelope(raw: &str) -> ParseResult<FunctionCall> {
    let start = raw.find(START_MARKER).ok_or_else(|| ParseError::InvalidOutput {
        reason: "missing start marker".into(),
    })?;
    let after_start = start + START_MARKER.len();
    let end_rel = raw[after_start..].find(END_MARKER).ok_or_else(|| {
        ParseError::InvalidOutput {
            reason: "missing end marker".into(),
        }
    })?;
    let inner = raw[after_start..after_start + end_rel].trim();

    let rest = inner.strip_prefix(CALL_PREFIX).ok_or_else(|| ParseError::InvalidOutput {
        reason: format!("expected \"{CALL_PREFIX}\" after start marker"),
    })?;

    let brace = rest.find('{').ok_or_else(|| ParseError::ParsingFailed {
        message: "no parameter block".into(),
    })?;
    if !rest.ends_with('}') {
        return Err(ParseError::ParsingFailed {
            message: "unbalanced braces in parameter block".into(),
        });
    }
    let name_str = rest[..brace].trim();
    if name_str.is_empty() {
        return Err(ParseError::ParsingFailed {
            message: "empty function name".into(),
        });
    }
    let body = &rest[brace + 1..rest.len() - 1];

    let mut call = match FunctionName::parse(name_str) {
        Some(name) => FunctionCall::new(name),
        // Name lookup happens in validate(); keep the raw name for the error.
        None => {
            return Err(ParseError::UnknownFunction {
                name: name_str.to_string(),
            })
        }
    };

    for (key, value) in split_params(body)? {
        call = call.with_param(key, value);
    }
    Ok(call.with_raw(raw))
}

/// Split a relaxed `key:value,key:value` body, respecting escape spans and
/// nested braces/brackets inside values.
fn split_params(body: &str) -> ParseResult<Vec<(String, FunctionParameter)>> {
    let mut out = Vec::new();
    for field in split_top_level(body) {
        let field = field.trim();
        if field.is_empty() {
            continue;
        }
        let colon = find_top_level_colon(field).ok_or_else(|| ParseError::ParsingFailed {
            message: format!("parameter without ':' separator: \"{field}\""),
        })?;
        let key = field[..colon].trim();
        if key.is_empty() {
            return Err(ParseError::ParsingFailed {
                message: "empty parameter name".into(),
            });
        }
        let value = decode_value(field[colon + 1..].trim())?;
        out.push((key.to_string(), value));
    }
    Ok(out)
}

/// Decode a single value token.
///
/// Escape-wrapped values unescape to strings, except that JSON arrays/objects
/// inside an escape span (the model's encoding for `metadata`, `items`, etc.)
/// decode as containers. Bare tokens follow the fixed priority order.
fn decode_value(token: &str) -> ParseResult<FunctionParameter> {
    if let Some(inner) = unescape(token) {
        let trimmed = inner.trim();
        if trimmed.starts_with('[') || trimmed.starts_with('{') {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
                return Ok(FunctionParameter::from_json(&json));
            }
        }
        return Ok(FunctionParameter::Str(inner.to_string()));
    }
    if token.starts_with(ESCAPE) || token.ends_with(ESCAPE) {
        return Err(ParseError::ParsingFailed {
            message: "unterminated escape span".into(),
        });
    }
    if token.starts_with('[') || token.starts_with('{') {
        let json = serde_json::from_str::<serde_json::Value>(token).map_err(|e| {
            ParseError::ParsingFailed {
                message: format!("malformed inline JSON value: {e}"),
            }
        })?;
        return Ok(FunctionParameter::from_json(&json));
    }
    Ok(FunctionParameter::decode_bare(token))
}

/// Strip a balanced pair of escape delimiters, if present.
fn unescape(token: &str) -> Option<&str> {
    let inner = token.strip_prefix(ESCAPE)?.strip_suffix(ESCAPE)?;
    // `<escape><escape>` is the empty string; a single delimiter is not balanced.
    if token.len() >= 2 * ESCAPE.len() {
        Some(inner)
    } else {
        None
    }
}

/// Split on commas that are outside escape spans and outside nested
/// braces/brackets.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_escape = false;
    let mut start = 0;
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if body.is_char_boundary(i) && body[i..].starts_with(ESCAPE) {
            in_escape = !in_escape;
            i += ESCAPE.len();
            continue;
        }
        if !in_escape {
            match bytes[i] {
                b'{' | b'[' => depth += 1,
                b'}' | b']' => depth -= 1,
                b',' if depth == 0 => {
                    parts.push(&body[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        i += 1;
    }
    if start < body.len() {
        parts.push(&body[start..]);
    }
    parts
}

/// Find the key/value separator: the first ':' before any escape span.
fn find_top_level_colon(field: &str) -> Option<usize> {
    let escape_at = field.find(ESCAPE).unwrap_or(field.len());
    field[..escape_at].find(':')
}

// ---------------------------------------------------------------------------
// Validate
// ---------------------------------------------------------------------------

/// Check a call against its function's parameter schema.
///
/// Pure function, no side effects; must run before any dispatch. Fails with
/// [`ParseError::InvalidParameters`] naming the first missing or mistyped
/// field.
pub fn validate(call: &FunctionCall) -> ParseResult<()> {
    let name = call.name();
    for &required in name.required_params() {
        let ty = required_param_type(required);
        match call.get(required) {
            None => {
                return Err(ParseError::InvalidParameters {
                    function: name.to_string(),
                    field: required.to_string(),
                    reason: "missing required parameter".into(),
                })
            }
            Some(value) if !value.coercible_to(ty) => {
                return Err(ParseError::InvalidParameters {
                    function: name.to_string(),
                    field: required.to_string(),
                    reason: format!("value {value:?} is not coercible to {ty:?}"),
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Render a call back into the wire grammar. Inverse of [`parse_envelope`]
/// for every schema-conforming call; used by round-trip tests and for logging
/// calls in their wire shape.
pub fn encode(call: &FunctionCall) -> String {
    let mut body = String::new();
    for (i, (key, value)) in call.params().iter().enumerate() {
        if i > 0 {
            body.push(',');
        }
        body.push_str(key);
        body.push(':');
        body.push_str(&encode_value(value));
    }
    format!("{START_MARKER}{CALL_PREFIX}{}{{{body}}}{END_MARKER}", call.name())
}

fn encode_value(value: &FunctionParameter) -> String {
    match value {
        FunctionParameter::Null => "null".to_string(),
        FunctionParameter::Bool(b) => b.to_string(),
        FunctionParameter::Int(i) => i.to_string(),
        // Force a decimal point so the value round-trips as a double.
        FunctionParameter::Double(d) => {
            if d.fract() == 0.0 {
                format!("{d:.1}")
            } else {
                d.to_string()
            }
        }
        FunctionParameter::Str(s) => format!("{ESCAPE}{s}{ESCAPE}"),
        FunctionParameter::Array(_) | FunctionParameter::Object(_) => {
            format!("{ESCAPE}{}{ESCAPE}", value.to_json())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_search_example() {
        let raw = "<start_function_call>call:search_atoms{query:<escape>marketing ideas<escape>}<end_function_call>";
        let call = parse_function_call(raw).unwrap();
        assert_eq!(call.name(), FunctionName::SearchAtoms);
        assert_eq!(
            call.get("query"),
            Some(&FunctionParameter::Str("marketing ideas".into()))
        );
        assert_eq!(call.raw(), Some(raw));
    }

    #[test]
    fn parses_bare_scalars() {
        let raw = "<start_function_call>call:start_deep_work{duration_minutes:45,pomodoro_mode:true}<end_function_call>";
        let call = parse_function_call(raw).unwrap();
        assert_eq!(call.get("duration_minutes"), Some(&FunctionParameter::Int(45)));
        assert_eq!(call.get("pomodoro_mode"), Some(&FunctionParameter::Bool(true)));
    }

    #[test]
    fn parses_empty_params() {
        let raw = "<start_function_call>call:stop_deep_work{}<end_function_call>";
        let call = parse_function_call(raw).unwrap();
        assert!(call.params().is_empty());
    }

    #[test]
    fn parses_escaped_json_array() {
        let raw = r#"<start_function_call>call:batch_create{items:<escape>[{"atom_type":"task","title":"Call Sam"},{"atom_type":"task","title":"Ship build"}]<escape>}<end_function_call>"#;
        let call = parse_function_call(raw).unwrap();
        let items = call.get("items").unwrap().array_value().unwrap();
        assert_eq!(items.len(), 2);
        let first = items[0].object_value().unwrap();
        assert_eq!(
            first.get("title"),
            Some(&FunctionParameter::Str("Call Sam".into()))
        );
    }

    #[test]
    fn escaped_string_with_comma_and_colon_survives() {
        let raw = "<start_function_call>call:create_atom{atom_type:<escape>note<escape>,title:<escape>Plan: a, b, and c<escape>}<end_function_call>";
        let call = parse_function_call(raw).unwrap();
        assert_eq!(
            call.get("title"),
            Some(&FunctionParameter::Str("Plan: a, b, and c".into()))
        );
    }

    #[test]
    fn multibyte_text_inside_escape_span() {
        let raw = "<start_function_call>call:create_atom{atom_type:<escape>note<escape>,title:<escape>café notes, über plan<escape>}<end_function_call>";
        let call = parse_function_call(raw).unwrap();
        assert_eq!(
            call.get("title"),
            Some(&FunctionParameter::Str("café notes, über plan".into()))
        );
    }

    #[test]
    fn missing_start_marker_is_invalid_output() {
        let raw = "call:search_atoms{query:<escape>x<escape>}<end_function_call>";
        assert!(matches!(
            parse_function_call(raw),
            Err(ParseError::InvalidOutput { .. })
        ));
    }

    #[test]
    fn missing_end_marker_is_invalid_output() {
        let raw = "<start_function_call>call:search_atoms{query:<escape>x<escape>}";
        assert!(matches!(
            parse_function_call(raw),
            Err(ParseError::InvalidOutput { .. })
        ));
    }

    #[test]
    fn unbalanced_braces_fail_without_partial_call() {
        let raw = "<start_function_call>call:search_atoms{query:<escape>x<escape><end_function_call>";
        assert!(matches!(
            parse_function_call(raw),
            Err(ParseError::ParsingFailed { .. })
        ));
    }

    #[test]
    fn unknown_function_is_rejected() {
        let raw = "<start_function_call>call:fly_to_moon{}<end_function_call>";
        assert!(matches!(
            parse_function_call(raw),
            Err(ParseError::UnknownFunction { name }) if name == "fly_to_moon"
        ));
    }

    #[test]
    fn missing_required_param_names_the_field() {
        let raw = "<start_function_call>call:create_atom{atom_type:<escape>idea<escape>}<end_function_call>";
        match parse_function_call(raw) {
            Err(ParseError::InvalidParameters { field, .. }) => assert_eq!(field, "title"),
            other => panic!("expected InvalidParameters, got {other:?}"),
        }
    }

    #[test]
    fn mistyped_required_param_is_rejected() {
        // additional_minutes must coerce to an int.
        let raw = "<start_function_call>call:extend_deep_work{additional_minutes:<escape>soon<escape>}<end_function_call>";
        match parse_function_call(raw) {
            Err(ParseError::InvalidParameters { field, .. }) => {
                assert_eq!(field, "additional_minutes")
            }
            other => panic!("expected InvalidParameters, got {other:?}"),
        }
    }

    #[test]
    fn numeric_string_satisfies_int_requirement() {
        let raw = "<start_function_call>call:extend_deep_work{additional_minutes:<escape>15<escape>}<end_function_call>";
        let call = parse_function_call(raw).unwrap();
        assert_eq!(call.get("additional_minutes").unwrap().int_value(), Some(15));
    }

    #[test]
    fn trailing_text_after_end_marker_is_ignored() {
        let raw = "<start_function_call>call:navigate{destination:<escape>journal<escape>}<end_function_call>\nOkay, navigating!";
        let call = parse_function_call(raw).unwrap();
        assert_eq!(call.name(), FunctionName::Navigate);
    }

    #[test]
    fn round_trip_all_parameter_types() {
        use std::collections::BTreeMap;
        let mut meta = BTreeMap::new();
        meta.insert("priority".to_string(), FunctionParameter::Str("high".into()));
        meta.insert("effort".to_string(), FunctionParameter::Int(3));

        let call = FunctionCall::new(FunctionName::CreateAtom)
            .with_str("atom_type", "task")
            .with_str("title", "Write launch email")
            .with_param("duration_minutes", FunctionParameter::Int(30))
            .with_param("score", FunctionParameter::Double(4.0))
            .with_param("pinned", FunctionParameter::Bool(false))
            .with_param("parent", FunctionParameter::Null)
            .with_param(
                "links",
                FunctionParameter::Array(vec![
                    FunctionParameter::Str("proj-1".into()),
                    FunctionParameter::Str("proj-2".into()),
                ]),
            )
            .with_param("metadata", FunctionParameter::Object(meta));

        let decoded = parse_function_call(&encode(&call)).unwrap();
        assert_eq!(decoded, call);
    }

    #[test]
    fn round_trip_every_function_name() {
        for name in FunctionName::ALL {
            let mut call = FunctionCall::new(name);
            for &param in name.required_params() {
                call = match crate::call::required_param_type(param) {
                    crate::call::ParamType::Array => call.with_param(
                        param,
                        FunctionParameter::Array(vec![FunctionParameter::Str("x".into())]),
                    ),
                    crate::call::ParamType::Int => {
                        call.with_param(param, FunctionParameter::Int(10))
                    }
                    _ => call.with_str(param, "value"),
                };
            }
            let decoded = parse_function_call(&encode(&call)).unwrap();
            assert_eq!(decoded, call, "round trip failed for {name}");
        }
    }
}
