//! Result marker for one-shot invocations
//!
//! A stateless run prints diagnostics freely and then its final answer after
//! a blank line prefixed with `Response:`. Callers that capture stdout use
//! [`extract_response`] to recover the answer.

/// The line prefix that introduces the final answer
pub const RESPONSE_MARKER: &str = "Response:";

/// Render the final answer with its marker, ready to print
pub fn format_response(text: &str) -> String {
    format!("\n{} {}", RESPONSE_MARKER, text)
}

/// Text following the first marker, trimmed; the whole output when absent
pub fn extract_response(stdout: &str) -> String {
    let needle = format!("\n{}", RESPONSE_MARKER);
    match stdout.find(&needle) {
        Some(idx) => stdout[idx + needle.len()..].trim().to_string(),
        None => stdout.trim().to_string(),
    }
}
