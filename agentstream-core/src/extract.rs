//! Recovery of the result value from the agent's structured-response line,
//! e.g. `Returning structured response: phase='reflect' result='…' is_completed=True`.
//!
//! Every function here is total: missing markers degrade to returning the best
//! available text.

pub const STRUCTURED_RESPONSE_MARKER: &str = "Returning structured response:";
pub const RESULT_KEY: &str = "result=";
/// Fields that may follow `result=`, in lookup order.
pub const TRAILING_FIELDS: [&str; 2] = [" is_simple_and_unrelevant=", " is_completed="];

pub fn extract_structured_result(text: &str) -> String {
    let Some(marker) = text.find(STRUCTURED_RESPONSE_MARKER) else {
        return text.to_string();
    };
    let structured = text[marker + STRUCTURED_RESPONSE_MARKER.len()..].trim();

    let Some(key) = structured.find(RESULT_KEY) else {
        return structured.to_string();
    };
    let value_start = key + RESULT_KEY.len();
    let rest = &structured[value_start..];

    let Some(end) = TRAILING_FIELDS.iter().find_map(|f| rest.find(f)) else {
        return structured[key..].to_string();
    };
    strip_one_quote_pair(rest[..end].trim()).to_string()
}

/// Apply [`extract_structured_result`] to the tail of a transcript starting at
/// the last structured-response marker, or to the whole transcript.
pub fn extract_from_transcript(transcript: &str) -> String {
    match transcript.rfind(STRUCTURED_RESPONSE_MARKER) {
        Some(pos) => extract_structured_result(&transcript[pos..]),
        None => transcript.to_string(),
    }
}

fn strip_one_quote_pair(s: &str) -> &str {
    let s = s.strip_prefix(['\'', '"']).unwrap_or(s);
    s.strip_suffix(['\'', '"']).unwrap_or(s)
}
