use unicode_normalization::UnicodeNormalization;

/// Unicode NFC + BOM strip + CRLF -> LF. Whitespace is kept: token boundaries
/// can fall in the middle of a sentence.
fn clean_text(s: &str) -> String {
    let mut t = s.nfc().collect::<String>();
    if t.starts_with('\u{FEFF}') {
        t.remove(0);
    }
    if t.contains("\r\n") {
        t = t.replace("\r\n", "\n");
    }
    t
}

/// Normalize streamed token content; empty content is ignored.
pub fn normalize_token(content: &str) -> Option<String> {
    if content.is_empty() {
        return None;
    }
    let t = clean_text(content);
    if t.is_empty() { None } else { Some(t) }
}

/// Final result text: escaped `\n` sequences become newlines, then trim.
pub fn normalize_result(text: &str) -> String {
    clean_text(text).replace("\\n", "\n").trim().to_string()
}
