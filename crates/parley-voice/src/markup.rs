//! Prosody markup for batch synthesis.

const SENTENCE_PAUSE: &str = r#"<break time="300ms"/>"#;

/// Escapes the five XML special characters.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

/// Wraps `text` in a `<speak>` document with a slightly raised pitch and a
/// short pause after each sentence end.
///
/// A pause is inserted after `.`, `!` or `?` when followed by whitespace or
/// the end of the text, so decimals and URLs are left alone.
pub fn prosody_markup(text: &str) -> String {
    let escaped = escape_xml(text.trim());
    let mut body = String::with_capacity(escaped.len() + 64);
    let mut chars = escaped.chars().peekable();
    while let Some(ch) = chars.next() {
        body.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            match chars.peek() {
                None => body.push_str(SENTENCE_PAUSE),
                Some(next) if next.is_whitespace() => body.push_str(SENTENCE_PAUSE),
                Some(_) => {}
            }
        }
    }
    format!(r#"<speak><prosody rate="medium" pitch="+5%">{body}</prosody></speak>"#)
}
