//! Text normalization for outbound prompt text.
//!
//! Typographic punctuation is folded to ASCII and anything outside the
//! accepted set (tab, newline, carriage return, printable ASCII and
//! U+00A0..=U+017F) is dropped. Applying the function twice gives the same
//! result as applying it once.

/// Normalizes `input` for transmission to the backend.
pub fn sanitize_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\u{2010}'..='\u{2015}' | '\u{2212}' => out.push('-'),
            '\u{2018}'..='\u{201B}' | '\u{2032}' => out.push('\''),
            '\u{201C}'..='\u{201F}' | '\u{2033}' => out.push('"'),
            '\u{2026}' => out.push_str("..."),
            c if is_allowed(c) => out.push(c),
            _ => {}
        }
    }
    out
}

fn is_allowed(ch: char) -> bool {
    matches!(ch, '\t' | '\n' | '\r' | ' '..='~' | '\u{00A0}'..='\u{017F}')
}
