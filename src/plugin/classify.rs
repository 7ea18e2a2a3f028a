//! Single-pass `op` detection on a raw request body.
//!
//! The body is not tokenized. Quoted strings are tracked by counting
//! unescaped `"`; once a closed literal of exactly two bytes equals `op`
//! (any case), the next closed literal is returned. This avoids decoding the
//! payload twice but can be fooled by crafted input, e.g. `"op"` used as a
//! value, or an escaped backslash right before a closing quote.

/// Locate the value of the `op` key in `data`, if any.
#[must_use]
pub fn scan_op(data: &[u8]) -> Option<&[u8]> {
    let mut quotes = 0usize;
    let mut start = 0usize;
    let mut found_key = false;

    for (index, &byte) in data.iter().enumerate() {
        if byte != b'"' {
            continue;
        }

        if index > 0 && data[index - 1] == b'\\' {
            continue;
        }

        quotes += 1;

        if quotes % 2 == 1 {
            start = index;
            continue;
        }

        let literal = &data[start + 1..index];

        if literal.eq_ignore_ascii_case(b"op") {
            found_key = true;
        } else if found_key {
            return Some(literal);
        }
    }

    None
}
