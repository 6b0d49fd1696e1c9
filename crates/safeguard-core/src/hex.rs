//! Lowercase hex encoding.
//!
//! Two hex digits per byte, no separators, no prefix. Decoding accepts
//! exactly the characters `0-9a-f`; anything else (including uppercase)
//! is rejected so that callers on trusted paths can fail closed instead
//! of guessing at the input.

/// Encodes a byte sequence as lowercase hex.
pub fn encode_hex(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";

    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(DIGITS[usize::from(byte >> 4)] as char);
        out.push(DIGITS[usize::from(byte & 0x0f)] as char);
    }
    out
}

/// Decodes lowercase hex back into bytes.
///
/// Returns `None` for odd-length input or any character outside `0-9a-f`.
pub fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    let raw = hex.as_bytes();
    if raw.len() % 2 != 0 {
        return None;
    }

    let mut out = Vec::with_capacity(raw.len() / 2);
    for pair in raw.chunks_exact(2) {
        out.push(digit_value(pair[0])? << 4 | digit_value(pair[1])?);
    }
    Some(out)
}

fn digit_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}
