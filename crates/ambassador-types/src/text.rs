//! Text and hex helpers used for token names and metadata.

/// Hex-encode the UTF-8 bytes of a string.
///
/// Member token names are `string_to_hex(&count.to_string())`.
pub fn string_to_hex(s: &str) -> String {
    hex::encode(s.as_bytes())
}

/// Decode hex back into a UTF-8 string. Returns `None` on bad hex or
/// invalid UTF-8.
pub fn hex_to_string(h: &str) -> Option<String> {
    let bytes = hex::decode(h).ok()?;
    String::from_utf8(bytes).ok()
}

/// Whether `s` is a non-empty, even-length hex string of exactly
/// `expected_bytes` bytes.
pub fn is_hex_of_len(s: &str, expected_bytes: usize) -> bool {
    s.len() == expected_bytes * 2 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_to_hex_counter_values() {
        assert_eq!(string_to_hex("0"), "30");
        assert_eq!(string_to_hex("5"), "35");
        assert_eq!(string_to_hex("12"), "3132");
    }

    #[test]
    fn test_hex_to_string() {
        assert_eq!(hex_to_string("3132").as_deref(), Some("12"));
        assert_eq!(hex_to_string("zz"), None);
        assert_eq!(hex_to_string("ff"), None);
    }

    #[test]
    fn test_is_hex_of_len() {
        assert!(is_hex_of_len(&"ab".repeat(28), 28));
        assert!(!is_hex_of_len(&"ab".repeat(27), 28));
        assert!(!is_hex_of_len(&"zz".repeat(28), 28));
    }
}
