//! Control-character stripping for configuration strings (`spec.md` §4.1):
//! "Every configuration string is sanitized by removing control
//! characters (bytes below space and delete) and trimming whitespace; an
//! empty result after sanitization is a construction error."

/// Remove bytes below `' '` and the DEL byte, then trim whitespace.
pub fn sanitize_config_value(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .filter(|&ch| ch >= ' ' && ch != '\u{7f}')
        .collect();
    cleaned.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_control_characters_and_trims() {
        assert_eq!(sanitize_config_value("  abc\x00\x1f\x7f  "), "abc");
    }

    #[test]
    fn all_control_characters_yields_empty() {
        assert_eq!(sanitize_config_value("\x00\x01  \x7f"), "");
    }

    #[test]
    fn ordinary_value_is_unchanged() {
        assert_eq!(sanitize_config_value("https://api.example.com"), "https://api.example.com");
    }
}
