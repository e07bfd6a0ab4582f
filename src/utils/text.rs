//! Small text helpers shared by the parsers and the settings reader.

/// Collapse runs of whitespace into single spaces and trim the ends
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Interpret a settings value as a boolean
///
/// `true`, `t`, `1`, `yes` and `y` (any case) are true; everything else is
/// false.
pub fn bool_string(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "t" | "1" | "yes" | "y"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \n\t b  "), "a b");
        assert_eq!(normalize_whitespace(" \n "), "");
    }

    #[test]
    fn test_bool_string() {
        for yes in ["true", "T", "1", "Yes", " y "] {
            assert!(bool_string(yes), "{yes}");
        }
        for no in ["false", "0", "no", "", "maybe"] {
            assert!(!bool_string(no), "{no}");
        }
    }
}
