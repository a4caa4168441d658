//! Canonical extension keys.
//!
//! Every other component deals in normalized keys only: lowercase, a single
//! leading dot, and the character set the shell accepts for extensions. Raw
//! user input goes through [`normalize_ext`] exactly once, at the boundary.

use regex::Regex;
use std::sync::OnceLock;

static EXT_RE: OnceLock<Regex> = OnceLock::new();

fn ext_pattern() -> &'static Regex {
    EXT_RE.get_or_init(|| {
        Regex::new(r"^\.[A-Za-z0-9][A-Za-z0-9_.+\-]*$").expect("extension pattern compiles")
    })
}

/// Normalize a raw extension string into its canonical key.
///
/// Trims whitespace, prepends the leading dot if missing, lowercases.
/// Empty or whitespace-only input yields the empty string, which is never a
/// valid key.
pub fn normalize_ext(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let with_dot = if trimmed.starts_with('.') {
        trimmed.to_string()
    } else {
        format!(".{trimmed}")
    };
    with_dot.to_lowercase()
}

/// True iff the input normalizes to a well-formed extension key.
pub fn is_valid_ext(ext: &str) -> bool {
    let key = normalize_ext(ext);
    !key.is_empty() && ext_pattern().is_match(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_prepends_dot_and_lowercases() {
        assert_eq!(normalize_ext("PDF"), ".pdf");
        assert_eq!(normalize_ext(".TxT"), ".txt");
        assert_eq!(normalize_ext("  html  "), ".html");
    }

    #[test]
    fn normalize_empty_input_yields_empty_key() {
        assert_eq!(normalize_ext(""), "");
        assert_eq!(normalize_ext("   "), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["pdf", ".PDF", " .Tar.Gz ", "c++", "7z", ""] {
            let once = normalize_ext(raw);
            assert_eq!(normalize_ext(&once), once);
        }
    }

    #[test]
    fn validity_table() {
        assert!(is_valid_ext(".pdf"));
        assert!(is_valid_ext("pdf"));
        assert!(is_valid_ext(".tar.gz"));
        assert!(is_valid_ext(".c++"));
        assert!(is_valid_ext(".7z"));
        assert!(is_valid_ext(".x_y-z"));

        assert!(!is_valid_ext(""));
        assert!(!is_valid_ext("."));
        assert!(!is_valid_ext(".."));
        assert!(!is_valid_ext(".-bad"));
        assert!(!is_valid_ext(".has space"));
        assert!(!is_valid_ext(".päd"));
    }
}
