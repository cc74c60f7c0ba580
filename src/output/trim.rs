//! Caller-facing size bounds.

use std::borrow::Cow;

/// Bounds text handed back to the caller.
///
/// Only the caller payload is trimmed; the request log always receives the
/// untrimmed text.
pub struct Trimmer;

impl Trimmer {
    /// Keep at most `max_chars` characters, then append a summary of how
    /// many were dropped.
    pub fn trim(text: &str, max_chars: usize) -> Cow<'_, str> {
        let total = text.chars().count();
        if total <= max_chars {
            return Cow::Borrowed(text);
        }

        let cut = text
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(text.len());
        Cow::Owned(format!("{}{}", &text[..cut], Self::suffix(total - max_chars)))
    }

    /// Suffix appended after a trimmed payload.
    pub fn suffix(omitted: usize) -> String {
        format!("\n...[trimmed {} chars]", omitted)
    }

    /// Payload used when a completed command printed nothing.
    pub fn placeholder(exit_code: i32) -> String {
        if exit_code == 0 {
            "(ok)".to_string()
        } else {
            format!("(exit {})", exit_code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_bound_unchanged() {
        assert!(matches!(Trimmer::trim("hello", 5), Cow::Borrowed("hello")));
        assert_eq!(Trimmer::trim("", 0), "");
    }

    #[test]
    fn test_trimmed_with_suffix() {
        let big = "X".repeat(120);
        let trimmed = Trimmer::trim(&big, 50);
        assert!(trimmed.ends_with("...[trimmed 70 chars]"));
        assert_eq!(
            trimmed.chars().count(),
            50 + Trimmer::suffix(70).chars().count()
        );
        assert!(trimmed.starts_with(&"X".repeat(50)));
    }

    #[test]
    fn test_trims_on_char_boundary() {
        let text = "你好世界";
        let trimmed = Trimmer::trim(text, 2);
        assert_eq!(trimmed, format!("你好{}", Trimmer::suffix(2)));
    }

    #[test]
    fn test_zero_max() {
        assert_eq!(Trimmer::trim("abc", 0), Trimmer::suffix(3));
    }

    #[test]
    fn test_placeholder() {
        assert_eq!(Trimmer::placeholder(0), "(ok)");
        assert_eq!(Trimmer::placeholder(5), "(exit 5)");
        assert_eq!(Trimmer::placeholder(-1), "(exit -1)");
    }
}
