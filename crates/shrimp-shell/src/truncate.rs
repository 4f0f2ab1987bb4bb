//! Output trimming for tool results.
//!
//! Command output can be arbitrarily large; callers see at most the last
//! `max_chars` bytes, prefixed with a truncation marker. The cut is snapped
//! to a UTF-8 boundary so multi-byte sequences are never split.

pub const TRUNCATION_PREFIX: &str = "...[truncated]";

/// Keep the last `max_chars` bytes of `output`, marking the cut.
pub fn trim_tail(output: &str, max_chars: usize) -> String {
    if output.len() <= max_chars {
        return output.to_owned();
    }
    let mut idx = output.len() - max_chars;
    while !output.is_char_boundary(idx) {
        idx += 1;
    }
    format!("{TRUNCATION_PREFIX}{}", &output[idx..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_output_passes_through() {
        assert_eq!(trim_tail("hello", 100), "hello");
    }

    #[test]
    fn exact_fit_is_not_marked() {
        let s = "x".repeat(100);
        assert_eq!(trim_tail(&s, 100), s);
    }

    #[test]
    fn long_output_keeps_the_tail() {
        let s = format!("{}{}", "a".repeat(500), "tail");
        let trimmed = trim_tail(&s, 100);
        assert!(trimmed.starts_with(TRUNCATION_PREFIX));
        assert!(trimmed.ends_with("tail"));
        assert_eq!(trimmed.len(), TRUNCATION_PREFIX.len() + 100);
    }

    #[test]
    fn cut_snaps_to_char_boundary() {
        let s = "€".repeat(1_000);
        let trimmed = trim_tail(&s, 100);
        assert!(trimmed.starts_with(TRUNCATION_PREFIX));
        // Must not panic and must stay valid UTF-8.
        assert!(trimmed.chars().count() > 0);
    }
}
