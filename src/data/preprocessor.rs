// ============================================================
// Layer 4 — Text Preprocessor
// ============================================================
// Normalises raw lines before they reach the vocabulary.
//
// Text copied out of web pages and word processors is full of
// characters that look like a plain space but are not:
//   - Non-breaking spaces (U+00A0)
//   - Zero-width spaces (U+200B)
//   - Byte order marks (U+FEFF) at the start of a file
//   - Tabs and stray control characters
//
// Left alone, each of these becomes an [UNK] position in the
// training windows. Cleaning maps them to a plain space (or
// drops them) and then trims the line.
//
// Reference: Rust Book §8 (Strings in Rust)

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Clean one line: normalise odd whitespace, drop control
    /// characters, trim both ends.
    pub fn clean_line(&self, line: &str) -> String {
        let normalised: String = line
            .chars()
            .filter_map(|c| match c {
                '\t' | '\u{00A0}' | '\u{3000}' => Some(' '),
                // invisible characters: drop
                '\u{200B}' | '\u{FEFF}' => None,
                c if c.is_control() => None,
                c => Some(c),
            })
            .collect();

        normalised.trim().to_string()
    }

    /// Clean every line and concatenate with no separator.
    pub fn flatten<S: AsRef<str>>(&self, lines: &[S]) -> String {
        lines
            .iter()
            .map(|line| self.clean_line(line.as_ref()))
            .collect()
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_edges() {
        let p = Preprocessor::new();
        assert_eq!(p.clean_line("  hello world  "), "hello world");
    }

    #[test]
    fn test_keeps_interior_spaces() {
        let p = Preprocessor::new();
        assert_eq!(p.clean_line("a  b"), "a  b");
    }

    #[test]
    fn test_drops_invisible_characters() {
        let p = Preprocessor::new();
        assert_eq!(p.clean_line("\u{FEFF}李慕\u{200B}站"), "李慕站");
    }

    #[test]
    fn test_full_width_space_becomes_plain_space() {
        let p = Preprocessor::new();
        assert_eq!(p.clean_line("深深\u{3000}的"), "深深 的");
    }

    #[test]
    fn test_flatten_joins_without_separator() {
        let p = Preprocessor::new();
        assert_eq!(p.flatten(&[" ab ", "", "c\r"]), "abc");
    }

    #[test]
    fn test_empty_string() {
        let p = Preprocessor::new();
        assert_eq!(p.clean_line(""), "");
    }
}
