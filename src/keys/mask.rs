//! Glob masks for filtering collection elements.
//!
//! `*` matches any run of characters (including none); every other character
//! is literal. A backslash makes the next character literal, so `\*` matches
//! a star. The whole value must match, not a substring of it.

/// The mask that disables filtering.
pub const MATCH_ALL: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Compiled {
    All,
    /// Literal runs separated by `*`. A single run means no wildcard at all.
    Segments(Vec<String>),
    /// Malformed mask, matches nothing.
    Nothing,
}

/// A compiled mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    source: String,
    compiled: Compiled,
}

impl Mask {
    /// Compiles `mask`. A malformed mask is logged and matches nothing.
    pub fn new(mask: &str) -> Self {
        let compiled = if mask == MATCH_ALL {
            Compiled::All
        } else {
            match compile(mask) {
                Some(segments) => Compiled::Segments(segments),
                None => {
                    log::warn!("malformed mask {:?}, nothing will match", mask);
                    Compiled::Nothing
                }
            }
        };
        Self {
            source: mask.to_string(),
            compiled,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match_all(&self) -> bool {
        self.compiled == Compiled::All
    }

    pub fn matches(&self, value: &str) -> bool {
        match &self.compiled {
            Compiled::All => true,
            Compiled::Nothing => false,
            Compiled::Segments(segments) => match_segments(segments, value),
        }
    }
}

impl Default for Mask {
    fn default() -> Self {
        Mask::new(MATCH_ALL)
    }
}

/// Decides whether `value` matches `mask`.
pub fn matches(value: &str, mask: &str) -> bool {
    Mask::new(mask).matches(value)
}

fn compile(mask: &str) -> Option<Vec<String>> {
    let mut segments = vec![String::new()];
    let mut chars = mask.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => segments.push(String::new()),
            '\\' => {
                let escaped = chars.next()?;
                segments.last_mut()?.push(escaped);
            }
            _ => segments.last_mut()?.push(c),
        }
    }
    Some(segments)
}

fn match_segments(segments: &[String], value: &str) -> bool {
    let (first, rest) = match segments.split_first() {
        Some(split) => split,
        None => return value.is_empty(),
    };
    let Some((last, middle)) = rest.split_last() else {
        return value == first;
    };
    if value.len() < first.len() + last.len()
        || !value.starts_with(first.as_str())
        || !value.ends_with(last.as_str())
    {
        return false;
    }
    let mut remaining = &value[first.len()..value.len() - last.len()];
    for segment in middle {
        match remaining.find(segment.as_str()) {
            Some(pos) => remaining = &remaining[pos + segment.len()..],
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_all() {
        assert!(matches("", "*"));
        assert!(matches("anything", "*"));
        assert!(matches("\u{1}binary\u{ff}", "*"));
        assert!(Mask::new("*").is_match_all());
        assert!(!Mask::new("a*").is_match_all());
    }

    #[test]
    fn test_anchored_match() {
        assert!(matches("abc", "a*c"));
        assert!(matches("ac", "a*c"));
        assert!(!matches("abcd", "a*c"));
        assert!(!matches("xabc", "a*c"));
    }

    #[test]
    fn test_literal_mask() {
        assert!(matches("exact", "exact"));
        assert!(!matches("exactly", "exact"));
        assert!(matches("a.c", "a.c"));
        assert!(!matches("abc", "a.c"));
        assert!(matches("(x)", "(x)"));
    }

    #[test]
    fn test_multiple_stars() {
        assert!(matches("user:42:name", "user:*:name"));
        assert!(matches("user::name", "user:*:name"));
        assert!(matches("abcabc", "*b*b*"));
        assert!(!matches("abc", "*b*b*"));
        assert!(matches("aXbYc", "a*b*c"));
        assert!(!matches("aba", "ab*ba"));
    }

    #[test]
    fn test_escaped_star() {
        assert!(matches("a*b", r"a\*b"));
        assert!(!matches("axb", r"a\*b"));
    }

    #[test]
    fn test_malformed_mask_matches_nothing() {
        let mask = Mask::new("abc\\");
        assert!(!mask.matches("abc"));
        assert!(!mask.matches("abc\\"));
        assert!(!mask.matches(""));
    }
}
