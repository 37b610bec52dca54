//! Key patterns for affix scans.
//!
//! Patterns are expressed in the store's glob dialect (`*`, `?`, `[...]`,
//! backslash escapes). Prefix and suffix lookups treat their argument as a
//! literal, so any glob metacharacter inside it is escaped before the
//! pattern reaches the store.

use std::fmt;

const GLOB_SPECIAL: &[char] = &['*', '?', '[', ']', '\\'];

/// A set of keys selected by prefix, suffix, or raw glob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPattern {
    Prefix(String),
    Suffix(String),
    Glob(String),
}

impl KeyPattern {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        KeyPattern::Prefix(prefix.into())
    }

    pub fn suffix(suffix: impl Into<String>) -> Self {
        KeyPattern::Suffix(suffix.into())
    }

    pub fn glob(pattern: impl Into<String>) -> Self {
        KeyPattern::Glob(pattern.into())
    }

    /// The glob sent to the store as `MATCH` argument.
    pub fn to_glob(&self) -> String {
        match self {
            KeyPattern::Prefix(p) => format!("{}*", escape_glob(p)),
            KeyPattern::Suffix(s) => format!("*{}", escape_glob(s)),
            KeyPattern::Glob(g) => g.clone(),
        }
    }

    /// The caller-supplied text, before escaping.
    pub fn raw(&self) -> &str {
        match self {
            KeyPattern::Prefix(s) | KeyPattern::Suffix(s) | KeyPattern::Glob(s) => s,
        }
    }

    /// Whether `key` belongs to this pattern, with the store's glob semantics.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyPattern::Prefix(p) => key.starts_with(p.as_str()),
            KeyPattern::Suffix(s) => key.ends_with(s.as_str()),
            KeyPattern::Glob(g) => glob_match(g.as_bytes(), key.as_bytes()),
        }
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_glob())
    }
}

/// Escapes glob metacharacters so `text` matches only itself.
pub fn escape_glob(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if GLOB_SPECIAL.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Byte-wise glob matching compatible with the store's `MATCH` dialect.
pub fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0usize, 0usize);
    // Position of the last `*` and the text index it is currently absorbing up to.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() {
            match pattern[p] {
                b'*' => {
                    backtrack = Some((p, t));
                    p += 1;
                    continue;
                }
                b'?' => {
                    p += 1;
                    t += 1;
                    continue;
                }
                b'[' => {
                    let (matched, next) = match_class(pattern, p, text[t]);
                    if matched {
                        p = next;
                        t += 1;
                        continue;
                    }
                }
                b'\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == text[t] {
                        p += 2;
                        t += 1;
                        continue;
                    }
                }
                c => {
                    if c == text[t] {
                        p += 1;
                        t += 1;
                        continue;
                    }
                }
            }
        }

        match backtrack {
            Some((star, absorbed)) => {
                p = star + 1;
                t = absorbed + 1;
                backtrack = Some((star, absorbed + 1));
            }
            None => return false,
        }
    }

    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}

/// Matches `c` against the class starting at `pattern[open] == b'['`.
/// Returns whether it matched and the index just past the closing `]`.
fn match_class(pattern: &[u8], open: usize, c: u8) -> (bool, usize) {
    let mut i = open + 1;
    let negate = i < pattern.len() && pattern[i] == b'^';
    if negate {
        i += 1;
    }

    let mut matched = false;
    while i < pattern.len() && pattern[i] != b']' {
        if pattern[i] == b'\\' && i + 1 < pattern.len() {
            i += 1;
            matched |= pattern[i] == c;
        } else if i + 2 < pattern.len() && pattern[i + 1] == b'-' && pattern[i + 2] != b']' {
            let (lo, hi) = if pattern[i] <= pattern[i + 2] {
                (pattern[i], pattern[i + 2])
            } else {
                (pattern[i + 2], pattern[i])
            };
            matched |= c >= lo && c <= hi;
            i += 2;
        } else {
            matched |= pattern[i] == c;
        }
        i += 1;
    }

    // Skip the closing bracket; an unterminated class runs to the end.
    let next = (i + 1).min(pattern.len());
    (matched != negate, next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn prefix_and_suffix_build_globs() {
        assert_eq!(KeyPattern::prefix("sess:").to_glob(), "sess:*");
        assert_eq!(KeyPattern::suffix(":42").to_glob(), "*:42");
        assert_eq!(KeyPattern::glob("user_*_conn").to_glob(), "user_*_conn");
    }

    #[test]
    fn affix_metacharacters_are_escaped() {
        assert_eq!(KeyPattern::prefix("a*b").to_glob(), "a\\*b*");
        assert_eq!(escape_glob("[x]?\\"), "\\[x\\]\\?\\\\");
    }

    #[test]
    fn glob_star_and_question_mark() {
        assert!(glob_match(b"h?llo", b"hello"));
        assert!(glob_match(b"h*llo", b"heeeello"));
        assert!(glob_match(b"*", b""));
        assert!(!glob_match(b"h?llo", b"hllo"));
        assert!(glob_match(b"*:42", b"sess:user:42"));
        assert!(!glob_match(b"*:42", b"sess:user:421"));
    }

    #[test]
    fn glob_character_classes() {
        assert!(glob_match(b"h[ae]llo", b"hallo"));
        assert!(!glob_match(b"h[ae]llo", b"hillo"));
        assert!(glob_match(b"h[^e]llo", b"hallo"));
        assert!(!glob_match(b"h[^e]llo", b"hello"));
        assert!(glob_match(b"h[a-c]llo", b"hbllo"));
        assert!(glob_match(b"h[c-a]llo", b"hbllo"));
    }

    #[test]
    fn glob_escapes_are_literal() {
        assert!(glob_match(b"a\\*b", b"a*b"));
        assert!(!glob_match(b"a\\*b", b"axb"));
    }

    #[test]
    fn key_pattern_matches_by_kind() {
        assert!(KeyPattern::prefix("user_").matches("user_1"));
        assert!(!KeyPattern::prefix("user_").matches("xuser_1"));
        assert!(KeyPattern::suffix("_conn").matches("u1_conn"));
        assert!(KeyPattern::glob("u?_*").matches("u1_conn"));
    }

    proptest! {
        #[test]
        fn escaped_prefix_glob_agrees_with_starts_with(prefix in ".{0,8}", rest in ".{0,8}") {
            let key = format!("{}{}", prefix, rest);
            let glob = KeyPattern::prefix(prefix.clone()).to_glob();
            prop_assert!(glob_match(glob.as_bytes(), key.as_bytes()));
        }

        #[test]
        fn escaped_text_matches_only_itself(text in "[a-z*?\\[\\]]{0,8}", other in "[a-z*?\\[\\]]{0,8}") {
            let glob = escape_glob(&text);
            prop_assert_eq!(glob_match(glob.as_bytes(), other.as_bytes()), text == other);
        }
    }
}
