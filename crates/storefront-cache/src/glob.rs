//! Redis-style key globs (`KEYS` semantics) for stores without native support.
//!
//! Supported syntax: `*` (any run), `?` (one char), `[abc]`, `[a-z]`, `[^a]`
//! and `\x` to match `x` literally.

use regex::Regex;

use crate::error::{CacheError, Result};

/// Compiled key glob.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    regex: Regex,
}

impl KeyPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let mut out = String::with_capacity(pattern.len() * 2 + 8);
        out.push_str("(?s)^");

        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            match c {
                '*' => out.push_str(".*"),
                '?' => out.push('.'),
                '\\' => match chars.next() {
                    Some(escaped) => push_literal(&mut out, escaped),
                    None => push_literal(&mut out, '\\'),
                },
                '[' => {
                    out.push('[');
                    let mut closed = false;
                    let mut first = true;
                    while let Some(c) = chars.next() {
                        match c {
                            ']' if !first => {
                                closed = true;
                                break;
                            }
                            '^' if first => out.push('^'),
                            '-' => out.push('-'),
                            '\\' => match chars.next() {
                                Some(escaped) => push_literal(&mut out, escaped),
                                None => break,
                            },
                            other => push_literal(&mut out, other),
                        }
                        first = false;
                    }
                    if !closed {
                        return Err(CacheError::invalid_pattern(
                            pattern,
                            "unterminated character class",
                        ));
                    }
                    out.push(']');
                }
                other => push_literal(&mut out, other),
            }
        }
        out.push('$');

        let regex =
            Regex::new(&out).map_err(|e| CacheError::invalid_pattern(pattern, e.to_string()))?;
        Ok(Self { regex })
    }

    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }
}

fn push_literal(out: &mut String, c: char) {
    let mut buf = [0u8; 4];
    out.push_str(&regex::escape(c.encode_utf8(&mut buf)));
}
