use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

/// A regex wrapper that serializes as a string but compiles lazily at runtime
pub struct Regex {
    pattern: String,
    compiled: OnceLock<Option<Arc<onig::Regex>>>,
}

impl Clone for Regex {
    fn clone(&self) -> Self {
        // Create a new regex with the same pattern but fresh lazy compilation
        Regex::new(self.pattern.clone())
    }
}

impl fmt::Debug for Regex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.pattern)
    }
}

impl Regex {
    pub fn new(pattern: String) -> Self {
        Self {
            pattern,
            compiled: OnceLock::new(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn compiled(&self) -> Option<&Arc<onig::Regex>> {
        self.compiled
            .get_or_init(|| onig::Regex::new(&self.pattern).ok().map(Arc::new))
            .as_ref()
    }

    /// Validate that this regex pattern compiles successfully
    pub fn validate(&self) -> Result<(), onig::Error> {
        onig::Regex::new(&self.pattern).map(|_| ())
    }

    pub fn has_backreferences(&self) -> bool {
        for i in 1..=9 {
            let backref = format!("\\{}", i);
            if self.pattern.contains(&backref) {
                return true;
            }
        }
        false
    }

    /// Try to find a match starting at the given position
    pub fn find_at(&self, text: &str, start: usize) -> Option<(usize, usize)> {
        let regex = self.compiled()?;
        let search_text = text.get(start..)?;
        if let Some(pos) = regex.find(search_text) {
            // Adjust match positions to be relative to original text
            Some((pos.0 + start, pos.1 + start))
        } else {
            None
        }
    }

    /// Try to get captures starting at the given position
    pub fn captures_at(&self, text: &str, start: usize) -> Option<Vec<String>> {
        let regex = self.compiled()?;
        let search_text = text.get(start..)?;

        if let Some(captures) = regex.captures(search_text) {
            let mut result = Vec::new();
            for i in 0..captures.len() {
                if let Some(capture) = captures.at(i) {
                    result.push(capture.to_string());
                } else {
                    result.push(String::new());
                }
            }
            Some(result)
        } else {
            None
        }
    }
}

impl Serialize for Regex {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.pattern)
    }
}

impl<'de> Deserialize<'de> for Regex {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let pattern = String::deserialize(deserializer)?;
        Ok(Regex::new(pattern))
    }
}

/// Substitutes `\N` backreferences in an end/while pattern with the bytes captured by the
/// begin match, each byte octal-escaped so it can't be reinterpreted as regex syntax.
///
/// Mirrors vscode-textmate's `RegexSource.hasCaptures`/`replaceCaptures`.
pub fn resolve_backreferences(
    pattern: &str,
    line: &str,
    capture_pos: &[Option<(usize, usize)>],
) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut result = String::with_capacity(pattern.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '\\' && i + 1 < chars.len() && chars[i + 1].is_ascii_digit() {
            let group = chars[i + 1].to_digit(10).unwrap() as usize;
            if group > 0
                && let Some(Some((start, end))) = capture_pos.get(group)
            {
                for byte in line[*start..*end].bytes() {
                    result.push_str(&format!("\\{byte:03o}"));
                }
            }
            i += 2;
        } else {
            result.push(chars[i]);
            i += 1;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_simple_backreference() {
        let resolved = resolve_backreferences(r"\1", "<<<EOF\n", &[Some((0, 6)), Some((3, 6))]);
        assert_eq!(resolved, r"\105\117\106");
    }

    #[test]
    fn leaves_unmatched_group_empty() {
        let resolved = resolve_backreferences(r"end\2", "foo\n", &[Some((0, 3)), None]);
        assert_eq!(resolved, "end");
    }

    #[test]
    fn ignores_non_backreference_digits() {
        let resolved = resolve_backreferences(r"a0b", "x\n", &[Some((0, 1))]);
        assert_eq!(resolved, "a0b");
    }
}
