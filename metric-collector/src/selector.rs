use regex::Regex;

use crate::errors::ConfigError;

pub const MATCH_ALL: &str = ".*";

/// Regex-based tag filter. An entity is selected when any of its tags fully
/// matches any pattern. Untagged entities are tested against `""`.
#[derive(Debug, Clone)]
pub struct TagSelector {
    patterns: Vec<Regex>,
}

impl TagSelector {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        if patterns.is_empty() {
            return Self::new(&[MATCH_ALL]);
        }
        let patterns = patterns
            .iter()
            .map(|p| {
                let p = p.as_ref();
                Regex::new(&format!("^(?:{p})$")).map_err(|source| ConfigError::InvalidPattern {
                    pattern: p.to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn matches<'a, I>(&self, tags: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut tags = tags.into_iter().peekable();
        if tags.peek().is_none() {
            return self.patterns.iter().any(|re| re.is_match(""));
        }
        tags.any(|tag| self.patterns.iter().any(|re| re.is_match(tag)))
    }
}
