//! Include/exclude filtering of object keys
//!
//! Patterns are glob-like and matched against the whole key: `*` matches any
//! run of characters including `/`, `?` matches exactly one character. Every
//! other character, brackets included, is literal.

use glob::{MatchOptions, Pattern};

use crate::traits::ObjectRecord;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Compiled include/exclude pattern set
#[derive(Debug, Clone, Default)]
pub struct KeyFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl KeyFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Self {
        Self {
            include: include.iter().map(|p| compile(p)).collect(),
            exclude: exclude.iter().map(|p| compile(p)).collect(),
        }
    }

    /// A key is kept iff it matches no exclude pattern and, when include
    /// patterns exist, at least one of them
    pub fn accepts(&self, key: &str) -> bool {
        if self.exclude.iter().any(|p| p.matches_with(key, MATCH_OPTIONS)) {
            return false;
        }

        self.include.is_empty() || self.include.iter().any(|p| p.matches_with(key, MATCH_OPTIONS))
    }
}

/// Translate a key pattern into a glob with only `*` and `?` active
///
/// Literal runs go through `Pattern::escape` so brackets stay literal, and
/// consecutive stars collapse to one so `**` never gets glob's directory
/// semantics.
fn to_glob(pattern: &str) -> String {
    let mut glob = String::with_capacity(pattern.len());
    let mut literal = String::new();
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' | '?' => {
                glob.push_str(&Pattern::escape(&literal));
                literal.clear();
                glob.push(c);
                if c == '*' {
                    while chars.next_if_eq(&'*').is_some() {}
                }
            }
            _ => literal.push(c),
        }
    }
    glob.push_str(&Pattern::escape(&literal));
    glob
}

fn compile(pattern: &str) -> Pattern {
    Pattern::new(&to_glob(pattern)).expect("escaped glob with single stars is valid")
}

/// Test a single key against a single pattern
pub fn matches(key: &str, pattern: &str) -> bool {
    compile(pattern).matches_with(key, MATCH_OPTIONS)
}

/// Keep the objects accepted by the include/exclude patterns, preserving order
pub fn filter(objects: &[ObjectRecord], include: &[String], exclude: &[String]) -> Vec<ObjectRecord> {
    let filter = KeyFilter::new(include, exclude);
    objects
        .iter()
        .filter(|o| filter.accepts(&o.key))
        .cloned()
        .collect()
}
