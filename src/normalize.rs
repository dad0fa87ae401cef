// 🔤 Name Normalizer - Canonical form for club names before matching
//
// "  Pakistani   Student Association " → "pakistani student association"
// With the noise filter on, the generic phrase goes too → "pakistani"

use serde::{Deserialize, Serialize};

/// Trim, lowercase and collapse whitespace runs to one space
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// NOISE FILTER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredName {
    /// Name as it appeared in the source document
    pub original: String,
    /// Normalized name with the noise phrase removed
    pub filtered: String,
    /// Whether the phrase was found and removed
    pub applied: bool,
}

impl FilteredName {
    /// Audit note carried on rejections
    pub fn note(&self, phrase: &str) -> Option<String> {
        self.applied
            .then(|| format!("'{}' removed before matching", phrase))
    }
}

/// Strips a generic phrase that otherwise dominates similarity scores
#[derive(Debug, Clone, PartialEq)]
pub struct NameFilter {
    phrase: String,
}

impl NameFilter {
    pub fn new(phrase: &str) -> Self {
        NameFilter {
            phrase: normalize_name(phrase),
        }
    }

    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    /// Remove the first occurrence of the phrase, joining what was before and after it
    pub fn apply(&self, name: &str) -> FilteredName {
        let normalized = normalize_name(name);

        let filtered = match normalized.split_once(self.phrase.as_str()) {
            Some((before, after)) if !self.phrase.is_empty() => {
                Some(normalize_name(&format!("{} {}", before.trim(), after.trim())))
            }
            _ => None,
        };

        FilteredName {
            original: name.to_string(),
            applied: filtered.is_some(),
            filtered: filtered.unwrap_or(normalized),
        }
    }
}

impl Default for NameFilter {
    fn default() -> Self {
        NameFilter::new("student association")
    }
}
