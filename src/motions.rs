// 🗂️ Motion Segmenter - Group numbered agenda lines under the club they follow
//
// Section shape:
//   1. Chess Club
//   2. Motion to approve $200 by Senator X
//   3. Seconded by Senator Y
//
// A club may show up more than once in one session (multiple submissions), so
// repeats open their own group instead of merging.

use crate::config::AgendaConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static NUMBERED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\.\s+(\S.*?)\s*$").expect("numbered line regex"));

/// Characters a club name may contain besides letters, digits and whitespace
const NAME_PUNCTUATION: &str = "-_*&%$+#@!(),'\"";

// ============================================================================
// GROUPS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionGroup {
    /// Display name, with " (n)" appended for the n-th repeat
    pub name: String,
    pub lines: Vec<String>,
}

/// Ordered club → motion lines mapping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMotionGroup {
    groups: Vec<MotionGroup>,
}

impl EntityMotionGroup {
    pub fn groups(&self) -> &[MotionGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&MotionGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name.as_str()).collect()
    }
}

// ============================================================================
// SEGMENTER
// ============================================================================

pub struct MotionSegmenter {
    reserved_words: Vec<String>,
}

impl MotionSegmenter {
    pub fn new(reserved_words: Vec<String>) -> Self {
        MotionSegmenter { reserved_words }
    }

    pub fn from_config(config: &AgendaConfig) -> Self {
        Self::new(config.reserved_words.clone())
    }

    /// Split a section into club groups, keeping line order.
    ///
    /// Lines seen before the first club name are logged and dropped.
    pub fn segment(&self, section: &str) -> EntityMotionGroup {
        let raw_lines: Vec<&str> = section.lines().collect();
        let numbered: Vec<(usize, &str)> = raw_lines
            .iter()
            .copied()
            .enumerate()
            .filter_map(|(i, line)| numbered_text(line).map(|text| (i, text)))
            .collect();

        let names = self.entity_names(&raw_lines, &numbered);

        let mut result = EntityMotionGroup::default();
        let mut occurrences: HashMap<&str, usize> = HashMap::new();

        for &(_, text) in &numbered {
            if names.contains(text) {
                let seen = occurrences.entry(text).or_insert(0);
                *seen += 1;
                let name = if *seen == 1 {
                    text.to_string()
                } else {
                    format!("{} ({})", text, seen)
                };
                result.groups.push(MotionGroup {
                    name,
                    lines: Vec::new(),
                });
            } else if let Some(open) = result.groups.last_mut() {
                open.lines.push(text.to_string());
            } else {
                tracing::warn!(line = text, "motion line before any club name, skipping");
            }
        }

        result
    }

    /// Numbered lines that look like club names: not a reserved word, only
    /// name characters, and followed by a blank line, another numbered line,
    /// or the end of the section
    fn entity_names<'a>(
        &self,
        raw_lines: &[&str],
        numbered: &[(usize, &'a str)],
    ) -> HashSet<&'a str> {
        numbered
            .iter()
            .filter(|(_, text)| !self.starts_with_reserved(text))
            .filter(|(_, text)| is_name_text(text))
            .filter(|(i, _)| match raw_lines.get(*i + 1) {
                None => true,
                Some(next) => next.trim().is_empty() || numbered_text(next).is_some(),
            })
            .map(|(_, text)| *text)
            .collect()
    }

    fn starts_with_reserved(&self, text: &str) -> bool {
        self.reserved_words.iter().any(|w| text.starts_with(w.as_str()))
    }
}

impl Default for MotionSegmenter {
    fn default() -> Self {
        Self::from_config(&AgendaConfig::default())
    }
}

fn numbered_text(line: &str) -> Option<&str> {
    NUMBERED_LINE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn is_name_text(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_alphanumeric() || c.is_whitespace() || NAME_PUNCTUATION.contains(c))
}

// ============================================================================
// TESTS
// ============================================================================
