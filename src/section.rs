// ✂️ Section Extractor - Bounded span between start and end keyword groups
//
// Agendas are numbered lists ("1. Contingency Funding ... 2. Sponsorship"), so
// every end keyword may carry a numbering prefix that must not leak into the
// captured section.

use crate::config::AgendaConfig;
use crate::dates::DateToken;
use crate::error::ExtractionError;
use regex::Regex;

pub struct SectionExtractor {
    start_keywords: Vec<String>,
    end_keywords: Vec<String>,
    date_pattern: String,
    date_regex: Regex,
    start_regex: Regex,
    section_regex: Regex,
}

impl SectionExtractor {
    pub fn new(
        start_keywords: &[String],
        end_keywords: &[String],
        date_pattern: &str,
    ) -> Result<Self, ExtractionError> {
        let date_regex = Regex::new(date_pattern)?;
        let start_regex = Regex::new(&alternation(start_keywords))?;
        let section_regex = Regex::new(&build_section_pattern(start_keywords, end_keywords))?;

        Ok(SectionExtractor {
            start_keywords: start_keywords.to_vec(),
            end_keywords: end_keywords.to_vec(),
            date_pattern: date_pattern.to_string(),
            date_regex,
            start_regex,
            section_regex,
        })
    }

    pub fn from_config(config: &AgendaConfig) -> Result<Self, ExtractionError> {
        Self::new(&config.start_keywords, &config.end_keywords, &config.date_pattern)
    }

    /// Return the first bounded section and the document's date token.
    ///
    /// Only the first section is used; a second funding section in the same
    /// document is ignored.
    pub fn extract(&self, text: &str) -> Result<(String, DateToken), ExtractionError> {
        let date = self
            .date_regex
            .captures(text)
            .and_then(|caps| caps.get(1).or_else(|| caps.get(0)))
            .map(|m| DateToken::new(m.as_str()))
            .ok_or_else(|| ExtractionError::DateNotFound {
                pattern: self.date_pattern.clone(),
            })?;

        if let Some(caps) = self.section_regex.captures(text) {
            let section = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            return Ok((section.to_string(), date));
        }

        if self.start_regex.is_match(text) {
            Err(ExtractionError::SectionUnterminated {
                end: self.end_keywords.clone(),
            })
        } else {
            Err(ExtractionError::SectionNotFound {
                start: self.start_keywords.clone(),
            })
        }
    }
}

fn alternation(keywords: &[String]) -> String {
    let escaped: Vec<String> = keywords.iter().map(|k| regex::escape(k)).collect();
    format!("(?:{})", escaped.join("|"))
}

/// start, lazy whitespace, lazy capture, then the first (optionally numbered) end keyword
fn build_section_pattern(starts: &[String], ends: &[String]) -> String {
    format!(
        r"{}\s*?([\s\S]*?)(?:\d+\.\s*)?{}",
        alternation(starts),
        alternation(ends)
    )
}

// ============================================================================
// TESTS
// ============================================================================
