// ⚙️ Pipeline Configuration - Keywords, thresholds and column names as data
// Every field has a default, so a config file only lists what it overrides.

use crate::error::{Error, Result};
use anyhow::Context as AnyhowContext;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// AGENDA EXTRACTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgendaConfig {
    /// Keywords that open the funding section
    pub start_keywords: Vec<String>,

    /// Keywords that close it (an optional "2. " numbering prefix is allowed)
    pub end_keywords: Vec<String>,

    /// Regex locating the meeting date; first capture group is the token
    pub date_pattern: String,

    /// Numbered lines starting with these words are never club names
    pub reserved_words: Vec<String>,
}

impl Default for AgendaConfig {
    fn default() -> Self {
        AgendaConfig {
            start_keywords: vec!["Contingency Funding".to_string(), "Contingency".to_string()],
            end_keywords: [
                "Finance Rule",
                "Rule Waiver",
                "Space Reservation",
                "Sponsorship",
                "Adjournment",
                "ABSA",
                "ABSA Appeals",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            date_pattern: r"(\w+\s\d{1,2}\w*,\s\d{4})".to_string(),
            reserved_words: ["Motion", "Seconded", "Moved", "Tabled", "Approved", "Denied"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

// ============================================================================
// MATCH THRESHOLDS
// ============================================================================

/// All thresholds are on a 0-100 scale and are EXCLUSIVE lower bounds:
/// a score equal to a threshold is a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Fuzzy score needed to accept without embeddings
    pub fuzzy_threshold: f64,

    /// Whether the semantic tier runs at all
    pub semantic_enabled: bool,

    /// Fuzzy score needed before embeddings are even computed
    pub semantic_gate_threshold: f64,

    /// Cosine similarity × 100 needed to accept in the semantic tier
    pub semantic_accept_threshold: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            fuzzy_threshold: 85.0,
            semantic_enabled: true,
            semantic_gate_threshold: 50.0,
            semantic_accept_threshold: 90.0,
        }
    }
}

impl Thresholds {
    pub fn fuzzy_only(fuzzy_threshold: f64) -> Self {
        Thresholds {
            fuzzy_threshold,
            semantic_enabled: false,
            ..Thresholds::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("fuzzy_threshold", self.fuzzy_threshold),
            ("semantic_gate_threshold", self.semantic_gate_threshold),
            ("semantic_accept_threshold", self.semantic_accept_threshold),
        ];
        for (name, value) in checks {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(Error::Config(format!(
                    "{name} must be within 0..=100, got {value}"
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// COLUMN NAMES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    /// Name column of the roster (candidate pool)
    pub roster_name: String,

    /// Roster columns kept for matching and used as join identity
    pub roster_required: Vec<String>,

    /// Name column of funding-request sheets
    pub funding_name: String,

    /// Requested amount column of funding-request sheets
    pub funding_amount: String,

    /// Request type column of funding-request sheets
    pub funding_type: String,

    /// Only requests of this type are merged (None keeps every row)
    pub funding_type_filter: Option<String>,

    /// Name column of agenda-derived decision tables
    pub decision_name: String,
}

impl ColumnConfig {
    /// Columns every funding-request sheet must carry
    pub fn funding_required(&self) -> Vec<&str> {
        let mut required = vec![self.funding_name.as_str(), self.funding_amount.as_str()];
        if self.funding_type_filter.is_some() {
            required.push(self.funding_type.as_str());
        }
        required
    }
}

impl Default for ColumnConfig {
    fn default() -> Self {
        ColumnConfig {
            roster_name: "club_name".to_string(),
            roster_required: ["Org Type", "BlueHeart", "Org ID Status", "club_name"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            funding_name: "club_name".to_string(),
            funding_amount: "Amount Requested".to_string(),
            funding_type: "Type".to_string(),
            funding_type_filter: Some("contingency".to_string()),
            decision_name: "Organization Name".to_string(),
        }
    }
}

// ============================================================================
// PIPELINE CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub agenda: AgendaConfig,
    pub thresholds: Thresholds,
    pub columns: ColumnConfig,

    /// Phrase stripped from names before matching (None disables the filter)
    pub noise_phrase: Option<String>,

    /// Fiscal year label used in generated names, e.g. "FY25"
    pub year_label: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            agenda: AgendaConfig::default(),
            thresholds: Thresholds::default(),
            columns: ColumnConfig::default(),
            noise_phrase: Some("student association".to_string()),
            year_label: "FY25".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load config from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: PipelineConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        config.validate()?;
        Ok(config)
    }

    /// Check thresholds, keyword lists and patterns before anything runs
    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate()?;

        if self.agenda.start_keywords.is_empty() {
            return Err(Error::Config("agenda.start_keywords is empty".to_string()));
        }
        if self.agenda.end_keywords.is_empty() {
            return Err(Error::Config("agenda.end_keywords is empty".to_string()));
        }
        Regex::new(&self.agenda.date_pattern)
            .map_err(|e| Error::Config(format!("agenda.date_pattern: {e}")))?;

        validate_year_label(&self.year_label)
    }
}

/// Fiscal year labels look like "FY25"
pub fn validate_year_label(label: &str) -> Result<()> {
    let valid = label
        .strip_prefix("FY")
        .map(|digits| (1..=2).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false);

    if valid {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "year label should be formatted 'FYdd' but is {label:?}"
        )))
    }
}

// ============================================================================
// TESTS
// ============================================================================
