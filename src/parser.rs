// 🏗️ Process Strategies - One processor per document type
// Polymorphic processing for agenda minutes and roster exports
//
// Each processor turns a source document into a clean table plus a generated
// name. Generated names follow the office convention ("Ficomm-Cont-<date>-GF",
// "OASIS-<year>-GF"); a source whose own name does not look like its type gets
// the generated name prefixed with "MISMATCH-" so someone checks it.

use crate::agenda::AgendaProcessor;
use crate::config::{ColumnConfig, PipelineConfig};
use crate::error::{ExtractionError, Result};
use crate::roster::abridge_roster;
use crate::table::Table;
use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

static YEAR_IN_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)FY\d{2}|fr\d{2}|\d{4}-\d{4}|\d{2}-\d{2}").expect("year regex")
});

pub const MISMATCH_PREFIX: &str = "MISMATCH-";
const CLEAN_TAG: &str = "GF";

// ============================================================================
// CORE TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessType {
    /// Finance committee minutes → contingency decisions
    Contingency,
    /// Registered-organization roster export
    Roster,
}

impl ProcessType {
    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            ProcessType::Contingency => "Contingency",
            ProcessType::Roster => "Roster",
        }
    }

    /// Prefix of generated file names
    pub fn clean_file_name(&self) -> &str {
        match self {
            ProcessType::Contingency => "Ficomm-Cont",
            ProcessType::Roster => "OASIS",
        }
    }
}

impl FromStr for ProcessType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "contingency" => Ok(ProcessType::Contingency),
            "roster" | "oasis" => Ok(ProcessType::Roster),
            other => Err(format!("invalid process type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DocumentContent {
    Text(String),
    Table(Table),
}

/// A document as fetched from its source, before any processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: String,
    pub name: String,
    pub content: DocumentContent,
}

impl SourceDocument {
    pub fn text(id: impl Into<String>, name: impl Into<String>, text: impl Into<String>) -> Self {
        SourceDocument {
            id: id.into(),
            name: name.into(),
            content: DocumentContent::Text(text.into()),
        }
    }

    pub fn table(id: impl Into<String>, name: impl Into<String>, table: Table) -> Self {
        SourceDocument {
            id: id.into(),
            name: name.into(),
            content: DocumentContent::Table(table),
        }
    }
}

// ============================================================================
// PROCESSOR TRAIT
// ============================================================================

pub trait DocumentProcessor {
    fn process_type(&self) -> ProcessType;

    /// Clean table and generated (unflagged) name
    fn process(&self, doc: &SourceDocument) -> Result<(Table, String)>;

    /// Whether a source name looks like this processor's document type
    fn follows_convention(&self, source_name: &str) -> bool;
}

// ============================================================================
// FACTORY FUNCTIONS
// ============================================================================

/// Guess the process type from a document name
pub fn detect_process(name: &str) -> Option<ProcessType> {
    let lower = name.to_lowercase();

    if lower.contains("ficomm") || lower.contains("finance committee") {
        return Some(ProcessType::Contingency);
    }
    if lower.contains("oasis") || lower.contains("roster") {
        return Some(ProcessType::Roster);
    }
    None
}

pub fn get_processor(
    process_type: ProcessType,
    config: &PipelineConfig,
) -> Result<Box<dyn DocumentProcessor>> {
    let processor: Box<dyn DocumentProcessor> = match process_type {
        ProcessType::Contingency => Box::new(ContingencyProcessor::new(config)?),
        ProcessType::Roster => Box::new(RosterProcessor::new(config)),
    };
    Ok(processor)
}

// ============================================================================
// CONTINGENCY PROCESSOR
// ============================================================================

pub struct ContingencyProcessor {
    agenda: AgendaProcessor,
}

impl ContingencyProcessor {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        Ok(ContingencyProcessor {
            agenda: AgendaProcessor::new(&config.agenda)?,
        })
    }
}

impl DocumentProcessor for ContingencyProcessor {
    fn process_type(&self) -> ProcessType {
        ProcessType::Contingency
    }

    fn process(&self, doc: &SourceDocument) -> Result<(Table, String)> {
        let DocumentContent::Text(text) = &doc.content else {
            return Err(ExtractionError::UnexpectedContent {
                name: doc.name.clone(),
                expected: "text",
            }
            .into());
        };

        let (table, date) = self.agenda.process(text)?;
        // Keep the raw token when it is not a calendar date we can parse
        let date_part = date.to_us_format().unwrap_or_else(|| date.as_str().to_string());
        let name = format!("{}-{}-{}", self.process_type().clean_file_name(), date_part, CLEAN_TAG);

        Ok((table, name))
    }

    fn follows_convention(&self, source_name: &str) -> bool {
        detect_process(source_name) == Some(ProcessType::Contingency)
    }
}

// ============================================================================
// ROSTER PROCESSOR
// ============================================================================

pub struct RosterProcessor {
    columns: ColumnConfig,
}

impl RosterProcessor {
    pub fn new(config: &PipelineConfig) -> Self {
        RosterProcessor {
            columns: config.columns.clone(),
        }
    }
}

impl DocumentProcessor for RosterProcessor {
    fn process_type(&self) -> ProcessType {
        ProcessType::Roster
    }

    fn process(&self, doc: &SourceDocument) -> Result<(Table, String)> {
        let DocumentContent::Table(table) = &doc.content else {
            return Err(ExtractionError::UnexpectedContent {
                name: doc.name.clone(),
                expected: "table",
            }
            .into());
        };

        let year = YEAR_IN_NAME
            .find(&doc.name)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| ExtractionError::YearNotFound {
                name: doc.name.clone(),
            })?;

        let abridged = abridge_roster(table, &self.columns, &year)?;
        let name = format!("{}-{}-{}", self.process_type().clean_file_name(), year, CLEAN_TAG);
        Ok((abridged, name))
    }

    fn follows_convention(&self, source_name: &str) -> bool {
        source_name.to_lowercase().contains("oasis")
    }
}

// ============================================================================
// BATCH PROCESSING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedDocument {
    pub id: String,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// (generated name, table), in input order
    pub outputs: Vec<(String, Table)>,
    pub skipped: Vec<SkippedDocument>,
}

impl BatchReport {
    pub fn mismatched(&self) -> impl Iterator<Item = &str> {
        self.outputs
            .iter()
            .map(|(name, _)| name.as_str())
            .filter(|name| name.starts_with(MISMATCH_PREFIX))
    }
}

/// Generated name, prefixed when the source name breaks convention
pub fn flagged_name(generated: &str, follows_convention: bool) -> String {
    if follows_convention {
        generated.to_string()
    } else {
        format!("{}{}", MISMATCH_PREFIX, generated)
    }
}

/// Run one processor over every document. Documents that fail on their own
/// (no date, no section, wrong content) are logged and skipped; anything else
/// stops the batch.
pub fn process_batch(
    processor: &dyn DocumentProcessor,
    docs: &[SourceDocument],
) -> Result<BatchReport> {
    let mut report = BatchReport::default();

    for doc in docs {
        match processor.process(doc) {
            Ok((table, generated)) => {
                let follows = processor.follows_convention(&doc.name);
                if !follows {
                    tracing::warn!(
                        document = %doc.name,
                        id = %doc.id,
                        "document name does not match naming convention"
                    );
                }
                report.outputs.push((flagged_name(&generated, follows), table));
            }
            Err(e) if e.is_document_scoped() => {
                tracing::warn!(document = %doc.name, id = %doc.id, error = %e, "skipping document");
                report.skipped.push(SkippedDocument {
                    id: doc.id.clone(),
                    name: doc.name.clone(),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        process = processor.process_type().name(),
        processed = report.outputs.len(),
        skipped = report.skipped.len(),
        "batch finished"
    );
    Ok(report)
}

// ============================================================================
// FILESYSTEM SOURCE
// ============================================================================

/// Load `.txt` files as text and `.csv` files as tables, sorted by file name.
/// Document name is the file stem; id is the full path.
pub fn load_documents(dir: &Path) -> anyhow::Result<Vec<SourceDocument>> {
    let mut paths: Vec<_> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {:?}", dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let mut docs = Vec::new();
    for path in paths {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let id = path.display().to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match extension.as_deref() {
            Some("txt") => {
                let text = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read file: {:?}", path))?;
                docs.push(SourceDocument::text(id, name, text));
            }
            Some("csv") => {
                let table = Table::from_csv_path(&path)
                    .with_context(|| format!("Failed to parse CSV: {:?}", path))?;
                docs.push(SourceDocument::table(id, name, table));
            }
            _ => tracing::debug!(path = %path.display(), "ignoring unsupported file"),
        }
    }

    Ok(docs)
}

// ============================================================================
// TESTS
// ============================================================================
