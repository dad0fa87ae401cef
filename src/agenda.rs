// 🧾 Agenda Processor - Minutes text → decisions table
// Section extraction, motion segmentation and decision classification in one pass.

use crate::config::AgendaConfig;
use crate::dates::DateToken;
use crate::error::Result;
use crate::motions::MotionSegmenter;
use crate::rules::{Allocation, DecisionClassifier, DecisionLabel};
use crate::section::SectionExtractor;
use crate::table::Table;
use serde::{Deserialize, Serialize};

pub const COL_ORGANIZATION: &str = "Organization Name";
pub const COL_DECISION: &str = "Ficomm Decision";
pub const COL_ALLOCATED: &str = "Amount Allocated";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub entity_name: String,
    pub label: DecisionLabel,
    pub allocation: Allocation,
}

pub struct AgendaProcessor {
    extractor: SectionExtractor,
    segmenter: MotionSegmenter,
    classifier: DecisionClassifier,
}

impl AgendaProcessor {
    pub fn new(config: &AgendaConfig) -> Result<Self> {
        Ok(AgendaProcessor {
            extractor: SectionExtractor::from_config(config)?,
            segmenter: MotionSegmenter::from_config(config),
            classifier: DecisionClassifier::with_defaults(),
        })
    }

    /// Swap in a custom rule set
    pub fn with_classifier(mut self, classifier: DecisionClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// One record per club group, in agenda order
    pub fn decisions(&self, raw_text: &str) -> Result<(Vec<DecisionRecord>, DateToken)> {
        let (section, date) = self.extractor.extract(raw_text)?;
        let groups = self.segmenter.segment(&section);

        let records: Vec<DecisionRecord> = groups
            .groups()
            .iter()
            .map(|group| {
                let result = self.classifier.classify(&group.lines);
                if result.label.needs_review() {
                    tracing::warn!(
                        club = %group.name,
                        decision = %result.label,
                        "motion needs manual review"
                    );
                }
                DecisionRecord {
                    entity_name: group.name.clone(),
                    label: result.label,
                    allocation: result.allocation,
                }
            })
            .collect();

        tracing::info!(date = %date, clubs = records.len(), "processed agenda");
        Ok((records, date))
    }

    pub fn process(&self, raw_text: &str) -> Result<(Table, DateToken)> {
        let (records, date) = self.decisions(raw_text)?;
        Ok((records_to_table(&records), date))
    }
}

pub fn records_to_table(records: &[DecisionRecord]) -> Table {
    let mut table = Table::new([COL_ORGANIZATION, COL_DECISION, COL_ALLOCATED]);
    for record in records {
        table.push_row(vec![
            Some(record.entity_name.clone()),
            Some(record.label.as_str().to_string()),
            record.allocation.to_cell(),
        ]);
    }
    table
}

/// Minutes text → (decisions table, meeting date)
pub fn process_agenda(raw_text: &str, config: &AgendaConfig) -> Result<(Table, DateToken)> {
    AgendaProcessor::new(config)?.process(raw_text)
}

// ============================================================================
// TESTS
// ============================================================================
