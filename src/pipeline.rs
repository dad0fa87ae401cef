// 📆 Weekly Join Pipeline - Pair same-week funding requests with decisions
//
// Flow per period:
//   funding sheet  ─┐ filter type, resolve vs roster ─┐
//                   │                                 ├─ outer join on matched identity
//   decisions      ─┘ resolve vs roster ──────────────┘
//
// Periods are keyed by the MM_DD found in each document's name. A week with
// only one of the two document types is dropped from the merge and reported.

use crate::config::{validate_year_label, ColumnConfig, PipelineConfig, Thresholds};
use crate::dates::PeriodKey;
use crate::embedding::EmbeddingModel;
use crate::error::{Error, Result};
use crate::matching::{
    audit_table, matched_column, resolve_entities, CandidatePool, MatchOptions,
};
use crate::normalize::NameFilter;
use crate::roster::{filter_funding_requests, project_roster, tag_designations};
use crate::schema::{SchemaValidator, TableKind};
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SUFFIX_FUNDING: &str = "_FR";
pub const SUFFIX_DECISIONS: &str = "_Contingency";

// ============================================================================
// INPUTS & OUTPUTS
// ============================================================================

/// A table together with the document name it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedTable {
    pub name: String,
    pub table: Table,
}

impl NamedTable {
    pub fn new(name: impl Into<String>, table: Table) -> Self {
        NamedTable {
            name: name.into(),
            table,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    FundingRequest,
    Decisions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropReason {
    /// No MM_DD in the document name
    NoPeriodKey,
    /// A later document of the same kind has the same key
    Superseded,
    /// No document of the other kind shares the key
    Unpaired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedDocument {
    pub name: String,
    pub kind: DocumentKind,
    pub reason: DropReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodOutput {
    pub key: PeriodKey,
    pub name: String,
    pub merged: Table,
    pub unmatched_funding: Table,
    pub unmatched_decisions: Table,
}

impl PeriodOutput {
    /// Output tables with their generated names
    pub fn named_tables(&self) -> Vec<(String, Table)> {
        vec![
            (self.name.clone(), self.merged.clone()),
            (format!("{}-Unmatched-FR", self.name), self.unmatched_funding.clone()),
            (
                format!("{}-Unmatched-Contingency", self.name),
                self.unmatched_decisions.clone(),
            ),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeOutput {
    /// One entry per paired period, in key order
    pub periods: Vec<PeriodOutput>,
    pub dropped: Vec<DroppedDocument>,
}

impl MergeOutput {
    pub fn named_tables(&self) -> Vec<(String, Table)> {
        self.periods.iter().flat_map(|p| p.named_tables()).collect()
    }

    pub fn generated_names(&self) -> Vec<&str> {
        self.periods.iter().map(|p| p.name.as_str()).collect()
    }
}

/// Combined output name for one period
pub fn combined_name(key: &PeriodKey, year_label: &str) -> String {
    format!("Ficomm-Combined-{}-{}-GF", key, year_label)
}

// ============================================================================
// WEEKLY PIPELINE
// ============================================================================

pub struct WeeklyPipeline<'a> {
    columns: ColumnConfig,
    thresholds: Thresholds,
    filter: Option<NameFilter>,
    year_label: String,
    embedder: Option<&'a dyn EmbeddingModel>,
}

impl<'a> WeeklyPipeline<'a> {
    pub fn new(config: &PipelineConfig) -> Self {
        WeeklyPipeline {
            columns: config.columns.clone(),
            thresholds: config.thresholds,
            filter: config.noise_phrase.as_deref().map(NameFilter::new),
            year_label: config.year_label.clone(),
            embedder: None,
        }
    }

    pub fn with_embedder(mut self, embedder: &'a dyn EmbeddingModel) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn merge(
        &self,
        roster: &Table,
        funding_docs: &[NamedTable],
        decision_docs: &[NamedTable],
    ) -> Result<MergeOutput> {
        // Fail fast on anything that would break every period
        validate_year_label(&self.year_label)?;
        self.thresholds.validate()?;
        if self.thresholds.semantic_enabled && self.embedder.is_none() {
            return Err(Error::Config(
                "semantic tier enabled but no embedding model was provided".to_string(),
            ));
        }
        let roster = project_roster(roster, &self.columns)?;
        let pool = CandidatePool::new(roster, &self.columns.roster_name)?;

        // Every document, paired or not, before any period is resolved
        let funding_required = self.columns.funding_required();
        for doc in funding_docs {
            validate_document(doc, TableKind::FundingRequest, &funding_required)?;
        }
        for doc in decision_docs {
            validate_document(doc, TableKind::Decisions, &[self.columns.decision_name.as_str()])?;
        }

        let mut output = MergeOutput::default();
        let funding =
            bucket_by_period(funding_docs, DocumentKind::FundingRequest, &mut output.dropped);
        let decisions =
            bucket_by_period(decision_docs, DocumentKind::Decisions, &mut output.dropped);

        for (key, doc) in &funding {
            if !decisions.contains_key(key) {
                tracing::warn!(
                    document = %doc.name,
                    period = %key,
                    "no decisions for this period, dropping"
                );
                output.dropped.push(DroppedDocument {
                    name: doc.name.clone(),
                    kind: DocumentKind::FundingRequest,
                    reason: DropReason::Unpaired,
                });
            }
        }
        for (key, doc) in &decisions {
            if !funding.contains_key(key) {
                tracing::warn!(
                    document = %doc.name,
                    period = %key,
                    "no funding requests for this period, dropping"
                );
                output.dropped.push(DroppedDocument {
                    name: doc.name.clone(),
                    kind: DocumentKind::Decisions,
                    reason: DropReason::Unpaired,
                });
            }
        }

        for (key, funding_doc) in &funding {
            if let Some(decision_doc) = decisions.get(key) {
                output
                    .periods
                    .push(self.merge_one(key, &pool, &funding_doc.table, &decision_doc.table)?);
            }
        }

        tracing::info!(
            periods = output.periods.len(),
            dropped = output.dropped.len(),
            "weekly merge finished"
        );
        Ok(output)
    }

    fn merge_one(
        &self,
        key: &PeriodKey,
        pool: &CandidatePool,
        funding: &Table,
        decisions: &Table,
    ) -> Result<PeriodOutput> {
        let columns = &self.columns;
        let mut options = MatchOptions::new(self.thresholds);
        if let Some(filter) = &self.filter {
            options = options.with_filter(filter);
        }
        if let Some(embedder) = self.embedder {
            options = options.with_embedder(embedder);
        }

        let funding = filter_funding_requests(funding, columns)?;
        let (funding_resolved, funding_unmatched) =
            resolve_entities(&funding, &columns.funding_name, pool, options)?;
        let (decisions_resolved, decisions_unmatched) =
            resolve_entities(decisions, &columns.decision_name, pool, options)?;

        let keys: Vec<String> =
            columns.roster_required.iter().map(|c| matched_column(c)).collect();
        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let merged = funding_resolved.outer_join(
            &decisions_resolved,
            &key_refs,
            (SUFFIX_FUNDING, SUFFIX_DECISIONS),
        )?;
        let name_columns = [columns.decision_name.as_str(), columns.funding_name.as_str()];
        let merged = tag_designations(&merged, &name_columns);

        let name = combined_name(key, &self.year_label);
        tracing::info!(
            output = %name,
            rows = merged.len(),
            unmatched_funding = funding_unmatched.len(),
            unmatched_decisions = decisions_unmatched.len(),
            "merged period"
        );

        Ok(PeriodOutput {
            key: key.clone(),
            name,
            merged,
            unmatched_funding: audit_table(&funding, &funding_unmatched),
            unmatched_decisions: audit_table(decisions, &decisions_unmatched),
        })
    }
}

fn validate_document(doc: &NamedTable, kind: TableKind, required: &[&str]) -> Result<()> {
    let context = format!("{} {:?}", kind.name(), doc.name);
    SchemaValidator::require_columns(&doc.table, required, &context)
}

/// Key → latest document of one kind
fn bucket_by_period<'d>(
    docs: &'d [NamedTable],
    kind: DocumentKind,
    dropped: &mut Vec<DroppedDocument>,
) -> BTreeMap<PeriodKey, &'d NamedTable> {
    let mut buckets: BTreeMap<PeriodKey, &NamedTable> = BTreeMap::new();

    for doc in docs {
        let Some(key) = PeriodKey::from_file_name(&doc.name) else {
            tracing::warn!(document = %doc.name, "no MM_DD date in document name, skipping");
            dropped.push(DroppedDocument {
                name: doc.name.clone(),
                kind,
                reason: DropReason::NoPeriodKey,
            });
            continue;
        };

        if let Some(previous) = buckets.insert(key.clone(), doc) {
            tracing::warn!(
                kept = %doc.name,
                replaced = %previous.name,
                period = %key,
                "duplicate period, later document wins"
            );
            dropped.push(DroppedDocument {
                name: previous.name.clone(),
                kind,
                reason: DropReason::Superseded,
            });
        }
    }

    buckets
}

/// Merge with default column names and noise filter
pub fn merge_period(
    roster: &Table,
    funding_docs: &[NamedTable],
    decision_docs: &[NamedTable],
    thresholds: Thresholds,
    year_label: &str,
    embedder: Option<&dyn EmbeddingModel>,
) -> Result<MergeOutput> {
    let config = PipelineConfig {
        thresholds,
        year_label: year_label.to_string(),
        ..PipelineConfig::default()
    };

    let mut pipeline = WeeklyPipeline::new(&config);
    if let Some(model) = embedder {
        pipeline = pipeline.with_embedder(model);
    }
    pipeline.merge(roster, funding_docs, decision_docs)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agenda::{COL_ALLOCATED, COL_DECISION, COL_ORGANIZATION};
    use crate::matching::{COL_CLOSEST_MATCH, COL_REJECTED_BY};
    use crate::roster::COL_DESIGNATION;

    fn roster() -> Table {
        Table::new(["club_name", "Org Type", "BlueHeart", "Org ID Status"])
            .with_row(["Chess Club", "Sponsored", "No", "Active"])
            .with_row(["Pakistani Student Assoc.", "Sponsored", "No", "Active"])
            .with_row(["Debate Society", "Registered", "Yes", "Active"])
    }

    fn funding(name: &str) -> NamedTable {
        let table = Table::new(["club_name", "Amount Requested", "Type"])
            .with_row(["Chess Club", "250", "Contingency"])
            .with_row(["Pakistani Student Association", "900", "contingency"])
            .with_row(["Debate Society", "75", "Sponsorship"])
            .with_row(["Glorp Collective", "10", "Contingency"]);
        NamedTable::new(name, table)
    }

    fn decisions(name: &str) -> NamedTable {
        let table = Table::new([COL_ORGANIZATION, COL_DECISION, COL_ALLOCATED])
            .with_row(["Chess Club", "Approved", "200"])
            .with_row(["Pakistani Student Association", "Tabled", "0"])
            .with_row(["ASUC Office of Senator Lee", "Approved", "50"]);
        NamedTable::new(name, table)
    }

    fn fuzzy_only() -> Thresholds {
        Thresholds::fuzzy_only(85.0)
    }

    #[test]
    fn test_merge_pairs_same_week_documents() {
        let output = merge_period(
            &roster(),
            &[funding("FR 4_1 FY25")],
            &[decisions("Ficomm-Cont-04/01/2024-GF")],
            fuzzy_only(),
            "FY25",
            None,
        )
        .unwrap();

        assert!(output.dropped.is_empty());
        assert_eq!(output.generated_names(), vec!["Ficomm-Combined-04_01-FY25-GF"]);

        let period = &output.periods[0];
        let merged = &period.merged;
        // Chess and Pakistani joined; Glorp and the senator stand alone
        assert_eq!(merged.len(), 4);

        let chess = (0..merged.len())
            .find(|&i| merged.get(i, "club_name_matched") == Some("Chess Club"))
            .unwrap();
        assert_eq!(merged.get(chess, "Amount Requested"), Some("250"));
        assert_eq!(merged.get(chess, COL_ALLOCATED), Some("200"));

        let pakistani = (0..merged.len())
            .find(|&i| merged.get(i, "club_name_matched") == Some("Pakistani Student Assoc."))
            .unwrap();
        assert_eq!(merged.get(pakistani, COL_DECISION), Some("Tabled"));
        assert_eq!(merged.get(pakistani, "club_name"), Some("Pakistani Student Association"));

        let senator = (0..merged.len())
            .find(|&i| merged.get(i, COL_ORGANIZATION) == Some("ASUC Office of Senator Lee"))
            .unwrap();
        assert_eq!(merged.get(senator, COL_DESIGNATION), Some("ASUC: Senator"));

        assert_eq!(period.unmatched_funding.len(), 1);
        assert_eq!(period.unmatched_funding.get(0, "club_name"), Some("Glorp Collective"));
        assert!(period.unmatched_funding.has_column(COL_CLOSEST_MATCH));
        assert_eq!(period.unmatched_decisions.len(), 1);
        assert_eq!(period.unmatched_decisions.get(0, COL_REJECTED_BY), Some("fuzzy"));

        let names: Vec<String> = output.named_tables().into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec![
                "Ficomm-Combined-04_01-FY25-GF",
                "Ficomm-Combined-04_01-FY25-GF-Unmatched-FR",
                "Ficomm-Combined-04_01-FY25-GF-Unmatched-Contingency",
            ]
        );
    }

    #[test]
    fn test_unpaired_weeks_are_dropped_not_fatal() {
        let output = merge_period(
            &roster(),
            &[funding("FR 4_01 FY25")],
            &[decisions("Ficomm-Cont-04/08/2024-GF")],
            fuzzy_only(),
            "FY25",
            None,
        )
        .unwrap();

        assert!(output.periods.is_empty());
        assert_eq!(output.dropped.len(), 2);
        assert!(output.dropped.iter().all(|d| d.reason == DropReason::Unpaired));
    }

    #[test]
    fn test_duplicate_and_undated_documents() {
        let output = merge_period(
            &roster(),
            &[funding("FR 4_1 old"), funding("FR 04-01 new"), funding("FR undated")],
            &[decisions("Ficomm 4_1")],
            fuzzy_only(),
            "FY25",
            None,
        )
        .unwrap();

        assert_eq!(output.periods.len(), 1);
        let reasons: Vec<(&str, DropReason)> =
            output.dropped.iter().map(|d| (d.name.as_str(), d.reason)).collect();
        assert!(reasons.contains(&("FR 4_1 old", DropReason::Superseded)));
        assert!(reasons.contains(&("FR undated", DropReason::NoPeriodKey)));
    }

    #[test]
    fn test_bad_year_label_fails_fast() {
        let err = merge_period(&roster(), &[], &[], fuzzy_only(), "2025", None).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_roster_missing_columns_fails_fast() {
        let roster = Table::new(["club_name"]).with_row(["Chess Club"]);
        let err = merge_period(&roster, &[], &[], fuzzy_only(), "FY25", None).unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));
    }

    #[test]
    fn test_period_order_follows_keys() {
        let output = merge_period(
            &roster(),
            &[funding("FR 4_15"), funding("FR 4_8")],
            &[decisions("Ficomm 4-8"), decisions("Ficomm 4-15")],
            fuzzy_only(),
            "FY25",
            None,
        )
        .unwrap();
        assert_eq!(
            output.generated_names(),
            vec!["Ficomm-Combined-04_08-FY25-GF", "Ficomm-Combined-04_15-FY25-GF"]
        );
    }

    /// Maps names to a concept axis, so synonyms coincide whatever their spelling
    struct ConceptEmbedder;

    impl EmbeddingModel for ConceptEmbedder {
        fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, crate::EmbeddingError> {
            Ok(if text.contains("med") {
                vec![1.0, 0.0, 0.0]
            } else if text.contains("chess") {
                vec![0.0, 1.0, 0.0]
            } else {
                vec![0.0, 0.0, 1.0]
            })
        }

        fn embed_batch(
            &self,
            texts: &[&str],
        ) -> std::result::Result<Vec<Vec<f32>>, crate::EmbeddingError> {
            texts.iter().map(|t| self.embed(t)).collect()
        }

        fn dimension(&self) -> usize {
            3
        }
    }

    #[test]
    fn test_semantic_tier_resolves_gray_zone_names_in_merge() {
        let roster = Table::new(["club_name", "Org Type", "BlueHeart", "Org ID Status"])
            .with_row(["Chess Club", "Sponsored", "No", "Active"])
            .with_row(["Pre-Med Society", "Registered", "No", "Active"]);
        let funding = Table::new(["club_name", "Amount Requested", "Type"])
            .with_row(["Premedical Society", "400", "Contingency"]);
        let decisions = Table::new([COL_ORGANIZATION, COL_DECISION, COL_ALLOCATED])
            .with_row(["Premedical Society", "Approved", "300"]);
        let embedder = ConceptEmbedder;

        let output = merge_period(
            &roster,
            &[NamedTable::new("FR 4_1", funding)],
            &[NamedTable::new("Ficomm 4_1", decisions)],
            Thresholds::default(),
            "FY25",
            Some(&embedder),
        )
        .unwrap();

        let period = &output.periods[0];
        assert_eq!(period.merged.len(), 1);
        assert_eq!(period.merged.get(0, "club_name_matched"), Some("Pre-Med Society"));
        assert_eq!(period.merged.get(0, "Amount Requested"), Some("400"));
        assert_eq!(period.merged.get(0, COL_ALLOCATED), Some("300"));
        assert!(period.unmatched_funding.is_empty());
        assert!(period.unmatched_decisions.is_empty());

        // Fuzzy alone leaves the same name unmatched
        let fuzzy = merge_period(
            &roster,
            &[NamedTable::new("FR 4_1", Table::new(["club_name", "Amount Requested", "Type"]))],
            &[NamedTable::new(
                "Ficomm 4_1",
                Table::new([COL_ORGANIZATION]).with_row(["Premedical Society"]),
            )],
            fuzzy_only(),
            "FY25",
            None,
        )
        .unwrap();
        assert_eq!(fuzzy.periods[0].unmatched_decisions.len(), 1);
    }

    #[test]
    fn test_semantic_tier_without_model_fails_fast() {
        let err = merge_period(
            &roster(),
            &[funding("FR 4_1")],
            &[decisions("Ficomm 4_1")],
            Thresholds::default(),
            "FY25",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_malformed_document_fails_before_any_period_is_merged() {
        let broken = NamedTable::new(
            "Ficomm 4_8",
            Table::new(["Club", COL_DECISION]).with_row(["Chess Club", "Approved"]),
        );
        let err = merge_period(
            &roster(),
            &[funding("FR 4_1"), funding("FR 4_8")],
            &[decisions("Ficomm 4_1"), broken],
            fuzzy_only(),
            "FY25",
            None,
        )
        .unwrap_err();

        match err {
            Error::Schema { context, errors } => {
                assert!(context.contains("Ficomm 4_8"));
                assert_eq!(errors[0].field, COL_ORGANIZATION);
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_unpaired_document_is_not_silently_dropped() {
        let broken = NamedTable::new("FR 5_6", Table::new(["club_name", "Type"]));
        let err = merge_period(
            &roster(),
            &[funding("FR 4_1"), broken],
            &[decisions("Ficomm 4_1")],
            fuzzy_only(),
            "FY25",
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));
    }
}
