// 🎯 Match Cascade - Resolve club names against the roster
// Three tiers, cheapest first: Exact → Fuzzy → Semantic
//
// Every threshold is an EXCLUSIVE lower bound: a score equal to the threshold
// is a rejection. Rejections keep the eliminating tier, the closest candidate
// and its score so a human can audit them.

use crate::config::Thresholds;
use crate::embedding::{check_dimension, cosine_similarity, EmbeddingModel};
use crate::error::{EmbeddingError, Error, Result};
use crate::fuzzy;
use crate::normalize::{normalize_name, FilteredName, NameFilter};
use crate::schema::{SchemaValidator, TableKind};
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;

pub const COL_CLOSEST_MATCH: &str = "Closest Match";
pub const COL_REJECTED_BY: &str = "Rejected By";
pub const COL_BEST_SCORE: &str = "Best Score";

// ============================================================================
// MATCH METHOD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMethod {
    /// Normalized names are identical
    Exact,

    /// Weighted string similarity above the fuzzy threshold
    Fuzzy,

    /// Embedding cosine similarity above the semantic threshold
    Semantic,

    /// Not matched
    None,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::Exact => "exact",
            MatchMethod::Fuzzy => "fuzzy",
            MatchMethod::Semantic => "semantic",
            MatchMethod::None => "none",
        }
    }
}

/// Tier that eliminated a name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchTier {
    Fuzzy,
    Semantic,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::Fuzzy => "fuzzy",
            MatchTier::Semantic => "semantic",
        }
    }
}

// ============================================================================
// MATCH RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    pub tier: MatchTier,

    /// Candidate that came closest, as written in the pool
    pub closest: Option<String>,

    /// Best score of the eliminating tier (0-100)
    pub best_score: f64,

    /// Set when the noise filter changed the query before matching
    pub filter_note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub matched: bool,
    pub source_index: usize,
    pub target_index: Option<usize>,
    pub method: MatchMethod,

    /// Accepting score, or best rejected score (0-100)
    pub score: f64,

    /// Always present when `matched` is false
    pub rejection: Option<Rejection>,
}

impl MatchResult {
    fn accepted(source_index: usize, target_index: usize, method: MatchMethod, score: f64) -> Self {
        MatchResult {
            matched: true,
            source_index,
            target_index: Some(target_index),
            method,
            score,
            rejection: None,
        }
    }

    fn rejected(source_index: usize, rejection: Rejection) -> Self {
        MatchResult {
            matched: false,
            source_index,
            target_index: None,
            method: MatchMethod::None,
            score: rejection.best_score,
            rejection: Some(rejection),
        }
    }
}

// ============================================================================
// CANDIDATE POOL
// ============================================================================

/// Read-only reference table (normally the roster) names are resolved against
#[derive(Debug, Clone)]
pub struct CandidatePool {
    table: Table,
    name_column: String,
    normalized: Vec<String>,
}

impl CandidatePool {
    pub fn new(table: Table, name_column: &str) -> Result<Self> {
        SchemaValidator::validate(&table, TableKind::Roster, &[name_column])?;

        let normalized = table
            .column_values(name_column)
            .unwrap_or_default()
            .into_iter()
            .map(|v| v.map(normalize_name).unwrap_or_default())
            .collect();

        Ok(CandidatePool {
            table,
            name_column: name_column.to_string(),
            normalized,
        })
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn name_column(&self) -> &str {
        &self.name_column
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Candidate name as written in the pool
    pub fn display_name(&self, index: usize) -> Option<&str> {
        self.table.get(index, &self.name_column)
    }
}

// ============================================================================
// MATCH CASCADE
// ============================================================================

#[derive(Clone, Copy)]
pub struct MatchOptions<'a> {
    pub thresholds: Thresholds,
    pub filter: Option<&'a NameFilter>,
    pub embedder: Option<&'a dyn EmbeddingModel>,
}

impl<'a> MatchOptions<'a> {
    pub fn new(thresholds: Thresholds) -> Self {
        MatchOptions {
            thresholds,
            filter: None,
            embedder: None,
        }
    }

    pub fn with_filter(mut self, filter: &'a NameFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_embedder(mut self, embedder: &'a dyn EmbeddingModel) -> Self {
        self.embedder = Some(embedder);
        self
    }
}

pub struct MatchCascade<'a> {
    pool: &'a CandidatePool,
    options: MatchOptions<'a>,
    /// Computed on first semantic lookup, reused for the rest of the run
    pool_embeddings: OnceCell<Vec<Vec<f32>>>,
}

impl<'a> MatchCascade<'a> {
    pub fn new(pool: &'a CandidatePool, options: MatchOptions<'a>) -> Result<Self> {
        options.thresholds.validate()?;
        if options.thresholds.semantic_enabled && options.embedder.is_none() {
            return Err(Error::Config(
                "semantic tier enabled but no embedding model was provided".to_string(),
            ));
        }

        Ok(MatchCascade {
            pool,
            options,
            pool_embeddings: OnceCell::new(),
        })
    }

    /// Resolve one name. Rejections are values; only embedding failures are errors.
    pub fn resolve(&self, source_index: usize, name: &str) -> Result<MatchResult> {
        let filtered = match self.options.filter {
            Some(filter) => filter.apply(name),
            None => FilteredName {
                original: name.to_string(),
                filtered: normalize_name(name),
                applied: false,
            },
        };
        let filter_note = self
            .options
            .filter
            .and_then(|f| filtered.note(f.phrase()));

        // Tier 0: exact (unfiltered form first, then filtered)
        let unfiltered = normalize_name(name);
        for query in [&unfiltered, &filtered.filtered] {
            if query.is_empty() {
                continue;
            }
            if let Some(target) = self.pool.normalized.iter().position(|c| c == query) {
                return Ok(MatchResult::accepted(source_index, target, MatchMethod::Exact, 100.0));
            }
        }

        let query = filtered.filtered.as_str();
        let thresholds = &self.options.thresholds;

        // Tier 1: fuzzy
        let (fuzzy_target, fuzzy_score) = match fuzzy::extract_one(query, &self.pool.normalized) {
            Some(best) => best,
            None => {
                return Ok(MatchResult::rejected(
                    source_index,
                    Rejection {
                        tier: MatchTier::Fuzzy,
                        closest: None,
                        best_score: 0.0,
                        filter_note,
                    },
                ))
            }
        };

        if fuzzy_score > thresholds.fuzzy_threshold {
            return Ok(MatchResult::accepted(
                source_index,
                fuzzy_target,
                MatchMethod::Fuzzy,
                fuzzy_score,
            ));
        }

        // Tier 2: semantic, only for names the fuzzy tier found plausible
        if thresholds.semantic_enabled && fuzzy_score > thresholds.semantic_gate_threshold {
            if let Some(model) = self.options.embedder {
                let (target, similarity) = self.best_semantic(model, query)?;
                let score = similarity * 100.0;

                if score > thresholds.semantic_accept_threshold {
                    return Ok(MatchResult::accepted(
                        source_index,
                        target,
                        MatchMethod::Semantic,
                        score,
                    ));
                }

                tracing::debug!(name, score, "rejected by semantic tier");
                return Ok(MatchResult::rejected(
                    source_index,
                    Rejection {
                        tier: MatchTier::Semantic,
                        closest: self.pool.display_name(target).map(str::to_string),
                        best_score: score,
                        filter_note,
                    },
                ));
            }
        }

        tracing::debug!(name, score = fuzzy_score, "rejected by fuzzy tier");
        Ok(MatchResult::rejected(
            source_index,
            Rejection {
                tier: MatchTier::Fuzzy,
                closest: self.pool.display_name(fuzzy_target).map(str::to_string),
                best_score: fuzzy_score,
                filter_note,
            },
        ))
    }

    /// Arg-max cosine similarity over the pool; first index wins ties
    fn best_semantic(&self, model: &dyn EmbeddingModel, query: &str) -> Result<(usize, f64)> {
        let pool_vectors = self.pool_embeddings(model)?;
        let query_vector = model.embed(query)?;
        check_dimension(model, &query_vector)?;

        let mut best = (0, f64::NEG_INFINITY);
        for (i, candidate) in pool_vectors.iter().enumerate() {
            let similarity = cosine_similarity(&query_vector, candidate) as f64;
            if similarity > best.1 {
                best = (i, similarity);
            }
        }
        Ok(best)
    }

    fn pool_embeddings(&self, model: &dyn EmbeddingModel) -> Result<&[Vec<f32>]> {
        if self.pool_embeddings.get().is_none() {
            let names: Vec<&str> = self.pool.normalized.iter().map(String::as_str).collect();
            let vectors = model.embed_batch(&names)?;
            if vectors.len() != names.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: names.len(),
                    got: vectors.len(),
                }
                .into());
            }
            for vector in &vectors {
                check_dimension(model, vector)?;
            }
            tracing::debug!(candidates = vectors.len(), "embedded candidate pool");
            let _ = self.pool_embeddings.set(vectors);
        }

        Ok(self.pool_embeddings.get().map(Vec::as_slice).unwrap_or(&[]))
    }
}

// ============================================================================
// TABLE RESOLUTION
// ============================================================================

/// A record the cascade could not place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unmatched {
    pub row_index: usize,
    pub name: String,
    pub rejection: Rejection,
}

/// Column that receives pool column `column` on a resolved table
pub fn matched_column(column: &str) -> String {
    format!("{}_matched", column)
}

/// Resolve every row of `records` against `pool`.
///
/// Pool columns are appended as `<col>_matched`. Rows whose matched name is
/// already filled are left alone, so resolving an already-resolved table is a no-op.
pub fn resolve_entities(
    records: &Table,
    name_column: &str,
    pool: &CandidatePool,
    options: MatchOptions<'_>,
) -> Result<(Table, Vec<Unmatched>)> {
    SchemaValidator::require_columns(records, &[name_column], "records to resolve")?;

    let cascade = MatchCascade::new(pool, options)?;
    let mut resolved = records.clone();
    let pool_columns = pool.table().columns().to_vec();
    for column in &pool_columns {
        resolved.ensure_column(&matched_column(column));
    }
    let matched_name = matched_column(pool.name_column());

    let mut unmatched = Vec::new();
    let mut accepted = 0usize;

    for row in 0..resolved.len() {
        if resolved.get(row, &matched_name).is_some() {
            continue;
        }

        let Some(name) = resolved.get(row, name_column).map(str::to_string) else {
            unmatched.push(Unmatched {
                row_index: row,
                name: String::new(),
                rejection: Rejection {
                    tier: MatchTier::Fuzzy,
                    closest: None,
                    best_score: 0.0,
                    filter_note: None,
                },
            });
            continue;
        };

        let result = cascade.resolve(row, &name)?;
        match (result.target_index, result.rejection) {
            (Some(target), _) => {
                accepted += 1;
                for column in &pool_columns {
                    let value = pool.table().get(target, column).map(str::to_string);
                    resolved.set(row, &matched_column(column), value);
                }
            }
            (None, Some(rejection)) => unmatched.push(Unmatched {
                row_index: row,
                name,
                rejection,
            }),
            (None, None) => {}
        }
    }

    tracing::info!(
        rows = resolved.len(),
        matched = accepted,
        unmatched = unmatched.len(),
        "resolved names against candidate pool"
    );

    Ok((resolved, unmatched))
}

/// Unmatched source rows plus the audit columns explaining each rejection
pub fn audit_table(records: &Table, unmatched: &[Unmatched]) -> Table {
    let indices: Vec<usize> = unmatched.iter().map(|u| u.row_index).collect();
    let mut table = records.take_rows(&indices);

    for column in [COL_CLOSEST_MATCH, COL_REJECTED_BY, COL_BEST_SCORE] {
        table.ensure_column(column);
    }
    for (row, entry) in unmatched.iter().enumerate() {
        let rejection = &entry.rejection;
        table.set(row, COL_CLOSEST_MATCH, rejection.closest.clone());
        table.set(row, COL_REJECTED_BY, Some(rejection.tier.as_str().to_string()));
        table.set(row, COL_BEST_SCORE, Some(format!("{:.2}", rejection.best_score)));
    }

    table
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashingEmbedder;
    use std::cell::Cell;

    /// Same vector for every input, counting calls
    struct ConstantEmbedder {
        batch_calls: Cell<usize>,
        single_calls: Cell<usize>,
    }

    impl ConstantEmbedder {
        fn new() -> Self {
            ConstantEmbedder {
                batch_calls: Cell::new(0),
                single_calls: Cell::new(0),
            }
        }
    }

    impl EmbeddingModel for ConstantEmbedder {
        fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            self.single_calls.set(self.single_calls.get() + 1);
            Ok(vec![1.0, 0.0])
        }

        fn embed_batch(
            &self,
            texts: &[&str],
        ) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
            self.batch_calls.set(self.batch_calls.get() + 1);
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    /// Query vectors one dimension longer than the pool's
    struct RaggedEmbedder;

    impl EmbeddingModel for RaggedEmbedder {
        fn embed(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
            Ok(vec![1.0, 0.0, 0.0])
        }

        fn embed_batch(
            &self,
            texts: &[&str],
        ) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    fn pool(names: &[&str]) -> CandidatePool {
        let mut table = Table::new(["club_name", "Org ID Status"]);
        for (i, name) in names.iter().enumerate() {
            table.push_row(vec![Some(name.to_string()), Some(format!("ID-{i}"))]);
        }
        CandidatePool::new(table, "club_name").unwrap()
    }

    fn fuzzy_cascade(pool: &CandidatePool, threshold: f64) -> MatchCascade<'_> {
        MatchCascade::new(pool, MatchOptions::new(Thresholds::fuzzy_only(threshold))).unwrap()
    }

    fn semantic_thresholds(fuzzy: f64, gate: f64, accept: f64) -> Thresholds {
        Thresholds {
            fuzzy_threshold: fuzzy,
            semantic_enabled: true,
            semantic_gate_threshold: gate,
            semantic_accept_threshold: accept,
        }
    }

    #[test]
    fn test_abbreviation_accepted_by_fuzzy_tier_not_semantic() {
        let pool = pool(&["Pakistani Student Assoc.", "Chess Club"]);
        let embedder = HashingEmbedder::default();
        let filter = NameFilter::default();

        for options in [
            MatchOptions::new(Thresholds::fuzzy_only(85.0)),
            MatchOptions::new(Thresholds::default())
                .with_filter(&filter)
                .with_embedder(&embedder),
        ] {
            let cascade = MatchCascade::new(&pool, options).unwrap();
            let result = cascade.resolve(0, "Pakistani Student Association").unwrap();
            assert!(result.matched);
            assert_eq!(result.method, MatchMethod::Fuzzy);
            assert_eq!(result.target_index, Some(0));
            assert!(result.score > 85.0);
        }
    }

    #[test]
    fn test_exact_tier_precedes_fuzzy() {
        let pool = pool(&["Chess Club at Berkeley", "Chess Club"]);
        let cascade = fuzzy_cascade(&pool, 85.0);

        let result = cascade.resolve(3, "  CHESS   club ").unwrap();
        assert_eq!(result.method, MatchMethod::Exact);
        assert_eq!(result.target_index, Some(1));
        assert_eq!(result.source_index, 3);
        assert_eq!(result.score, 100.0);
    }

    #[test]
    fn test_fuzzy_threshold_is_exclusive() {
        let pool = pool(&["abce"]);

        let cascade = fuzzy_cascade(&pool, 75.0);
        let result = cascade.resolve(0, "abcd").unwrap();
        assert!(!result.matched);
        let rejection = result.rejection.unwrap();
        assert_eq!(rejection.tier, MatchTier::Fuzzy);
        assert_eq!(rejection.closest.as_deref(), Some("abce"));
        assert_eq!(rejection.best_score, 75.0);

        let cascade = fuzzy_cascade(&pool, 74.9);
        assert!(cascade.resolve(0, "abcd").unwrap().matched);
    }

    #[test]
    fn test_semantic_threshold_is_exclusive() {
        let pool = pool(&["abce"]);
        let embedder = ConstantEmbedder::new();

        // cosine 1.0 → score 100, not above 100
        let options =
            MatchOptions::new(semantic_thresholds(99.0, 0.0, 100.0)).with_embedder(&embedder);
        let result = MatchCascade::new(&pool, options).unwrap().resolve(0, "abcd").unwrap();
        assert!(!result.matched);
        let rejection = result.rejection.unwrap();
        assert_eq!(rejection.tier, MatchTier::Semantic);
        assert_eq!(rejection.best_score, 100.0);

        let options =
            MatchOptions::new(semantic_thresholds(99.0, 0.0, 99.9)).with_embedder(&embedder);
        let result = MatchCascade::new(&pool, options).unwrap().resolve(0, "abcd").unwrap();
        assert!(result.matched);
        assert_eq!(result.method, MatchMethod::Semantic);
    }

    #[test]
    fn test_semantic_gate_skips_embeddings() {
        let pool = pool(&["abce"]);
        let embedder = ConstantEmbedder::new();
        let options =
            MatchOptions::new(semantic_thresholds(99.0, 80.0, 10.0)).with_embedder(&embedder);

        let result = MatchCascade::new(&pool, options).unwrap().resolve(0, "abcd").unwrap();
        assert_eq!(result.rejection.unwrap().tier, MatchTier::Fuzzy);
        assert_eq!(embedder.batch_calls.get(), 0);
        assert_eq!(embedder.single_calls.get(), 0);
    }

    #[test]
    fn test_pool_embeddings_computed_once() {
        let pool = pool(&["abce", "wxyz"]);
        let embedder = ConstantEmbedder::new();
        let options =
            MatchOptions::new(semantic_thresholds(99.0, 0.0, 100.0)).with_embedder(&embedder);
        let cascade = MatchCascade::new(&pool, options).unwrap();

        for i in 0..3 {
            cascade.resolve(i, "abcd").unwrap();
        }
        assert_eq!(embedder.batch_calls.get(), 1);
        assert_eq!(embedder.single_calls.get(), 3);
    }

    #[test]
    fn test_wrong_embedding_dimension_is_an_error() {
        let pool = pool(&["abce"]);
        let embedder = RaggedEmbedder;
        let options =
            MatchOptions::new(semantic_thresholds(99.0, 0.0, 10.0)).with_embedder(&embedder);

        let err = MatchCascade::new(&pool, options).unwrap().resolve(0, "abcd").unwrap_err();
        assert!(matches!(
            err,
            Error::Embedding(EmbeddingError::DimensionMismatch { expected: 2, got: 3 })
        ));
    }

    #[test]
    fn test_semantic_without_model_is_config_error() {
        let pool = pool(&["Chess Club"]);
        let result = MatchCascade::new(&pool, MatchOptions::new(Thresholds::default()));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_raising_threshold_never_adds_fuzzy_matches() {
        let pool = pool(&[
            "Pakistani Student Assoc.",
            "Chess Club",
            "Robotics Club",
            "Debate Society",
        ]);
        let names = [
            "Pakistani Student Association",
            "Chess Club at Berkeley",
            "Robotics",
            "Debate",
            "Film Club",
        ];

        let mut previous = usize::MAX;
        for threshold in [0.0, 50.0, 70.0, 85.0, 90.0, 95.0, 100.0] {
            let cascade = fuzzy_cascade(&pool, threshold);
            let accepted = names
                .iter()
                .enumerate()
                .filter(|(i, n)| cascade.resolve(*i, n).unwrap().method == MatchMethod::Fuzzy)
                .count();
            assert!(accepted <= previous, "threshold {threshold}");
            previous = accepted;
        }
    }

    #[test]
    fn test_resolve_entities_copies_attributes_and_is_idempotent() {
        let pool = pool(&["Chess Club", "Debate Society"]);
        let records = Table::new(["Organization Name", "Ficomm Decision"])
            .with_row(["chess club", "Approved"])
            .with_row(["Underwater Basket Weaving", "Tabled"]);
        let options = MatchOptions::new(Thresholds::fuzzy_only(85.0));

        let (resolved, unmatched) =
            resolve_entities(&records, "Organization Name", &pool, options).unwrap();
        assert_eq!(resolved.get(0, "club_name_matched"), Some("Chess Club"));
        assert_eq!(resolved.get(0, "Org ID Status_matched"), Some("ID-0"));
        assert_eq!(resolved.get(1, "club_name_matched"), None);
        assert_eq!(unmatched.len(), 1);
        assert_eq!(unmatched[0].row_index, 1);
        assert_eq!(unmatched[0].name, "Underwater Basket Weaving");

        let (again, unmatched_again) =
            resolve_entities(&resolved, "Organization Name", &pool, options).unwrap();
        assert_eq!(again, resolved);
        assert_eq!(unmatched_again, unmatched);
    }

    #[test]
    fn test_resolve_entities_requires_name_column() {
        let pool = pool(&["Chess Club"]);
        let records = Table::new(["Club"]).with_row(["Chess Club"]);
        let options = MatchOptions::new(Thresholds::fuzzy_only(85.0));
        let err = resolve_entities(&records, "Organization Name", &pool, options).unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));
    }

    #[test]
    fn test_audit_table_lists_rejections() {
        let pool = pool(&["abce"]);
        let records = Table::new(["name"]).with_row(["abce"]).with_row(["abcd"]);
        let options = MatchOptions::new(Thresholds::fuzzy_only(75.0));
        let (_, unmatched) = resolve_entities(&records, "name", &pool, options).unwrap();

        let audit = audit_table(&records, &unmatched);
        assert_eq!(audit.len(), 1);
        assert_eq!(audit.get(0, "name"), Some("abcd"));
        assert_eq!(audit.get(0, COL_CLOSEST_MATCH), Some("abce"));
        assert_eq!(audit.get(0, COL_REJECTED_BY), Some("fuzzy"));
        assert_eq!(audit.get(0, COL_BEST_SCORE), Some("75.00"));
    }
}
