// Ficomm Reconcile - Core Library
// Funding decisions from meeting minutes, resolved against the club roster.
// Exposes all modules for use in the CLI and tests

pub mod error;
pub mod table;
pub mod schema;         // Shape Layer - required columns
pub mod config;
pub mod dates;
pub mod section;        // Agenda: bounded funding section
pub mod motions;        // Agenda: club → motion lines
pub mod rules;          // Agenda: motion text → decision
pub mod agenda;
pub mod normalize;      // Names: canonical form + noise filter
pub mod fuzzy;          // Names: string similarity
pub mod embedding;      // Names: vector similarity
pub mod matching;       // Names: exact → fuzzy → semantic cascade
pub mod roster;
pub mod pipeline;       // Weekly funding/decision join
pub mod parser;         // Per-document-type processors
pub mod db;             // Output sinks

// Re-export commonly used types
pub use error::{EmbeddingError, Error, ExtractionError, Result};
pub use table::{Row, Table};
pub use schema::{SchemaValidator, TableKind, ValidationError};
pub use config::{AgendaConfig, ColumnConfig, PipelineConfig, Thresholds};
pub use dates::{DateToken, PeriodKey};
pub use section::SectionExtractor;
pub use motions::{EntityMotionGroup, MotionGroup, MotionSegmenter};
pub use rules::{Allocation, ClassificationResult, DecisionClassifier, DecisionLabel, DecisionRule};
pub use agenda::{process_agenda, AgendaProcessor, DecisionRecord};
pub use normalize::{normalize_name, FilteredName, NameFilter};
pub use embedding::{cosine_similarity, EmbeddingModel, HashingEmbedder};
#[cfg(feature = "onnx-embeddings")]
pub use embedding::OnnxEmbedder;
pub use matching::{
    resolve_entities, CandidatePool, MatchCascade, MatchMethod, MatchOptions,
    MatchResult, MatchTier, Rejection, Unmatched,
};
pub use pipeline::{merge_period, MergeOutput, NamedTable, PeriodOutput, WeeklyPipeline};
pub use parser::{
    detect_process, get_processor, load_documents, process_batch,
    BatchReport, DocumentContent, DocumentProcessor, ProcessType, SourceDocument,
};
pub use db::{CsvDirSink, DuplicateHandling, Sink, SqliteSink};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
