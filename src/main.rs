use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "onnx-embeddings")]
use ficomm_reconcile::embedding::OnnxEmbedder;

use ficomm_reconcile::db::{CsvDirSink, DuplicateHandling, Sink, SqliteSink};
use ficomm_reconcile::matching::audit_table;
use ficomm_reconcile::parser::{
    get_processor, load_documents, process_batch, DocumentContent, ProcessType,
};
use ficomm_reconcile::{
    process_agenda, resolve_entities, CandidatePool, EmbeddingModel, HashingEmbedder, MatchOptions,
    NameFilter, NamedTable, PipelineConfig, Table, WeeklyPipeline,
};

#[derive(Parser, Debug)]
#[command(
    name = "ficomm",
    version,
    about = "Finance committee minutes → funding decisions resolved against the club roster",
    subcommand_required = true,
    arg_required_else_help = true
)]
struct Cli {
    /// JSON config overriding keywords, thresholds and column names
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding model.onnx and tokenizer.json for the semantic tier
    /// (needs the `onnx-embeddings` feature; trigram hashing otherwise)
    #[arg(long, global = true, value_name = "DIR")]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract decisions from one minutes file and print them as CSV
    Agenda {
        file: PathBuf,
    },

    /// Resolve a name column of a CSV against the roster
    Resolve {
        #[arg(long, value_name = "CSV")]
        records: PathBuf,

        #[arg(long, value_name = "CSV")]
        roster: PathBuf,

        /// Name column of the records (defaults to the decisions column)
        #[arg(long)]
        name_column: Option<String>,

        /// Write the resolved table here instead of stdout
        #[arg(long, value_name = "CSV")]
        out: Option<PathBuf>,
    },

    /// Join same-week funding requests and decisions
    Merge {
        #[arg(long, value_name = "CSV")]
        roster: PathBuf,

        #[arg(long, value_name = "DIR")]
        funding_dir: PathBuf,

        #[arg(long, value_name = "DIR")]
        decisions_dir: PathBuf,

        /// Fiscal year label, e.g. FY25
        #[arg(long)]
        year: Option<String>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Run one document processor over every file in a directory
    Process {
        #[arg(long = "type", value_name = "TYPE")]
        process_type: ProcessType,

        dir: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(clap::Args, Debug)]
struct OutputArgs {
    /// Directory for CSV outputs
    #[arg(long, value_name = "DIR")]
    out: PathBuf,

    /// ignore | number | overwrite
    #[arg(long, default_value = "number")]
    duplicates: DuplicateHandling,

    /// Also store outputs in this SQLite database
    #[arg(long, value_name = "FILE")]
    sqlite: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    let model_dir = cli.model_dir.as_deref();

    match cli.command {
        Command::Agenda { file } => run_agenda(&file, &config),
        Command::Resolve {
            records,
            roster,
            name_column,
            out,
        } => {
            let embedder = select_embedder(model_dir)?;
            run_resolve(&records, &roster, name_column, out.as_deref(), &config, embedder.as_ref())
        }
        Command::Merge {
            roster,
            funding_dir,
            decisions_dir,
            year,
            output,
        } => {
            let embedder = select_embedder(model_dir)?;
            run_merge(
                &roster,
                &funding_dir,
                &decisions_dir,
                year,
                &output,
                config,
                embedder.as_ref(),
            )
        }
        Command::Process {
            process_type,
            dir,
            output,
        } => run_process(process_type, &dir, &output, &config),
    }
}

fn run_agenda(file: &Path, config: &PipelineConfig) -> Result<()> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("Failed to read minutes: {:?}", file))?;
    let (table, date) = process_agenda(&text, &config.agenda)?;

    eprintln!("📅 Meeting date: {}", date);
    print!("{}", table.to_csv_string()?);
    Ok(())
}

fn run_resolve(
    records: &Path,
    roster: &Path,
    name_column: Option<String>,
    out: Option<&Path>,
    config: &PipelineConfig,
    embedder: &dyn EmbeddingModel,
) -> Result<()> {
    let records = Table::from_csv_path(records)
        .with_context(|| format!("Failed to load records: {:?}", records))?;
    let roster = load_roster(roster)?;
    let name_column = name_column.unwrap_or_else(|| config.columns.decision_name.clone());

    let pool = CandidatePool::new(roster, &config.columns.roster_name)?;
    let filter = config.noise_phrase.as_deref().map(NameFilter::new);
    let options = match_options(config, filter.as_ref(), embedder);

    let (resolved, unmatched) = resolve_entities(&records, &name_column, &pool, options)?;

    match out {
        Some(path) => {
            let file = fs::File::create(path)
                .with_context(|| format!("Failed to create file: {:?}", path))?;
            resolved.to_csv_writer(file)?;
            eprintln!("✓ Wrote {} rows to {:?}", resolved.len(), path);
        }
        None => print!("{}", resolved.to_csv_string()?),
    }

    if !unmatched.is_empty() {
        eprintln!("\n⚠️  {} unmatched:", unmatched.len());
        eprint!("{}", audit_table(&records, &unmatched).to_csv_string()?);
    }
    Ok(())
}

fn run_merge(
    roster: &Path,
    funding_dir: &Path,
    decisions_dir: &Path,
    year: Option<String>,
    output: &OutputArgs,
    mut config: PipelineConfig,
    embedder: &dyn EmbeddingModel,
) -> Result<()> {
    if let Some(year) = year {
        config.year_label = year;
    }

    let roster = load_roster(roster)?;
    let funding = table_documents(funding_dir)?;
    let decisions = table_documents(decisions_dir)?;

    let pipeline = WeeklyPipeline::new(&config).with_embedder(embedder);
    let merged = pipeline.merge(&roster, &funding, &decisions)?;

    for dropped in &merged.dropped {
        eprintln!("⚠️  Dropped {:?} ({:?}, {:?})", dropped.name, dropped.kind, dropped.reason);
    }

    let written = write_outputs(&merged.named_tables(), output)?;
    eprintln!("✓ {} periods merged, {} files written", merged.periods.len(), written);
    Ok(())
}

fn run_process(
    process_type: ProcessType,
    dir: &Path,
    output: &OutputArgs,
    config: &PipelineConfig,
) -> Result<()> {
    let docs = load_documents(dir)?;
    if docs.is_empty() {
        bail!("No .txt or .csv documents found in {:?}", dir);
    }

    let processor = get_processor(process_type, config)?;
    let report = process_batch(processor.as_ref(), &docs)?;

    for skipped in &report.skipped {
        eprintln!("⚠️  Skipped {} ({}): {}", skipped.name, skipped.id, skipped.reason);
    }
    for name in report.mismatched() {
        eprintln!("⚠️  Naming mismatch: {}", name);
    }

    let written = write_outputs(&report.outputs, output)?;
    eprintln!("✓ {} processed, {} files written", report.outputs.len(), written);
    Ok(())
}

/// ONNX model when one is given, trigram hashing otherwise
fn select_embedder(model_dir: Option<&Path>) -> Result<Box<dyn EmbeddingModel>> {
    match model_dir {
        #[cfg(feature = "onnx-embeddings")]
        Some(dir) => Ok(Box::new(OnnxEmbedder::load(dir)?)),
        #[cfg(not(feature = "onnx-embeddings"))]
        Some(dir) => bail!(
            "--model-dir {:?} needs a build with the `onnx-embeddings` feature",
            dir
        ),
        None => {
            tracing::info!("no model directory given, using trigram hashing for the semantic tier");
            Ok(Box::new(HashingEmbedder::default()))
        }
    }
}

fn load_roster(path: &Path) -> Result<Table> {
    Table::from_csv_path(path).with_context(|| format!("Failed to load roster: {:?}", path))
}

fn match_options<'a>(
    config: &PipelineConfig,
    filter: Option<&'a NameFilter>,
    embedder: &'a dyn EmbeddingModel,
) -> MatchOptions<'a> {
    let mut options = MatchOptions::new(config.thresholds).with_embedder(embedder);
    if let Some(filter) = filter {
        options = options.with_filter(filter);
    }
    options
}

/// CSV files of a directory as named tables
fn table_documents(dir: &Path) -> Result<Vec<NamedTable>> {
    Ok(load_documents(dir)?
        .into_iter()
        .filter_map(|doc| match doc.content {
            DocumentContent::Table(table) => Some(NamedTable::new(doc.name, table)),
            DocumentContent::Text(_) => None,
        })
        .collect())
}

fn write_outputs(outputs: &[(String, Table)], args: &OutputArgs) -> Result<usize> {
    let mut csv_sink = CsvDirSink::new(&args.out, args.duplicates)?;
    let written = csv_sink.write(outputs)?;

    if let Some(path) = &args.sqlite {
        let mut sqlite = SqliteSink::open(path)?;
        sqlite.write(outputs)?;
    }

    Ok(written)
}
