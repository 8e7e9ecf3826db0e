use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Args as ClapArgs, Parser, Subcommand};
use fund_analytics::llm::{LlmClient, LlmConfig, RagRetriever};
use fund_analytics::metrics::{FundMetricsService, ResidualValue};
use fund_analytics::qa::FundQaService;
use fund_analytics::router::QueryRouter;
use fund_core::{DateLocale, FundId, MetricKind, PipelineConfig, SegmenterConfig, TransactionLedger};
use fund_data_services::{DocumentIngestionPipeline, ExtractionResult, LmdbLedger, VectorStore};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};

/// Fund document ingestion and performance metrics CLI
///
/// Reads extracted fund reports (tables and page text as JSON), stores classified
/// transactions in an LMDB ledger, indexes prose chunks in Qdrant, and computes
/// PIC, DPI and IRR from the ledger.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, global = true, default_value = "info")]
    log_level: String,

    /// LMDB transaction ledger directory
    #[arg(long, global = true, default_value = "./data/ledger")]
    lmdb_path: PathBuf,

    /// Qdrant URL (gRPC port)
    #[arg(short = 'q', long, global = true, default_value = "http://localhost:6334")]
    qdrant_url: String,

    /// Qdrant collection name
    #[arg(short = 'c', long, global = true, default_value = "fund_document_chunks")]
    collection: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest one extracted document for a fund
    Ingest(IngestArgs),

    /// Compute fund metrics from the ledger
    Metrics(MetricsArgs),

    /// Answer a question about a fund
    Ask(AskArgs),
}

#[derive(ClapArgs, Debug)]
struct IngestArgs {
    /// Extractor output (JSON with `tables` and `text_blocks`)
    #[arg(short = 'f', long)]
    extraction: PathBuf,

    #[arg(long)]
    fund_id: FundId,

    #[arg(long)]
    document_id: i64,

    /// Pipeline config (JSON); flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum characters per chunk
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Characters repeated from the previous chunk
    #[arg(long)]
    overlap: Option<usize>,

    /// How to read ambiguous numeric dates: month-first or day-first
    #[arg(long)]
    date_locale: Option<String>,

    /// Skip embedding and Qdrant upload
    #[arg(long)]
    no_embed: bool,
}

#[derive(ClapArgs, Debug)]
struct MetricsArgs {
    #[arg(long)]
    fund_id: FundId,

    /// Net asset value counted as the final IRR inflow
    #[arg(long)]
    nav: Option<Decimal>,

    /// Valuation date of the NAV (YYYY-MM-DD)
    #[arg(long)]
    nav_date: Option<NaiveDate>,

    /// Print the records behind one metric (pic, dpi, irr) instead of the snapshot
    #[arg(long)]
    breakdown: Option<MetricKind>,
}

#[derive(ClapArgs, Debug)]
struct AskArgs {
    #[arg(long)]
    fund_id: FundId,

    /// The question
    question: String,

    /// Answer without document search
    #[arg(long)]
    no_retrieval: bool,

    /// LLM model (OPENAI_API_KEY must be set; otherwise a fallback answer is given)
    #[arg(long, default_value = "gpt-4-turbo")]
    model: String,
}

/// Parse log level from string
fn parse_log_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn parse_date_locale(value: &str) -> Result<DateLocale> {
    match value.to_lowercase().replace('_', "-").as_str() {
        "month-first" | "us" => Ok(DateLocale::MonthFirst),
        "day-first" | "eu" => Ok(DateLocale::DayFirst),
        other => Err(anyhow!("unknown date locale: {}", other)),
    }
}

impl IngestArgs {
    /// Config file (or defaults) with command-line overrides applied
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if self.chunk_size.is_some() || self.overlap.is_some() {
            config.segmenter = SegmenterConfig::new(
                self.chunk_size.unwrap_or(config.segmenter.chunk_size),
                self.overlap.unwrap_or(config.segmenter.overlap),
            )?;
        }

        if let Some(locale) = &self.date_locale {
            config.date_locale = parse_date_locale(locale)?;
        }

        Ok(config)
    }
}

impl MetricsArgs {
    fn residual_value(&self) -> Result<Option<ResidualValue>> {
        match (self.nav, self.nav_date) {
            (Some(amount), Some(date)) => Ok(Some(ResidualValue::new(date, amount))),
            (None, None) => Ok(None),
            _ => Err(anyhow!("--nav and --nav-date must be given together")),
        }
    }
}

fn open_ledger(cli: &Cli) -> Result<Arc<dyn TransactionLedger>> {
    let ledger = LmdbLedger::open(&cli.lmdb_path)
        .with_context(|| format!("Failed to open ledger at {}", cli.lmdb_path.display()))?;
    Ok(Arc::new(ledger))
}

async fn run_ingest(cli: &Cli, args: &IngestArgs) -> Result<()> {
    let config = args.pipeline_config()?;
    let extraction = ExtractionResult::from_json_file(&args.extraction)?;
    let ledger = open_ledger(cli)?;

    info!("Configuration:");
    info!("  Extraction: {}", args.extraction.display());
    info!("  Fund: {} Document: {}", args.fund_id, args.document_id);
    info!(
        "  Chunk size: {} Overlap: {}",
        config.segmenter.chunk_size, config.segmenter.overlap
    );
    info!("  Date locale: {:?}", config.date_locale);
    info!("  Ledger: {}", cli.lmdb_path.display());
    if args.no_embed {
        info!("  Embedding: disabled");
    } else {
        info!("  Qdrant: {} / {}", cli.qdrant_url, cli.collection);
    }

    let mut pipeline = if args.no_embed {
        DocumentIngestionPipeline::new(&config, ledger)?
    } else {
        DocumentIngestionPipeline::with_vector_store(
            &config,
            ledger,
            &cli.qdrant_url,
            cli.collection.clone(),
        )
        .await?
    };

    let processed = pipeline
        .ingest(&extraction, args.fund_id, args.document_id)
        .await?;
    let summary = &processed.summary;

    info!("Ingestion complete: {:?}", summary.status);
    info!(
        "  {} pages, {} tables: {} calls, {} distributions, {} adjustments",
        summary.pages_processed,
        summary.tables_found,
        summary.capital_calls,
        summary.distributions,
        summary.adjustments
    );
    info!(
        "  {} rows skipped, {} chunks ({} indexed)",
        summary.skipped_rows, summary.text_chunks, summary.chunks_indexed
    );
    if !summary.unknown_tables.is_empty() {
        warn!("  Tables needing review: {:?}", summary.unknown_tables);
    }
    for error in &summary.errors {
        warn!("  {}", error);
    }

    println!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

fn run_metrics(cli: &Cli, args: &MetricsArgs) -> Result<()> {
    let residual = args.residual_value()?;
    let service = FundMetricsService::new(open_ledger(cli)?);

    match args.breakdown {
        Some(metric) => {
            let records = service.get_breakdown(args.fund_id, metric)?;
            info!("{} records behind {} for fund {}", records.len(), metric, args.fund_id);
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        None => {
            let snapshot = service.get_metrics_with_residual(args.fund_id, residual)?;
            info!(
                "Fund {}: PIC {}, DPI {}, IRR {}",
                args.fund_id, snapshot.pic, snapshot.dpi, snapshot.irr
            );
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }

    Ok(())
}

async fn run_ask(cli: &Cli, args: &AskArgs) -> Result<()> {
    let router = QueryRouter::new(open_ledger(cli)?);
    let mut service = FundQaService::new(router);

    if !args.no_retrieval {
        let store = VectorStore::new(&cli.qdrant_url, cli.collection.clone()).await?;
        let retriever = RagRetriever::new(Arc::new(store), None).await?;
        service = service.with_retriever(Arc::new(retriever));
    }

    match std::env::var("OPENAI_API_KEY") {
        Ok(api_key) => {
            let config = LlmConfig {
                model: args.model.clone(),
                ..LlmConfig::default()
            };
            service = service.with_generator(Arc::new(LlmClient::new(config, api_key)?));
        }
        Err(_) => warn!("OPENAI_API_KEY not set, answering from metrics and documents only"),
    }

    let answer = service.ask(&args.question, args.fund_id, &[]).await;
    info!("Answer source: {:?}", answer.source);
    println!("{}", answer.answer);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(parse_log_level(&cli.log_level))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Fund Document Pipeline");

    match &cli.command {
        Command::Ingest(args) => run_ingest(&cli, args).await,
        Command::Metrics(args) => run_metrics(&cli, args),
        Command::Ask(args) => run_ask(&cli, args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ingest_args(chunk_size: Option<usize>, overlap: Option<usize>) -> IngestArgs {
        IngestArgs {
            extraction: PathBuf::from("report.json"),
            fund_id: 1,
            document_id: 1,
            config: None,
            chunk_size,
            overlap,
            date_locale: None,
            no_embed: true,
        }
    }

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_log_level("warn"), Level::WARN);
        assert_eq!(parse_log_level("verbose"), Level::INFO);
    }

    #[test]
    fn test_parse_date_locale() {
        assert_eq!(parse_date_locale("day-first").unwrap(), DateLocale::DayFirst);
        assert_eq!(parse_date_locale("Month_First").unwrap(), DateLocale::MonthFirst);
        assert!(parse_date_locale("iso").is_err());
    }

    #[test]
    fn test_segmenter_overrides() {
        let config = ingest_args(Some(500), None).pipeline_config().unwrap();
        assert_eq!(config.segmenter.chunk_size, 500);
        assert_eq!(config.segmenter.overlap, 200);

        assert!(ingest_args(Some(100), Some(100)).pipeline_config().is_err());
        assert_eq!(
            ingest_args(None, None).pipeline_config().unwrap(),
            PipelineConfig::default()
        );
    }

    #[test]
    fn test_residual_requires_both_flags() {
        let args = MetricsArgs {
            fund_id: 1,
            nav: Some(Decimal::from(12_000_000)),
            nav_date: None,
            breakdown: None,
        };
        assert!(args.residual_value().is_err());

        let args = MetricsArgs {
            nav_date: NaiveDate::from_ymd_opt(2024, 12, 31),
            ..args
        };
        assert_eq!(
            args.residual_value().unwrap().map(|r| r.amount),
            Some(Decimal::from(12_000_000))
        );
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "fund-ingest",
            "metrics",
            "--fund-id",
            "3",
            "--breakdown",
            "irr",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Command::Metrics(args) => {
                assert_eq!(args.fund_id, 3);
                assert_eq!(args.breakdown, Some(MetricKind::Irr));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
