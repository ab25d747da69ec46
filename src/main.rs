use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use video_analysis_checker::auth::{self, ProbeOutcome};
use video_analysis_checker::classify::CompletenessRule;
use video_analysis_checker::config::AppConfig;
use video_analysis_checker::gemini::GeminiClient;
use video_analysis_checker::logging::{init_logging, OperationTimer};
use video_analysis_checker::metrics::MetricsCollector;
use video_analysis_checker::models::{OutputFormat, RecordSource};
use video_analysis_checker::reanalysis::ReanalysisRunner;
use video_analysis_checker::report;
use video_analysis_checker::repository::{RestRepository, VideoRepository};
use video_analysis_checker::rest::RestClient;
use video_analysis_checker::service::{AuditOutcome, AuditService};
use video_analysis_checker::utils::{key_preview, mime_type_for_path};
use video_analysis_checker::validation::InputValidator;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every video by analysis completeness and print a report
    Check(CheckArgs),
    /// Verify credentials and count rows in the audited tables
    TestConnection {
        /// Record source to test
        #[arg(long, value_enum)]
        source: Option<RecordSource>,
    },
    /// Decode the service key and find which auth headers the backend accepts
    DebugAuth,
    /// Upload a video to the file API and request an analysis
    Upload {
        /// Path to the video file
        file: PathBuf,

        /// Prompt sent along with the video
        #[arg(long)]
        prompt: Option<String>,

        /// Model used for the analysis
        #[arg(long)]
        model: Option<String>,

        /// Upload chunk size in MB
        #[arg(long)]
        chunk_mb: Option<u64>,
    },
    /// Print the effective configuration with secrets masked
    ShowConfig,
}

#[derive(Args)]
struct CheckArgs {
    /// Show per-video details for every bucket needing attention
    #[arg(short, long)]
    detailed: bool,

    /// Re-trigger processing for videos needing attention
    #[arg(short, long)]
    reanalyze: bool,

    /// Where to read records from
    #[arg(long, value_enum)]
    source: Option<RecordSource>,

    /// Which payloads a completed analysis must carry
    #[arg(long, value_enum)]
    rule: Option<CompletenessRule>,

    /// Report format
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Write the report to this file (or directory) instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Seconds to wait between reanalysis triggers
    #[arg(long)]
    delay_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize logging; the guard flushes the log file on exit
    let log_file = config.logging.file_path.as_deref().map(Path::new);
    let _guard = init_logging(Some(&config.get_log_level()), log_file, config.logging.format == "json")?;

    info!("Starting video-analysis-checker");

    match cli.command {
        Commands::Check(args) => run_check(&config, args).await?,
        Commands::TestConnection { source } => {
            test_connection(&config, source.unwrap_or(config.check.source)).await?;
        },
        Commands::DebugAuth => debug_auth(&config).await?,
        Commands::Upload {
            file,
            prompt,
            model,
            chunk_mb,
        } => upload(&config, &file, prompt, model, chunk_mb).await?,
        Commands::ShowConfig => {
            let yaml = config.to_yaml()?;
            write!(std::io::stdout().lock(), "{yaml}")?;
        },
    }

    Ok(())
}

/// Build the record source selected by `source`
fn build_repository(config: &AppConfig, source: RecordSource) -> Result<Box<dyn VideoRepository>> {
    match source {
        RecordSource::Rest => {
            config.require_backend()?;
            let client = RestClient::from_config(&config.backend)?;
            Ok(Box::new(RestRepository::new(client)))
        },
        RecordSource::Sql => build_sql_repository(config),
    }
}

#[cfg(feature = "direct-sql")]
fn build_sql_repository(config: &AppConfig) -> Result<Box<dyn VideoRepository>> {
    config.require_database_url()?;
    let repository = video_analysis_checker::db::PgRepository::new(&config.database)?;
    Ok(Box::new(repository))
}

#[cfg(not(feature = "direct-sql"))]
fn build_sql_repository(_config: &AppConfig) -> Result<Box<dyn VideoRepository>> {
    Err(video_analysis_checker::CheckerError::InvalidConfig("the sql source requires building with `--features direct-sql`".into()).into())
}

/// Fetch, classify, report and optionally reanalyze
async fn run_check(config: &AppConfig, args: CheckArgs) -> Result<()> {
    let timer = OperationTimer::new("check");
    let source = args.source.unwrap_or(config.check.source);
    let rule = args.rule.unwrap_or(config.check.completeness_rule);
    let format = args.format.unwrap_or(config.check.default_format);

    let repository = build_repository(config, source)?;
    let mut service = AuditService::new(repository, rule);

    info!("Analyzing video status...");
    let buckets = match service.run().await.context("Audit aborted")? {
        AuditOutcome::NoVideos => {
            report::write_no_videos(&mut std::io::stdout().lock())?;
            return Ok(());
        },
        AuditOutcome::Classified(buckets) => buckets,
    };

    if let Some(path) = &args.output {
        let written = report::write_report_to_file(&buckets, format, path, args.detailed)?;
        info!("Report written to {}", written.display());
    } else {
        report::write_report(&mut std::io::stdout().lock(), &buckets, format, args.detailed)?;
    }

    if args.reanalyze {
        let mut reanalysis = config.reanalysis.clone();
        if let Some(delay) = args.delay_secs {
            InputValidator::validate_delay_secs(delay)?;
            reanalysis.delay_secs = delay;
        }

        let runner = ReanalysisRunner::from_config(&reanalysis)?;
        let candidates = buckets.reanalysis_candidates();
        let summary = service.reanalyze(&runner, &candidates).await;
        // With --output the report is in a file and stdout only carries the summary.
        let stdout_format = if args.output.is_some() { OutputFormat::Txt } else { format };
        report::write_batch_summary(
            &mut std::io::stdout().lock(),
            &mut std::io::stderr().lock(),
            stdout_format,
            &summary,
        )?;
    }

    service.metrics().log_summary();
    timer.finish();
    Ok(())
}

async fn test_connection(config: &AppConfig, source: RecordSource) -> Result<()> {
    let repository = build_repository(config, source)?;
    let service = AuditService::new(repository, config.check.completeness_rule);

    service
        .repository()
        .test_connection()
        .await
        .context("Connection test failed")?;
    let counts = service.table_counts().await?;

    let mut out = std::io::stdout().lock();
    writeln!(out, "Connection successful ({})", service.repository().name())?;
    for (table, count) in counts {
        let count = count.map_or_else(|| "unknown".to_string(), |c| c.to_string());
        writeln!(out, "{table}: {count} rows")?;
    }
    Ok(())
}

async fn debug_auth(config: &AppConfig) -> Result<()> {
    let (url, key) = config.require_backend()?;
    let mut out = std::io::stdout().lock();

    writeln!(out, "URL: {url}")?;
    writeln!(out, "Key length: {}", key.chars().count())?;
    writeln!(out, "Key preview: {}", key_preview(key, 20, 10))?;
    writeln!(out, "Looks like a JWT: {}", key.starts_with("eyJ"))?;

    let report = auth::debug_auth(url, key, Duration::from_secs(config.backend.connect_timeout_secs)).await?;

    match &report.claims {
        Some(claims) => {
            for field in ["role", "iss", "ref"] {
                if let Some(value) = claims.get(field).and_then(Value::as_str) {
                    writeln!(out, "JWT {field}: {value}")?;
                }
            }
            if let Some(exp) = claims.get("exp").and_then(Value::as_i64) {
                let expires = chrono::DateTime::from_timestamp(exp, 0)
                    .map_or_else(|| exp.to_string(), |t| t.to_rfc3339());
                writeln!(out, "JWT expires: {expires}")?;
            }
        },
        None => writeln!(out, "Could not decode JWT payload")?,
    }

    writeln!(out)?;
    for probe in &report.probes {
        writeln!(out, "{}: {}", probe.method.describe(), describe_outcome(&probe.outcome))?;
    }

    if let Some(method) = report.working_method() {
        writeln!(out)?;
        writeln!(out, "Working method: {}", method.describe())?;
        for (table, outcome) in &report.tables {
            writeln!(out, "  {table}: {}", describe_outcome(outcome))?;
        }
    } else {
        warn!("No authentication method worked");
        writeln!(out)?;
        writeln!(out, "No authentication method worked. Check that:")?;
        writeln!(out, "  - the key is the service_role key, not the anon key")?;
        writeln!(out, "  - the key was copied without extra characters")?;
        writeln!(out, "  - the key belongs to the project at {url}")?;
    }
    Ok(())
}

fn describe_outcome(outcome: &ProbeOutcome) -> String {
    match outcome {
        ProbeOutcome::Success(rows) => format!("ok ({rows} rows)"),
        ProbeOutcome::Unauthorized => "unauthorized".to_string(),
        ProbeOutcome::NotFound => "not found".to_string(),
        ProbeOutcome::Error(message) => format!("error: {message}"),
    }
}

async fn upload(
    config: &AppConfig, file: &Path, prompt: Option<String>, model: Option<String>, chunk_mb: Option<u64>,
) -> Result<()> {
    let mut gemini = config.gemini.clone();
    if let Some(chunk_mb) = chunk_mb {
        gemini.chunk_size_mb = chunk_mb;
    }
    config.require_gemini_key()?;

    let mut client = GeminiClient::from_config(&gemini)?;
    if let Some(model) = model {
        client = client.with_model(&model);
    }
    let mut metrics = MetricsCollector::default();

    let uploaded = client.upload_file(file, &mut metrics).await.context("Upload failed")?;
    info!(name = %uploaded.name, "Upload complete");

    info!("Waiting for processing...");
    let active = client.wait_until_active(&uploaded.name).await?;
    let uri = active
        .uri
        .as_deref()
        .ok_or_else(|| anyhow!("file {} has no URI", active.name))?;
    info!(uri, "File ready");

    let mime_type = active
        .mime_type
        .clone()
        .unwrap_or_else(|| mime_type_for_path(file).to_string());
    let prompt = prompt.unwrap_or(gemini.prompt);

    info!(model = client.model(), "Analyzing video...");
    let text = client.generate_content(uri, &mime_type, &prompt).await?;

    let mut out = std::io::stdout().lock();
    writeln!(out, "{}", "=".repeat(50))?;
    writeln!(out, "ANALYSIS RESULT:")?;
    writeln!(out, "{}", "=".repeat(50))?;
    writeln!(out, "{text}")?;

    metrics.log_summary();
    Ok(())
}
