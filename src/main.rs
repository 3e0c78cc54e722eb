use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use trial_collector::app::ports::ReportSinkPort;
use trial_collector::config::{PipelineConfig, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};
use trial_collector::domain::{SchemaVersion, SourceDocument};
use trial_collector::infra::{ConsoleSink, JsonFileSink};
use trial_collector::logging;
use trial_collector::pipeline::processing::normalize::TrialNormalizer;
use trial_collector::pipeline::processing::quality_gate::QualityScorer;
use trial_collector::pipeline::{CancelSignal, Pipeline};

#[derive(Parser)]
#[command(name = "trial_collector")]
#[command(about = "Clinical-trial registry collector and enrichment pipeline")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $TRIAL_COLLECTOR_CONFIG, then config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one batch: fetch, select, enrich and report
    Run {
        /// Registry query expression
        #[arg(long)]
        query: Option<String>,
        /// Maximum number of selected trials
        #[arg(long)]
        limit: Option<usize>,
        /// Simultaneous detail lookups
        #[arg(long)]
        concurrency: Option<usize>,
        /// Selection predicate, e.g. "hasResults AND enrollmentCount > 100"
        #[arg(long)]
        predicate: Option<String>,
        /// Directory for the JSON report
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Cancel outstanding detail lookups after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,
        /// Skip the literature search
        #[arg(long)]
        no_literature: bool,
    },
    /// Validate the configuration and print the effective settings
    CheckConfig,
    /// Normalize a saved raw registry response and print canonical records
    Normalize {
        /// JSON file holding one raw list response
        file: PathBuf,
        /// Schema of the saved response
        #[arg(long, default_value = "v2_structured")]
        schema: String,
    },
}

fn config_path(cli_path: Option<PathBuf>) -> PathBuf {
    cli_path
        .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// A missing default config file means "use defaults"; an explicit one must exist.
fn load_config(cli_path: Option<PathBuf>) -> Result<PipelineConfig> {
    let explicit = cli_path.is_some() || std::env::var(CONFIG_PATH_ENV).is_ok();
    let path = config_path(cli_path);
    let config = if path.exists() || explicit {
        PipelineConfig::load(&path).with_context(|| format!("loading {}", path.display()))?
    } else {
        warn!(path = %path.display(), "Config file not found, using defaults");
        PipelineConfig::default()
    };
    Ok(config.apply_env())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let _guard = logging::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            query,
            limit,
            concurrency,
            predicate,
            output_dir,
            deadline_secs,
            no_literature,
        } => {
            let mut config = load_config(cli.config)?;
            if let Some(query) = query {
                config.query.expression = query;
            }
            if let Some(limit) = limit {
                config.selection.limit = limit;
            }
            if let Some(concurrency) = concurrency {
                config.enrichment.concurrency_limit = concurrency;
            }
            if let Some(predicate) = predicate {
                config.selection.predicate = predicate;
            }
            if let Some(dir) = output_dir {
                config.report.output_dir = dir;
            }
            if deadline_secs.is_some() {
                config.report.batch_deadline_secs = deadline_secs;
            }
            if no_literature {
                config.literature.enabled = false;
            }

            let output_dir = config.report.output_dir.clone();
            let pipeline = Pipeline::from_config(config).context("invalid configuration")?;

            println!("🚀 Running trial collection...");
            let (handle, signal) = CancelSignal::new();
            let ctrl_c = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, cancelling outstanding lookups");
                    handle.cancel();
                }
            });
            let report = pipeline.run(signal).await;
            ctrl_c.abort();

            let sinks: Vec<Box<dyn ReportSinkPort>> =
                vec![Box::new(JsonFileSink::new(output_dir)), Box::new(ConsoleSink)];
            for sink in &sinks {
                if let Err(e) = sink.publish(&report).await {
                    error!(sink = sink.name(), error = %e, "Failed to publish report");
                    println!("❌ {} sink failed: {}", sink.name(), e);
                }
            }
            info!(run_id = %report.run_id, "Done");
        }
        Commands::CheckConfig => {
            let config = load_config(cli.config)?;
            match config.validate() {
                Ok(()) => {
                    println!("✅ Configuration is valid\n");
                    println!("{}", toml::to_string_pretty(&config)?);
                }
                Err(e) => {
                    println!("❌ {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::Normalize { file, schema } => {
            let schema: SchemaVersion = schema.parse()?;
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let payload: serde_json::Value = serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", file.display()))?;

            let config = load_config(cli.config)?;
            let scorer = QualityScorer::with_config(config.quality);
            let records = scorer.annotate(TrialNormalizer::new().normalize(SourceDocument::new(
                schema,
                "file",
                payload,
            )));

            println!("🔄 Normalized {} records from {}", records.len(), file.display());
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }
    Ok(())
}
