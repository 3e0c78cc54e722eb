//! One batch run: fetch, normalize, score, select, enrich, assemble.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::apis::{ClinicalTrialsV1, ClinicalTrialsV2, PubMed};
use crate::app::ports::{LiteraturePort, ListQuery, PageCursor, RegistryDetailPort, RegistryListPort};
use crate::config::PipelineConfig;
use crate::domain::{SchemaVersion, TrialRecord};
use crate::error::{ConfigError, Result};
use crate::infra::http_client::HttpJsonClient;
use crate::pipeline::cancel::CancelSignal;
use crate::pipeline::literature::{collect_literature, LiteratureSummary};
use crate::pipeline::processing::enrich::{EnrichmentOutcome, Enricher};
use crate::pipeline::processing::normalize::TrialNormalizer;
use crate::pipeline::processing::quality_gate::QualityScorer;
use crate::pipeline::processing::select::Selector;
use crate::pipeline::report::{Report, ReportAssembler, ReportContext, SourceError};

/// A registry list source with its paging bounds
struct RegistrySource {
    port: Arc<dyn RegistryListPort>,
    page_size: usize,
    max_pages: usize,
}

/// Records and page failures from the list stage
#[derive(Debug, Default)]
struct Collected {
    records: Vec<TrialRecord>,
    source_errors: Vec<SourceError>,
}

pub struct Pipeline {
    config: PipelineConfig,
    selector: Selector,
    scorer: QualityScorer,
    normalizer: Arc<TrialNormalizer>,
    sources: Vec<RegistrySource>,
    detail: Arc<dyn RegistryDetailPort>,
    literature: Option<Arc<dyn LiteraturePort>>,
}

impl Pipeline {
    /// Validates the configuration up front; a bad config never reaches the network.
    pub fn new(config: PipelineConfig, detail: Arc<dyn RegistryDetailPort>) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let selector = config.selector()?;
        let scorer = QualityScorer::with_config(config.quality.clone());
        Ok(Self {
            config,
            selector,
            scorer,
            normalizer: Arc::new(TrialNormalizer::new()),
            sources: Vec::new(),
            detail,
            literature: None,
        })
    }

    pub fn with_source(mut self, port: Arc<dyn RegistryListPort>, page_size: usize, max_pages: usize) -> Self {
        self.sources.push(RegistrySource {
            port,
            page_size: page_size.max(1),
            max_pages: max_pages.max(1),
        });
        self
    }

    pub fn with_literature(mut self, port: Arc<dyn LiteraturePort>) -> Self {
        self.literature = Some(port);
        self
    }

    /// Wire the public registry and literature adapters described by `config`
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let http = HttpJsonClient::new(Duration::from_millis(config.enrichment.per_call_timeout_ms))?;

        let detail: Arc<dyn RegistryDetailPort> = match config.detail_schema()? {
            SchemaVersion::V1Fields => Arc::new(ClinicalTrialsV1::with_base_url(http.clone(), config.v1_base_url())),
            SchemaVersion::V2Structured => {
                Arc::new(ClinicalTrialsV2::with_base_url(http.clone(), config.v2_base_url()))
            }
            SchemaVersion::Pubmed => {
                return Err(ConfigError::invalid("enrichment.detail_schema", "pubmed has no trial detail lookup").into())
            }
        };

        let v1 = config.sources.v1.clone();
        let v2 = config.sources.v2.clone();
        let literature = config.literature.clone();
        let v1_url = config.v1_base_url().to_string();
        let v2_url = config.v2_base_url().to_string();

        let mut pipeline = Pipeline::new(config, detail)?;
        if v1.enabled {
            let port = Arc::new(ClinicalTrialsV1::with_base_url(http.clone(), &v1_url));
            pipeline = pipeline.with_source(port, v1.page_size, v1.max_pages);
        }
        if v2.enabled {
            let port = Arc::new(ClinicalTrialsV2::with_base_url(http.clone(), &v2_url));
            pipeline = pipeline.with_source(port, v2.page_size, v2.max_pages);
        }
        if literature.enabled {
            let port = Arc::new(PubMed::with_base_url(http, &literature.base_url, literature.api_key));
            pipeline = pipeline.with_literature(port);
        }
        Ok(pipeline)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one batch. Per-record and per-page failures are reported, never raised;
    /// the report is returned only after every selected record has an outcome.
    #[instrument(skip_all)]
    pub async fn run(&self, cancel: CancelSignal) -> Report {
        let cancel = match self.config.batch_deadline() {
            Some(deadline) => cancel.with_deadline(deadline),
            None => cancel,
        };

        let (trials, literature) = tokio::join!(self.run_trials(cancel), self.run_literature());
        let (outcomes, context) = trials;

        let assembler = ReportAssembler::new(self.config.report.headline_count, self.selector.rank_key);
        let report = assembler.assemble_with(outcomes, ReportContext { literature, ..context });

        info!(
            run_id = %report.run_id,
            total = report.summary.total,
            enriched = report.summary.enriched,
            failed = report.summary.failed,
            skipped = report.summary.skipped,
            "Pipeline run complete"
        );
        report
    }

    async fn run_trials(&self, cancel: CancelSignal) -> (Vec<EnrichmentOutcome>, ReportContext) {
        let collected = self.collect_records().await;
        info!(records = collected.records.len(), "Normalized source records");

        let scored = self.scorer.annotate(collected.records);
        let selection = self.selector.select(scored);
        info!(
            selected = selection.records.len(),
            dropped = selection.dropped_count(),
            "Selection complete"
        );
        let dropped_by_selection = selection.dropped_by_reason();

        let enricher = Enricher::new(Arc::clone(&self.detail), self.config.enrich_options())
            .with_normalizer(Arc::clone(&self.normalizer));
        let outcomes = enricher.enrich(selection, cancel).await;

        let context = ReportContext {
            dropped_by_selection,
            literature: None,
            source_errors: collected.source_errors,
        };
        (outcomes, context)
    }

    async fn collect_records(&self) -> Collected {
        let mut collected = Collected::default();

        for source in &self.sources {
            let query = ListQuery {
                expression: self.config.query.expression.clone(),
                fields: self.config.query.fields.clone(),
                page_size: source.page_size,
            };
            let mut cursor: Option<PageCursor> = None;

            for page in 1..=source.max_pages {
                let expected = source.port.schema_version();
                match source.port.fetch_page(&query, cursor.as_ref()).await {
                    Ok(list_page) if list_page.document.schema_version != expected => {
                        let reason = format!(
                            "schema mismatch: expected {}, got {}",
                            expected, list_page.document.schema_version
                        );
                        warn!(source = source.port.source_id(), page, %reason, "Source page rejected");
                        collected.source_errors.push(SourceError {
                            source_id: source.port.source_id().to_string(),
                            page,
                            reason,
                        });
                        break;
                    }
                    Ok(list_page) => {
                        let records = self.normalizer.normalize(list_page.document);
                        info!(source = source.port.source_id(), page, records = records.len(), "Fetched page");
                        collected.records.extend(records);
                        match list_page.next {
                            Some(next) => cursor = Some(next),
                            None => break,
                        }
                    }
                    Err(e) => {
                        warn!(source = source.port.source_id(), page, error = %e, "Source page failed");
                        collected.source_errors.push(SourceError {
                            source_id: source.port.source_id().to_string(),
                            page,
                            reason: e.to_string(),
                        });
                        break;
                    }
                }
            }
        }
        collected
    }

    async fn run_literature(&self) -> Option<LiteratureSummary> {
        if !self.config.literature.enabled {
            return None;
        }
        let port = self.literature.as_ref()?;
        let options = self.config.literature_options();
        Some(collect_literature(port.as_ref(), &self.config.literature.query, &options).await)
    }
}

/// Single entry point for a trigger: build adapters from `config` and run once.
///
/// Runs are independent; nothing is read from a previous run.
pub async fn run(config: PipelineConfig) -> Result<Report> {
    let pipeline = Pipeline::from_config(config)?;
    Ok(pipeline.run(CancelSignal::never()).await)
}
