use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    CTGOV_V1_BASE_URL, CTGOV_V2_BASE_URL, DEFAULT_PAGE_SIZE, DEFAULT_QUERY_EXPRESSION,
    DEFAULT_SELECTION_LIMIT, PUBMED_BASE_URL,
};
use crate::domain::SchemaVersion;
use crate::error::ConfigError;
use crate::pipeline::literature::LiteratureOptions;
use crate::pipeline::processing::enrich::EnrichOptions;
use crate::pipeline::processing::quality_gate::QualityConfig;
use crate::pipeline::processing::select::{Predicate, RankKey, Selector};
use crate::pipeline::report::DEFAULT_HEADLINE_COUNT;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const CONFIG_PATH_ENV: &str = "TRIAL_COLLECTOR_CONFIG";
pub const NCBI_API_KEY_ENV: &str = "NCBI_API_KEY";

/// Upper bounds accepted by `validate`
pub const MAX_CONCURRENCY_LIMIT: usize = 256;
pub const MAX_PER_CALL_TIMEOUT_MS: u64 = 60 * 60 * 1000;
pub const MAX_BATCH_DEADLINE_SECS: u64 = 7 * 24 * 60 * 60;

/// Everything one pipeline run needs. Every section has defaults, so an
/// empty file is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub query: QueryConfig,
    pub sources: SourcesConfig,
    pub quality: QualityConfig,
    pub selection: SelectionConfig,
    pub enrichment: EnrichmentConfig,
    pub literature: LiteratureConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub expression: String,
    /// Requested list fields; empty means the adapter's default field list
    pub fields: Vec<String>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            expression: DEFAULT_QUERY_EXPRESSION.to_string(),
            fields: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub v1: SourceConfig,
    pub v2: SourceConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            v1: SourceConfig {
                enabled: false,
                ..SourceConfig::default()
            },
            v2: SourceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub enabled: bool,
    /// Overrides the public registry endpoint
    pub base_url: Option<String>,
    pub page_size: usize,
    pub max_pages: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: None,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Predicate expression, e.g. `hasResults AND enrollmentCount > 100`
    pub predicate: String,
    pub rank_key: String,
    pub limit: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            predicate: String::new(),
            rank_key: "enrollment_count".to_string(),
            limit: DEFAULT_SELECTION_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub concurrency_limit: usize,
    pub per_call_timeout_ms: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub detail_schema: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 3,
            per_call_timeout_ms: 15_000,
            max_retries: 2,
            backoff_base_ms: 500,
            backoff_max_ms: 8_000,
            detail_schema: SchemaVersion::V2Structured.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiteratureConfig {
    pub enabled: bool,
    pub query: String,
    pub max_ids: usize,
    /// Pause between summary lookups
    pub request_interval_ms: u64,
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for LiteratureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            query: String::new(),
            max_ids: 20,
            request_interval_ms: 340,
            base_url: PUBMED_BASE_URL.to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub headline_count: usize,
    pub output_dir: PathBuf,
    /// Cancels outstanding detail lookups once the batch has run this long
    pub batch_deadline_secs: Option<u64>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            headline_count: DEFAULT_HEADLINE_COUNT,
            output_dir: PathBuf::from("reports"),
            batch_deadline_secs: None,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Toml(e.to_string()))
    }

    /// Fill the literature API key from the environment when the file has none
    pub fn apply_env(mut self) -> Self {
        if self.literature.api_key.is_none() {
            self.literature.api_key = std::env::var(NCBI_API_KEY_ENV)
                .ok()
                .filter(|k| !k.trim().is_empty());
        }
        self
    }

    /// Reject anything that would make the run meaningless. Called before any fetch.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query.expression.trim().is_empty() {
            return Err(ConfigError::invalid("query.expression", "must not be empty"));
        }
        if !self.sources.v1.enabled && !self.sources.v2.enabled {
            return Err(ConfigError::invalid("sources", "at least one source must be enabled"));
        }
        for (name, source) in [("sources.v1", &self.sources.v1), ("sources.v2", &self.sources.v2)] {
            if !source.enabled {
                continue;
            }
            if source.page_size == 0 {
                return Err(ConfigError::invalid(name, "page_size must be at least 1"));
            }
            if source.max_pages == 0 {
                return Err(ConfigError::invalid(name, "max_pages must be at least 1"));
            }
        }
        if self.selection.limit == 0 {
            return Err(ConfigError::invalid("selection.limit", "must be at least 1"));
        }
        if self.enrichment.concurrency_limit == 0 {
            return Err(ConfigError::invalid("enrichment.concurrency_limit", "must be at least 1"));
        }
        if self.enrichment.concurrency_limit > MAX_CONCURRENCY_LIMIT {
            return Err(ConfigError::invalid(
                "enrichment.concurrency_limit",
                format!("must be at most {}", MAX_CONCURRENCY_LIMIT),
            ));
        }
        if self.enrichment.per_call_timeout_ms == 0 {
            return Err(ConfigError::invalid("enrichment.per_call_timeout_ms", "must be positive"));
        }
        if self.enrichment.per_call_timeout_ms > MAX_PER_CALL_TIMEOUT_MS {
            return Err(ConfigError::invalid(
                "enrichment.per_call_timeout_ms",
                format!("must be at most {}", MAX_PER_CALL_TIMEOUT_MS),
            ));
        }
        if self.enrichment.backoff_max_ms < self.enrichment.backoff_base_ms {
            return Err(ConfigError::invalid(
                "enrichment.backoff_max_ms",
                "must not be below backoff_base_ms",
            ));
        }
        if self.detail_schema()? == SchemaVersion::Pubmed {
            return Err(ConfigError::invalid(
                "enrichment.detail_schema",
                "pubmed has no trial detail lookup",
            ));
        }
        if self.literature.enabled && self.literature.query.trim().is_empty() {
            return Err(ConfigError::invalid("literature.query", "must not be empty when enabled"));
        }
        match self.report.batch_deadline_secs {
            Some(0) => {
                return Err(ConfigError::invalid("report.batch_deadline_secs", "must be positive"));
            }
            Some(secs) if secs > MAX_BATCH_DEADLINE_SECS => {
                return Err(ConfigError::invalid(
                    "report.batch_deadline_secs",
                    format!("must be at most {}", MAX_BATCH_DEADLINE_SECS),
                ));
            }
            _ => {}
        }
        self.predicate()?;
        self.rank_key()?;
        Ok(())
    }

    pub fn predicate(&self) -> Result<Predicate, ConfigError> {
        Predicate::parse(&self.selection.predicate)
    }

    pub fn rank_key(&self) -> Result<RankKey, ConfigError> {
        self.selection.rank_key.parse()
    }

    pub fn detail_schema(&self) -> Result<SchemaVersion, ConfigError> {
        self.enrichment.detail_schema.parse()
    }

    pub fn selector(&self) -> Result<Selector, ConfigError> {
        Ok(Selector::new(self.predicate()?, self.rank_key()?, self.selection.limit))
    }

    pub fn enrich_options(&self) -> EnrichOptions {
        let e = &self.enrichment;
        EnrichOptions {
            concurrency_limit: e.concurrency_limit,
            per_call_timeout: Duration::from_millis(e.per_call_timeout_ms),
            max_retries: e.max_retries,
            backoff_base: Duration::from_millis(e.backoff_base_ms),
            backoff_max: Duration::from_millis(e.backoff_max_ms),
        }
    }

    pub fn literature_options(&self) -> LiteratureOptions {
        LiteratureOptions {
            max_ids: self.literature.max_ids,
            request_interval: Duration::from_millis(self.literature.request_interval_ms),
            backoff: self.enrich_options(),
        }
    }

    pub fn v1_base_url(&self) -> &str {
        self.sources.v1.base_url.as_deref().unwrap_or(CTGOV_V1_BASE_URL)
    }

    pub fn v2_base_url(&self) -> &str {
        self.sources.v2.base_url.as_deref().unwrap_or(CTGOV_V2_BASE_URL)
    }

    pub fn batch_deadline(&self) -> Option<Duration> {
        self.report.batch_deadline_secs.map(Duration::from_secs)
    }
}
