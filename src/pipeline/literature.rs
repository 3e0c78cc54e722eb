//! Literature branch: search, identifier extraction and per-article summaries.
//!
//! Runs beside the trial pipeline and only feeds the report summary.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::app::ports::LiteraturePort;
use crate::domain::SourceDocument;
use crate::error::FetchError;
use crate::pipeline::processing::enrich::EnrichOptions;
use crate::pipeline::processing::normalize::fields::{first_string, resolve_first, string_or_default, strings};
use crate::pipeline::processing::normalize::normalizers::{LiteratureMapping, PUBMED_LITERATURE};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSummary {
    pub id: String,
    pub title: String,
    pub journal: String,
    pub pub_date: String,
}

/// Identifier whose summary lookup failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleFailure {
    pub id: String,
    pub reason: String,
}

impl ArticleFailure {
    fn new(id: String, reason: impl Into<String>) -> Self {
        Self {
            id,
            reason: reason.into(),
        }
    }
}

/// Pacing for the per-article summary lookups
#[derive(Debug, Clone, PartialEq)]
pub struct LiteratureOptions {
    pub max_ids: usize,
    /// Pause between consecutive summary lookups
    pub request_interval: Duration,
    /// A transient summary failure gets one retry after `backoff.backoff_delay(1)`
    pub backoff: EnrichOptions,
}

impl Default for LiteratureOptions {
    fn default() -> Self {
        Self {
            max_ids: 20,
            request_interval: Duration::from_millis(340),
            backoff: EnrichOptions::default(),
        }
    }
}

/// Literature counts attached to the report summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiteratureSummary {
    pub query: String,
    pub total_ids: usize,
    pub articles: Vec<ArticleSummary>,
    pub failures: Vec<ArticleFailure>,
    /// Set when the search itself failed
    pub error: Option<String>,
}

/// Ordered identifiers from a search document
pub fn extract_ids(doc: &SourceDocument, mapping: &LiteratureMapping) -> Vec<String> {
    strings(&doc.payload, mapping.ids)
}

/// Error message carried inside an otherwise successful search response
pub fn extract_error(doc: &SourceDocument, mapping: &LiteratureMapping) -> Option<String> {
    first_string(&doc.payload, mapping.error)
}

/// Article fields for `id` from a summary document
pub fn extract_article(doc: &SourceDocument, id: &str, mapping: &LiteratureMapping) -> Option<ArticleSummary> {
    let summaries = resolve_first(&doc.payload, mapping.summaries);
    let entry: &Value = summaries.first().and_then(|s| s.get(id))?;
    if !entry.is_object() {
        return None;
    }
    Some(ArticleSummary {
        id: id.to_string(),
        title: string_or_default(entry, mapping.title),
        journal: string_or_default(entry, mapping.journal),
        pub_date: string_or_default(entry, mapping.pub_date),
    })
}

async fn fetch_summary_with_retry(
    port: &dyn LiteraturePort,
    id: &str,
    options: &LiteratureOptions,
) -> Result<SourceDocument, FetchError> {
    match port.fetch_summary(id).await {
        Err(e) if e.is_transient() => {
            let delay = options.backoff.backoff_delay(1);
            debug!(id, error = %e, delay_ms = delay.as_millis() as u64, "Retrying literature summary");
            tokio::time::sleep(delay).await;
            port.fetch_summary(id).await
        }
        result => result,
    }
}

/// Search, then fetch each returned identifier's summary in order,
/// pausing `request_interval` between lookups.
///
/// Never fails: a failed search or lookup is recorded in the summary.
pub async fn collect_literature(
    port: &dyn LiteraturePort,
    query: &str,
    options: &LiteratureOptions,
) -> LiteratureSummary {
    let max_ids = options.max_ids;
    let mut summary = LiteratureSummary {
        query: query.to_string(),
        ..LiteratureSummary::default()
    };
    let mapping = &PUBMED_LITERATURE;

    let search = match port.search(query, max_ids).await {
        Ok(doc) => doc,
        Err(e) => {
            warn!(query, error = %e, "Literature search failed");
            summary.error = Some(e.to_string());
            return summary;
        }
    };
    if let Some(message) = extract_error(&search, mapping) {
        warn!(query, error = %message, "Literature search returned an error");
        summary.error = Some(message);
    }

    let ids: Vec<String> = extract_ids(&search, mapping).into_iter().take(max_ids).collect();
    summary.total_ids = ids.len();
    debug!(count = ids.len(), "Literature identifiers found");

    for (position, id) in ids.into_iter().enumerate() {
        if position > 0 && !options.request_interval.is_zero() {
            tokio::time::sleep(options.request_interval).await;
        }
        match fetch_summary_with_retry(port, &id, options).await {
            Ok(doc) => match extract_article(&doc, &id, mapping) {
                Some(article) => summary.articles.push(article),
                None => summary.failures.push(ArticleFailure::new(id, "summary missing")),
            },
            Err(e) => summary.failures.push(ArticleFailure::new(id, e.to_string())),
        }
    }

    info!(
        query,
        ids = summary.total_ids,
        articles = summary.articles.len(),
        failures = summary.failures.len(),
        "Literature search complete"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SchemaVersion;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn doc(payload: Value) -> SourceDocument {
        SourceDocument::new(SchemaVersion::Pubmed, "pubmed", payload)
    }

    struct StubLiterature;

    #[async_trait]
    impl LiteraturePort for StubLiterature {
        async fn search(&self, _query: &str, _max_ids: usize) -> Result<SourceDocument, FetchError> {
            Ok(doc(json!({"esearchresult": {"count": "3", "idlist": ["111", "222", "333"]}})))
        }

        async fn fetch_summary(&self, id: &str) -> Result<SourceDocument, FetchError> {
            if id == "222" {
                return Err(FetchError::transient("HTTP 503"));
            }
            let mut payload = json!({"result": {"uids": [id]}});
            payload["result"][id] = json!({
                "title": format!("Article {}", id),
                "fulljournalname": "The Lancet",
                "pubdate": "2021 Mar"
            });
            Ok(doc(payload))
        }
    }

    fn options(max_ids: usize) -> LiteratureOptions {
        LiteratureOptions {
            max_ids,
            request_interval: Duration::ZERO,
            backoff: EnrichOptions {
                backoff_base: Duration::from_millis(1),
                backoff_max: Duration::from_millis(1),
                ..EnrichOptions::default()
            },
        }
    }

    /// Rate-limits the first summary call for every id, then answers
    #[derive(Default)]
    struct Throttled {
        calls: Mutex<HashMap<String, u32>>,
        permanent: Option<String>,
    }

    impl Throttled {
        fn calls(&self, id: &str) -> u32 {
            *self.calls.lock().unwrap().get(id).unwrap_or(&0)
        }
    }

    #[async_trait]
    impl LiteraturePort for Throttled {
        async fn search(&self, _query: &str, _max_ids: usize) -> Result<SourceDocument, FetchError> {
            Ok(doc(json!({"esearchresult": {"idlist": ["7", "8", "9"]}})))
        }

        async fn fetch_summary(&self, id: &str) -> Result<SourceDocument, FetchError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                let count = calls.entry(id.to_string()).or_insert(0);
                *count += 1;
                *count
            };
            if self.permanent.as_deref() == Some(id) {
                return Err(FetchError::permanent("HTTP 400"));
            }
            if call == 1 {
                return Err(FetchError::transient("HTTP 429"));
            }
            let mut payload = json!({"result": {}});
            payload["result"][id] = json!({"title": format!("Article {}", id), "source": "BMJ"});
            Ok(doc(payload))
        }
    }

    #[test]
    fn test_extract_ids_in_order() {
        let search = doc(json!({"esearchresult": {"idlist": ["3", "1", "2"]}}));
        assert_eq!(extract_ids(&search, &PUBMED_LITERATURE), vec!["3", "1", "2"]);
        assert!(extract_ids(&doc(json!({})), &PUBMED_LITERATURE).is_empty());
    }

    #[test]
    fn test_extract_article_falls_back_to_source() {
        let summary = doc(json!({"result": {"42": {"title": "T", "source": "BMJ", "epubdate": "2020"}}}));
        let article = extract_article(&summary, "42", &PUBMED_LITERATURE).unwrap();
        assert_eq!(article.journal, "BMJ");
        assert_eq!(article.pub_date, "2020");
        assert!(extract_article(&summary, "43", &PUBMED_LITERATURE).is_none());
    }

    #[tokio::test]
    async fn test_collect_records_failures_without_aborting() {
        let summary = collect_literature(&StubLiterature, "metformin", &options(20)).await;
        assert_eq!(summary.total_ids, 3);
        assert_eq!(summary.articles.len(), 2);
        assert_eq!(summary.articles[0].title, "Article 111");
        assert_eq!(
            summary.failures,
            vec![ArticleFailure::new("222".to_string(), "transient: HTTP 503")]
        );
        assert!(summary.error.is_none());
    }

    #[tokio::test]
    async fn test_collect_respects_max_ids() {
        let summary = collect_literature(&StubLiterature, "metformin", &options(1)).await;
        assert_eq!(summary.total_ids, 1);
        assert_eq!(summary.articles.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_summary_failure_is_retried_once() {
        let port = Throttled {
            permanent: Some("9".to_string()),
            ..Throttled::default()
        };
        let summary = collect_literature(&port, "metformin", &options(20)).await;

        let ids: Vec<&str> = summary.articles.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["7", "8"]);
        assert_eq!(port.calls("7"), 2);
        assert_eq!(port.calls("9"), 1);
        assert_eq!(
            summary.failures,
            vec![ArticleFailure::new("9".to_string(), "permanent: HTTP 400")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_summary_lookups_are_paced() {
        let options = LiteratureOptions {
            request_interval: Duration::from_secs(1),
            ..options(20)
        };
        let start = Instant::now();
        let summary = collect_literature(&StubLiterature, "metformin", &options).await;

        assert_eq!(summary.total_ids, 3);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
