use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::app::ports::{ListPage, ListQuery, PageCursor, RegistryDetailPort, RegistryListPort};
use crate::constants::{CTGOV_V2_BASE_URL, CTGOV_V2_SOURCE};
use crate::domain::{DetailDocument, SchemaVersion, SourceDocument};
use crate::error::FetchError;
use crate::infra::http_client::HttpJsonClient;

/// Current registry API (`/studies`), token-paginated
pub struct ClinicalTrialsV2 {
    http: HttpJsonClient,
    base_url: String,
}

impl ClinicalTrialsV2 {
    pub fn new(http: HttpJsonClient) -> Self {
        Self::with_base_url(http, CTGOV_V2_BASE_URL)
    }

    pub fn with_base_url(http: HttpJsonClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

pub fn list_params(query: &ListQuery, cursor: Option<&PageCursor>) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("query.term", query.expression.clone()),
        ("pageSize", query.page_size.max(1).to_string()),
        ("format", "json".to_string()),
    ];
    if !query.fields.is_empty() {
        params.push(("fields", query.fields.join(",")));
    }
    if let Some(PageCursor::Token(token)) = cursor {
        params.push(("pageToken", token.clone()));
    }
    params
}

pub fn next_token(payload: &Value) -> Option<PageCursor> {
    payload
        .get("nextPageToken")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(|t| PageCursor::Token(t.to_string()))
}

#[async_trait]
impl RegistryListPort for ClinicalTrialsV2 {
    fn source_id(&self) -> &str {
        CTGOV_V2_SOURCE
    }

    fn schema_version(&self) -> SchemaVersion {
        SchemaVersion::V2Structured
    }

    #[instrument(skip(self, query), fields(source = CTGOV_V2_SOURCE))]
    async fn fetch_page(
        &self,
        query: &ListQuery,
        cursor: Option<&PageCursor>,
    ) -> Result<ListPage, FetchError> {
        let url = format!("{}/studies", self.base_url);
        let payload = self.http.get_json(&url, &list_params(query, cursor)).await?;
        let next = next_token(&payload);
        debug!(has_next = next.is_some(), "Fetched studies page");
        Ok(ListPage {
            document: SourceDocument::new(self.schema_version(), CTGOV_V2_SOURCE, payload),
            next,
        })
    }
}

#[async_trait]
impl RegistryDetailPort for ClinicalTrialsV2 {
    async fn fetch_detail(&self, id: &str) -> Result<DetailDocument, FetchError> {
        let url = format!("{}/studies/{}", self.base_url, id);
        let payload = self
            .http
            .get_json(&url, &[("format", "json".to_string())])
            .await?;
        Ok(DetailDocument {
            schema_version: SchemaVersion::V2Structured,
            payload,
        })
    }
}
