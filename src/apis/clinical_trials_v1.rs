use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::app::ports::{ListPage, ListQuery, PageCursor, RegistryDetailPort, RegistryListPort};
use crate::constants::{CTGOV_V1_BASE_URL, CTGOV_V1_SOURCE, V1_LIST_FIELDS};
use crate::domain::{DetailDocument, SchemaVersion, SourceDocument};
use crate::error::FetchError;
use crate::infra::http_client::HttpJsonClient;

/// Legacy registry API (`study_fields` and `full_studies`), rank-paginated
pub struct ClinicalTrialsV1 {
    http: HttpJsonClient,
    base_url: String,
}

impl ClinicalTrialsV1 {
    pub fn new(http: HttpJsonClient) -> Self {
        Self::with_base_url(http, CTGOV_V1_BASE_URL)
    }

    pub fn with_base_url(http: HttpJsonClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Query parameters for one `study_fields` page
pub fn list_params(query: &ListQuery, cursor: Option<&PageCursor>) -> Vec<(&'static str, String)> {
    let min_rnk = match cursor {
        Some(PageCursor::Rank(rank)) => *rank,
        _ => 1,
    };
    let max_rnk = min_rnk + query.page_size.max(1) - 1;
    let fields = if query.fields.is_empty() {
        V1_LIST_FIELDS.join(",")
    } else {
        query.fields.join(",")
    };
    vec![
        ("expr", query.expression.clone()),
        ("fields", fields),
        ("min_rnk", min_rnk.to_string()),
        ("max_rnk", max_rnk.to_string()),
        ("fmt", "json".to_string()),
    ]
}

/// Next rank to request, or `None` once every found study has been returned
pub fn next_rank(payload: &Value) -> Option<PageCursor> {
    let response = payload.get("StudyFieldsResponse")?;
    let found = response.get("NStudiesFound")?.as_u64()?;
    let max_rank = response.get("MaxRank")?.as_u64()?;
    (max_rank < found).then(|| PageCursor::Rank(max_rank as usize + 1))
}

#[async_trait]
impl RegistryListPort for ClinicalTrialsV1 {
    fn source_id(&self) -> &str {
        CTGOV_V1_SOURCE
    }

    fn schema_version(&self) -> SchemaVersion {
        SchemaVersion::V1Fields
    }

    #[instrument(skip(self, query), fields(source = CTGOV_V1_SOURCE))]
    async fn fetch_page(
        &self,
        query: &ListQuery,
        cursor: Option<&PageCursor>,
    ) -> Result<ListPage, FetchError> {
        let url = format!("{}/study_fields", self.base_url);
        let payload = self.http.get_json(&url, &list_params(query, cursor)).await?;
        let next = next_rank(&payload);
        debug!(has_next = next.is_some(), "Fetched study_fields page");
        Ok(ListPage {
            document: SourceDocument::new(self.schema_version(), CTGOV_V1_SOURCE, payload),
            next,
        })
    }
}

#[async_trait]
impl RegistryDetailPort for ClinicalTrialsV1 {
    async fn fetch_detail(&self, id: &str) -> Result<DetailDocument, FetchError> {
        let url = format!("{}/full_studies", self.base_url);
        let params = [
            ("expr", format!("AREA[NCTId]{}", id)),
            ("min_rnk", "1".to_string()),
            ("max_rnk", "1".to_string()),
            ("fmt", "json".to_string()),
        ];
        let payload = self.http.get_json(&url, &params).await?;

        let returned = payload
            .pointer("/FullStudiesResponse/NStudiesReturned")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if returned == 0 {
            return Err(FetchError::permanent(format!("study {} not found", id)));
        }

        Ok(DetailDocument {
            schema_version: SchemaVersion::V1Fields,
            payload,
        })
    }
}
