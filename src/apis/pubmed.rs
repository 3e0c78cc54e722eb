use async_trait::async_trait;

use crate::app::ports::LiteraturePort;
use crate::constants::{PUBMED_BASE_URL, PUBMED_SOURCE};
use crate::domain::{SchemaVersion, SourceDocument};
use crate::error::FetchError;
use crate::infra::http_client::HttpJsonClient;

/// NCBI E-utilities: `esearch` for identifiers, `esummary` per article
pub struct PubMed {
    http: HttpJsonClient,
    base_url: String,
    api_key: Option<String>,
}

impl PubMed {
    pub fn new(http: HttpJsonClient, api_key: Option<String>) -> Self {
        Self::with_base_url(http, PUBMED_BASE_URL, api_key)
    }

    pub fn with_base_url(http: HttpJsonClient, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    fn with_key(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }
}

#[async_trait]
impl LiteraturePort for PubMed {
    async fn search(&self, query: &str, max_ids: usize) -> Result<SourceDocument, FetchError> {
        let url = format!("{}/esearch.fcgi", self.base_url);
        let params = self.with_key(vec![
            ("db", "pubmed".to_string()),
            ("term", query.to_string()),
            ("retmax", max_ids.to_string()),
            ("retmode", "json".to_string()),
        ]);
        let payload = self.http.get_json(&url, &params).await?;
        Ok(SourceDocument::new(SchemaVersion::Pubmed, PUBMED_SOURCE, payload))
    }

    async fn fetch_summary(&self, id: &str) -> Result<SourceDocument, FetchError> {
        let url = format!("{}/esummary.fcgi", self.base_url);
        let params = self.with_key(vec![
            ("db", "pubmed".to_string()),
            ("id", id.to_string()),
            ("retmode", "json".to_string()),
        ]);
        let payload = self.http.get_json(&url, &params).await?;
        Ok(SourceDocument::new(SchemaVersion::Pubmed, PUBMED_SOURCE, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_blank_api_key_is_ignored() {
        let http = HttpJsonClient::new(Duration::from_secs(1)).unwrap();
        let pubmed = PubMed::new(http, Some("  ".to_string()));
        let params = pubmed.with_key(vec![("db", "pubmed".to_string())]);
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_api_key_is_appended() {
        let http = HttpJsonClient::new(Duration::from_secs(1)).unwrap();
        let pubmed = PubMed::new(http, Some("secret".to_string()));
        let params = pubmed.with_key(Vec::new());
        assert_eq!(params, vec![("api_key", "secret".to_string())]);
    }
}
