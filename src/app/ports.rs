use async_trait::async_trait;

use crate::domain::{DetailDocument, SchemaVersion, SourceDocument};
use crate::error::FetchError;
use crate::pipeline::report::Report;

/// A registry list query: expression, requested fields and page size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub expression: String,
    pub fields: Vec<String>,
    pub page_size: usize,
}

/// Where the next page starts. Registry schemas paginate differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// 1-based rank of the first record on the next page
    Rank(usize),
    /// Opaque token returned by the previous page
    Token(String),
}

#[derive(Debug, Clone)]
pub struct ListPage {
    pub document: SourceDocument,
    pub next: Option<PageCursor>,
}

/// Registry list query. Each page is one source document.
#[async_trait]
pub trait RegistryListPort: Send + Sync {
    fn source_id(&self) -> &str;

    fn schema_version(&self) -> SchemaVersion;

    async fn fetch_page(
        &self,
        query: &ListQuery,
        cursor: Option<&PageCursor>,
    ) -> Result<ListPage, FetchError>;
}

/// Per-trial detail lookup (protocol and results sections)
#[async_trait]
pub trait RegistryDetailPort: Send + Sync {
    async fn fetch_detail(&self, id: &str) -> Result<DetailDocument, FetchError>;
}

/// Literature search and per-article summary lookup
#[async_trait]
pub trait LiteraturePort: Send + Sync {
    /// Search document carrying the ordered list of matching identifiers
    async fn search(&self, query: &str, max_ids: usize) -> Result<SourceDocument, FetchError>;

    /// Summary document for one identifier
    async fn fetch_summary(&self, id: &str) -> Result<SourceDocument, FetchError>;
}

/// Destination for a finished report (file, console, spreadsheet, email)
#[async_trait]
pub trait ReportSinkPort: Send + Sync {
    fn name(&self) -> &str;

    async fn publish(&self, report: &Report) -> Result<(), String>;
}
