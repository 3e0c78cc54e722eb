use super::LiteratureMapping;

/// E-utilities `esearch` / `esummary` JSON responses
pub static PUBMED_LITERATURE: LiteratureMapping = LiteratureMapping {
    ids: &["esearchresult.idlist"],
    error: &["esearchresult.ERROR", "error"],
    summaries: &["result"],
    title: &["title"],
    journal: &["fulljournalname", "source"],
    pub_date: &["pubdate", "epubdate"],
};
