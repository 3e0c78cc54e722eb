use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::app::ports::ReportSinkPort;
use crate::pipeline::report::Report;

/// Writes the report's ordered mapping as pretty JSON, one file per run
pub struct JsonFileSink {
    output_dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `report_<timestamp>_<run id prefix>.json`; runs in the same second get distinct files
    pub fn file_path(&self, report: &Report) -> PathBuf {
        let run_id = report.run_id.simple().to_string();
        self.output_dir.join(format!(
            "report_{}_{}.json",
            report.generated_at.format("%Y%m%d_%H%M%S"),
            &run_id[..8]
        ))
    }
}

#[async_trait]
impl ReportSinkPort for JsonFileSink {
    fn name(&self) -> &str {
        "json_file"
    }

    async fn publish(&self, report: &Report) -> Result<(), String> {
        let map = report.to_ordered_map().map_err(|e| e.to_string())?;
        let body = serde_json::to_vec_pretty(&map).map_err(|e| e.to_string())?;

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| format!("Failed to create {}: {}", self.output_dir.display(), e))?;
        let path = self.file_path(report);
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;

        info!(path = %path.display(), "Report written");
        Ok(())
    }
}

/// Human-readable run summary on stdout
#[derive(Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn render(report: &Report) -> String {
        let s = &report.summary;
        let mut out = String::new();
        out.push_str(&format!("📋 Run {}\n", report.run_id));
        out.push_str(&format!(
            "✅ {} of {} trials enriched ({} with outcome data)\n",
            s.with_detail, s.total, s.with_outcome_data
        ));
        out.push_str(&format!("📊 Average enrollment: {:.1}\n", s.average_enrollment));
        if !s.phases.is_empty() {
            let phases: Vec<&str> = s.phases.iter().map(String::as_str).collect();
            out.push_str(&format!("🧪 Phases: {}\n", phases.join(", ")));
        }
        for issue in &s.failures {
            out.push_str(&format!("❌ {}: {}\n", issue.id, issue.reason));
        }
        for issue in &s.skipped_records {
            out.push_str(&format!("⏭️  {}: {}\n", issue.id, issue.reason));
        }
        for error in &report.source_errors {
            out.push_str(&format!(
                "⚠️  {} page {}: {}\n",
                error.source_id, error.page, error.reason
            ));
        }
        if let Some(lit) = &s.literature {
            out.push_str(&format!(
                "📚 Literature '{}': {} ids, {} summaries\n",
                lit.query,
                lit.total_ids,
                lit.articles.len()
            ));
        }
        if !report.headline.is_empty() {
            out.push_str("🏆 Top trials:\n");
            for id in &report.headline {
                let title = report
                    .entry(id)
                    .and_then(|e| e.record.title.as_deref())
                    .unwrap_or("(untitled)");
                out.push_str(&format!("   {} {}\n", id, title));
            }
        }
        out
    }
}

#[async_trait]
impl ReportSinkPort for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    async fn publish(&self, report: &Report) -> Result<(), String> {
        print!("{}", Self::render(report));
        Ok(())
    }
}
