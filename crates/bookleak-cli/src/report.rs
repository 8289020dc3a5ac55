//! Report files: JSON for the whole run, Parquet for the ranked mistakes.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use bookleak_analysis::RunReport;
use bookleak_core::schema::groups_to_batch;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Serialize)]
struct JsonReport<'a> {
    player: &'a str,
    generated_at: DateTime<Utc>,
    depth: u32,
    #[serde(flatten)]
    report: &'a RunReport,
}

pub fn write_json(
    path: &Path,
    player: &str,
    depth: u32,
    report: &RunReport,
) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let doc = JsonReport {
        player,
        generated_at: Utc::now(),
        depth,
        report,
    };
    serde_json::to_writer_pretty(&mut writer, &doc).context("serialising report")?;
    writer.flush().with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

pub fn write_parquet(path: &Path, report: &RunReport) -> anyhow::Result<()> {
    let batch = groups_to_batch(&report.groups).context("building report batch")?;
    bookleak_store::write_parquet(path, &batch)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
