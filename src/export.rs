use crate::error::PlanError;
use crate::model::{format_iso_date, AnnouncementRecord, Course};
use anyhow::Context;
use serde_json::json;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
pub const BUNDLE_FORMAT: &str = "pacing-announcements-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
}

pub fn announcement_entry_name(record: &AnnouncementRecord) -> String {
    format!("announcements/{}.txt", format_iso_date(record.date))
}

/// Writes `manifest.json` plus one text file per announcement.
pub fn export_announcements(
    course: &Course,
    records: &[AnnouncementRecord],
    out_path: &Path,
) -> Result<ExportSummary, PlanError> {
    write_bundle(course, records, out_path).map_err(|e| PlanError::Export(format!("{e:#}")))
}

fn write_bundle(
    course: &Course,
    records: &[AnnouncementRecord],
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }
    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let entries: Vec<_> = records
        .iter()
        .map(|r| {
            json!({
                "path": announcement_entry_name(r),
                "classDate": format_iso_date(r.date),
                "sha256": r.content_sha256,
                "updatedAt": r.updated_at,
            })
        })
        .collect();
    let manifest = json!({
        "format": BUNDLE_FORMAT,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": crate::store::now_ts(),
        "course": {
            "id": course.id,
            "title": course.title,
            "className": course.class_name,
        },
        "entries": entries,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    for record in records {
        let name = announcement_entry_name(record);
        zip.start_file(name.as_str(), opts)
            .with_context(|| format!("failed to start entry {}", name))?;
        zip.write_all(record.content.as_bytes())
            .with_context(|| format!("failed to write entry {}", name))?;
    }

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT.to_string(),
        entry_count: records.len() + 1,
    })
}
