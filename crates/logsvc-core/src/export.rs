//! Export of retrieved lines to files under `<data_dir>/exports`.

use chrono::{DateTime, Utc};
use logsvc_common::{Error, ExportFormat, LogLine, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// File name prefix of every export.
pub const EXPORT_PREFIX: &str = "logservice_export_";

/// Render lines in `format`.
///
/// - text: `"<ts> <line>"` per line, joined by newlines, no trailing newline
/// - markdown: the text body inside a fenced code block
/// - json: pretty-printed array of line objects
pub fn render(format: ExportFormat, lines: &[LogLine]) -> Result<String> {
    let text_body = || {
        lines
            .iter()
            .map(|l| format!("{} {}", l.ts, l.line))
            .collect::<Vec<_>>()
            .join("\n")
    };
    match format {
        ExportFormat::Text => Ok(text_body()),
        ExportFormat::Markdown => Ok(format!("```\n{}\n```\n", text_body())),
        ExportFormat::Json => Ok(serde_json::to_string_pretty(lines)?),
    }
}

/// Export file path for a write at `now`.
pub fn export_path(dir: &Path, format: ExportFormat, now: DateTime<Utc>) -> PathBuf {
    dir.join(format!(
        "{}{}.{}",
        EXPORT_PREFIX,
        now.format("%Y%m%d%H%M%S"),
        format.extension()
    ))
}

/// Write `lines` to a new export file in `dir`, creating it if needed.
///
/// Lines are written as given; redaction is the caller's concern.
pub fn write_export(
    dir: &Path,
    format: ExportFormat,
    lines: &[LogLine],
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .map_err(|e| Error::Export(format!("cannot create {}: {}", dir.display(), e)))?;

    let path = export_path(dir, format, now);
    let content = render(format, lines)?;
    std::fs::write(&path, content)
        .map_err(|e| Error::Export(format!("cannot write {}: {}", path.display(), e)))?;

    info!(path = %path.display(), format = %format, lines = lines.len(), "export written");
    Ok(path)
}
