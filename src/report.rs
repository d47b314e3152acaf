use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::info;

use crate::error::{AppError, Result};
use crate::results::LineItemTable;
use crate::types::{LineItem, SummaryRecord};

pub const SUMMARY_HEADERS: [&str; 6] = [
    "File Name",
    "Document Type",
    "Vendor/Source",
    "Total Amount",
    "Currency",
    "Comment",
];

pub const LINE_ITEM_HEADERS: [&str; 4] = ["Description", "Quantity", "Unit Price", "Amount"];

pub const SUMMARY_FILE_NAME: &str = "summary_all_documents.csv";

fn to_csv<T: serde::Serialize>(headers: &[&str], rows: &[T]) -> Result<String> {
    // Header written by hand so an empty table still gets one.
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(headers)?;
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Io(format!("Could not finish CSV: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Io(format!("CSV is not UTF-8: {}", e)))
}

pub fn summary_csv(records: &[SummaryRecord]) -> Result<String> {
    to_csv(&SUMMARY_HEADERS, records)
}

pub fn line_items_csv(items: &[LineItem]) -> Result<String> {
    to_csv(&LINE_ITEM_HEADERS, items)
}

/// Read a summary report back into records.
pub fn parse_summary_csv(data: &str) -> Result<Vec<SummaryRecord>> {
    let mut reader = csv::Reader::from_reader(data.as_bytes());
    let records = reader
        .deserialize()
        .collect::<std::result::Result<Vec<SummaryRecord>, csv::Error>>()?;
    Ok(records)
}

pub fn parse_line_items_csv(data: &str) -> Result<Vec<LineItem>> {
    let mut reader = csv::Reader::from_reader(data.as_bytes());
    let items = reader
        .deserialize()
        .collect::<std::result::Result<Vec<LineItem>, csv::Error>>()?;
    Ok(items)
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w.\-]+").expect("file name regex"))
}

/// `<file name>_lines.csv`, with characters unsafe for file names replaced.
pub fn line_items_file_name(source_file: &str) -> String {
    let cleaned = unsafe_chars().replace_all(source_file.trim(), "_");
    let cleaned = cleaned.trim_matches('_');
    let base = if cleaned.is_empty() { "document" } else { cleaned };
    format!("{}_lines.csv", base)
}

/// Downloads folder, then Desktop, then the working directory.
pub fn default_output_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::desktop_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `dir/file_name`, or a timestamped / numbered variant when that file already exists.
pub fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let path = Path::new(file_name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("report");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("csv");
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let mut p = dir.join(format!("{}_{}.{}", stem, stamp, ext));
    let mut counter = 2u32;
    while p.exists() {
        p = dir.join(format!("{}_{}_{}.{}", stem, stamp, counter, ext));
        counter += 1;
    }
    p
}

/// Resolve an explicit path (file or directory) or fall back to the default output folder.
pub fn resolve_output_path(path_override: Option<&Path>, default_name: &str) -> Result<PathBuf> {
    match path_override {
        Some(p) if p.is_dir() => Ok(unique_path(p, default_name)),
        Some(p) => {
            if let Some(parent) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
                if !parent.exists() {
                    return Err(AppError::Io(format!(
                        "Folder not found: {}",
                        parent.display()
                    )));
                }
            }
            Ok(p.to_path_buf())
        }
        None => {
            let dir = default_output_dir();
            fs::create_dir_all(&dir)?;
            Ok(unique_path(&dir, default_name))
        }
    }
}

pub fn write_summary_csv(records: &[SummaryRecord], path_override: Option<&Path>) -> Result<PathBuf> {
    let path = resolve_output_path(path_override, SUMMARY_FILE_NAME)?;
    fs::write(&path, summary_csv(records)?)?;
    info!(path = %path.display(), rows = records.len(), "wrote summary report");
    Ok(path)
}

pub fn write_line_items_csv(table: &LineItemTable, path_override: Option<&Path>) -> Result<PathBuf> {
    let path = resolve_output_path(path_override, &line_items_file_name(&table.file_name))?;
    fs::write(&path, line_items_csv(&table.items)?)?;
    info!(path = %path.display(), rows = table.items.len(), "wrote line items");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentType;

    fn record(name: &str, comment: Option<&str>) -> SummaryRecord {
        SummaryRecord {
            file_name: name.to_string(),
            document_type: DocumentType::HotelInvoice,
            primary_entity: "Grand Hotel, Lisbon".to_string(),
            total_amount: "310.50".to_string(),
            currency: "EUR".to_string(),
            comment: comment.map(String::from),
        }
    }

    #[test]
    fn summary_has_expected_header() {
        let csv = summary_csv(&[]).unwrap();
        assert_eq!(
            csv.trim_end(),
            "File Name,Document Type,Vendor/Source,Total Amount,Currency,Comment"
        );
        let csv = line_items_csv(&[]).unwrap();
        assert_eq!(csv.trim_end(), "Description,Quantity,Unit Price,Amount");
    }

    #[test]
    fn summary_row_quotes_commas_and_labels_type() {
        let csv = summary_csv(&[record("stay.pdf", Some("Conference \"week\""))]).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(
            row,
            "stay.pdf,Hotel Invoice,\"Grand Hotel, Lisbon\",310.50,EUR,\"Conference \"\"week\"\"\""
        );
    }

    #[test]
    fn summary_survives_export_and_parse() {
        let records = vec![record("a.pdf", Some("Team dinner")), record("b.png", None)];
        let parsed = parse_summary_csv(&summary_csv(&records).unwrap()).unwrap();
        assert_eq!(parsed, records);
    }

    #[test]
    fn line_item_file_names_are_sanitized() {
        assert_eq!(line_items_file_name("lunch.jpg"), "lunch.jpg_lines.csv");
        assert_eq!(line_items_file_name("my receipt (1).pdf"), "my_receipt_1_.pdf_lines.csv");
        assert_eq!(line_items_file_name("///"), "document_lines.csv");
    }

    #[test]
    fn unique_path_avoids_overwriting() {
        let dir = tempfile::tempdir().unwrap();
        let first = unique_path(dir.path(), SUMMARY_FILE_NAME);
        assert_eq!(first, dir.path().join(SUMMARY_FILE_NAME));
        fs::write(&first, "x").unwrap();
        let second = unique_path(dir.path(), SUMMARY_FILE_NAME);
        assert_ne!(first, second);
        assert!(second
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap()
            .starts_with("summary_all_documents_"));
    }

    #[test]
    fn writes_into_directory_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_summary_csv(&[record("a.pdf", None)], Some(dir.path())).unwrap();
        assert_eq!(path, dir.path().join(SUMMARY_FILE_NAME));
        let written = fs::read_to_string(path).unwrap();
        assert_eq!(parse_summary_csv(&written).unwrap().len(), 1);
    }
}
