use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, FormatAlign, Workbook, Worksheet, XlsxError};
use tracing::info;

use crate::error::Result;
use crate::report::{resolve_output_path, SUMMARY_HEADERS};
use crate::types::{SummaryRecord, MISSING_FIELD};

pub const SUMMARY_XLSX_NAME: &str = "summary_all_documents.xlsx";

const SHEET_NAME: &str = "Summary";
const TOTAL_AMOUNT_COL: usize = 3;

/// Drop control characters that corrupt the sheet XML. Tab, newline and CR are kept.
fn sanitize_cell(s: &str) -> String {
    s.chars()
        .filter(|&c| {
            let u = c as u32;
            c == '\t' || c == '\n' || c == '\r' || !(u < 0x20 || u == 0x7F || u == 0xFFFE || u == 0xFFFF)
        })
        .collect()
}

fn write_text_cell_safe(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    text: &str,
    format: &Format,
) -> std::result::Result<(), XlsxError> {
    worksheet
        .write_string_with_format(row, col, sanitize_cell(text), format)
        .map(|_| ())
}

/// Parse "1,234.50", "1.234,50" and "12,50" style amounts.
/// `None` for the placeholder, anything non-numeric or non-finite.
pub fn parse_amount(value: &str) -> Option<f64> {
    let compact: String = value.trim().chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() || compact == MISSING_FIELD {
        return None;
    }
    if !compact
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-' | '+'))
    {
        return None;
    }
    let commas = compact.matches(',').count();
    let dots = compact.matches('.').count();
    let normalized = match (commas, dots) {
        (0, 0) | (0, 1) => compact,
        // The separator that comes last is the decimal mark.
        (_, _) if commas > 0 && dots > 0 => {
            if compact.rfind(',') > compact.rfind('.') {
                compact.replace('.', "").replace(',', ".")
            } else {
                compact.replace(',', "")
            }
        }
        (1, 0) => compact.replace(',', "."),
        // Repeated separators of one kind group thousands.
        (_, 0) => compact.replace(',', ""),
        _ => compact.replace('.', ""),
    };
    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Write the amount as a number when it parses, otherwise as text.
fn write_amount_cell_safe(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &str,
    number_format: &Format,
    text_format: &Format,
) -> std::result::Result<(), XlsxError> {
    match parse_amount(value) {
        Some(num) => worksheet
            .write_number_with_format(row, col, num, number_format)
            .map(|_| ()),
        None => write_text_cell_safe(worksheet, row, col, value, text_format),
    }
}

/// Character count × 1.2, clamped to 10–50.
fn estimate_text_width(text: &str) -> f64 {
    (text.chars().count() as f64 * 1.2).clamp(10.0, 50.0)
}

fn row_values(record: &SummaryRecord) -> [&str; 6] {
    [
        record.file_name.as_str(),
        record.document_type.label(),
        record.primary_entity.as_str(),
        record.total_amount.as_str(),
        record.currency.as_str(),
        record.comment.as_deref().unwrap_or(""),
    ]
}

fn column_widths(records: &[SummaryRecord]) -> Vec<f64> {
    let mut widths: Vec<f64> = SUMMARY_HEADERS.iter().map(|h| estimate_text_width(h)).collect();
    for record in records {
        for (col, value) in row_values(record).iter().enumerate() {
            widths[col] = widths[col].max(estimate_text_width(value));
        }
    }
    widths[TOTAL_AMOUNT_COL] = 14.0;
    widths
}

/// Build the summary workbook in memory.
pub fn summary_workbook(records: &[SummaryRecord]) -> std::result::Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let header_format = Format::new()
        .set_bold()
        .set_background_color(rust_xlsxwriter::Color::RGB(0x2563EB))
        .set_font_color(rust_xlsxwriter::Color::RGB(0xFFFFFF));
    let text_format = Format::new().set_text_wrap();
    let amount_format = Format::new()
        .set_num_format("#,##0.00")
        .set_align(FormatAlign::Right);

    for (col, width) in column_widths(records).into_iter().enumerate() {
        worksheet.set_column_width(col as u16, width)?;
    }
    for (col, header) in SUMMARY_HEADERS.iter().enumerate() {
        write_text_cell_safe(worksheet, 0, col as u16, header, &header_format)?;
    }

    for (idx, record) in records.iter().enumerate() {
        let row = (idx + 1) as u32;
        for (col, value) in row_values(record).iter().enumerate() {
            if col == TOTAL_AMOUNT_COL {
                write_amount_cell_safe(worksheet, row, col as u16, value, &amount_format, &text_format)?;
            } else {
                write_text_cell_safe(worksheet, row, col as u16, value, &text_format)?;
            }
        }
    }
    worksheet.set_freeze_panes(1, 0)?;
    Ok(workbook)
}

/// Save the summary table as `.xlsx`. Returns the written path.
pub fn write_summary_xlsx(records: &[SummaryRecord], path_override: Option<&Path>) -> Result<PathBuf> {
    let mut path = resolve_output_path(path_override, SUMMARY_XLSX_NAME)?;
    if path.extension().and_then(|e| e.to_str()) != Some("xlsx") {
        path.set_extension("xlsx");
    }
    let mut workbook = summary_workbook(records)?;
    workbook.save(&path)?;
    info!(path = %path.display(), rows = records.len(), "wrote summary workbook");
    Ok(path)
}
