use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::upload::UploadedFile;

/// Placeholder rendered for any field the extraction service did not return.
pub const MISSING_FIELD: &str = "-";

/// User-declared category of an expense document. Selects the remote model and field schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    #[serde(rename = "Receipt")]
    Receipt,
    #[serde(rename = "Hotel Invoice")]
    HotelInvoice,
    #[serde(rename = "Utility Bill")]
    UtilityBill,
}

impl DocumentType {
    /// Display label, also used as the "Document Type" report column.
    pub fn label(self) -> &'static str {
        match self {
            DocumentType::Receipt => "Receipt",
            DocumentType::HotelInvoice => "Hotel Invoice",
            DocumentType::UtilityBill => "Utility Bill",
        }
    }

    /// Only receipts and hotel invoices carry a line-item table.
    pub fn has_line_items(self) -> bool {
        !matches!(self, DocumentType::UtilityBill)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    /// Accepts labels ("Hotel Invoice") and CLI spellings ("hotel-invoice", "hotel_invoice").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "receipt" => Ok(DocumentType::Receipt),
            "hotelinvoice" | "hotel" => Ok(DocumentType::HotelInvoice),
            "utilitybill" | "utility" | "bill" => Ok(DocumentType::UtilityBill),
            _ => Err(format!(
                "Unknown document type '{}'. Use receipt, hotel-invoice or utility-bill.",
                s.trim()
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentStatus {
    Pending,
    Done,
    Failed,
}

impl DocumentStatus {
    pub fn icon(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "⏳ Waiting",
            DocumentStatus::Done => "✅ Done",
            DocumentStatus::Failed => "❌ Error",
        }
    }
}

/// One queued expense document.
#[derive(Debug, Clone)]
pub struct DocumentEntry {
    pub file: UploadedFile,
    pub document_type: DocumentType,
    pub comment: Option<String>,
    pub status: DocumentStatus,
    /// Set when the processing loop marks the entry Failed.
    pub error: Option<String>,
}

impl DocumentEntry {
    pub fn new(file: UploadedFile, document_type: DocumentType, comment: Option<String>) -> Self {
        let comment = comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        Self {
            file,
            document_type,
            comment,
            status: DocumentStatus::Pending,
            error: None,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file.name
    }
}

/// Normalized, per-document row of the summary report. Column names match the CSV header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    #[serde(rename = "File Name")]
    pub file_name: String,
    #[serde(rename = "Document Type")]
    pub document_type: DocumentType,
    /// Vendor for receipts, hotel name for hotel invoices, bill number for utility bills.
    #[serde(rename = "Vendor/Source")]
    pub primary_entity: String,
    #[serde(rename = "Total Amount")]
    pub total_amount: String,
    #[serde(rename = "Currency")]
    pub currency: String,
    #[serde(rename = "Comment")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Quantity")]
    pub quantity: String,
    #[serde(rename = "Unit Price")]
    pub unit_price: String,
    #[serde(rename = "Amount")]
    pub amount: String,
}

/// A document that could not be processed, as reported back to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedDocument {
    pub index: usize,
    pub file_name: String,
    pub error: String,
}

/// Outcome of one analyze run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub processed: usize,
    pub failures: Vec<FailedDocument>,
    pub elapsed_ms: u128,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.processed + self.failures.len()
    }
}
