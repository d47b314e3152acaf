//! Remote document-extraction service boundary.
//!
//! The service is opaque: one begin/poll operation pair per [`DocumentType`]. A session is
//! opened per document and dropped as soon as that document's submit+poll sequence ends.

pub mod client;
pub mod fields;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::types::DocumentType;
use crate::upload::UploadedFile;

pub use client::DocumentAiClient;

/// Status value the service reports once fields are ready.
pub const STATUS_PROCESSED: &str = "Processed";
const STATUS_FAILED: &str = "Failed";

/// Model name used in request paths and as the response envelope key.
pub fn model_name(document_type: DocumentType) -> &'static str {
    match document_type {
        DocumentType::Receipt => "receipt",
        DocumentType::HotelInvoice => "hotelInvoice",
        DocumentType::UtilityBill => "utilityBill",
    }
}

fn snake_model_name(document_type: DocumentType) -> &'static str {
    match document_type {
        DocumentType::Receipt => "receipt",
        DocumentType::HotelInvoice => "hotel_invoice",
        DocumentType::UtilityBill => "utility_bill",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSource {
    pub base64_encoded_content: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginExtractionRequest {
    pub input_source: InputSource,
}

impl BeginExtractionRequest {
    pub fn for_file(file: &UploadedFile) -> Self {
        Self {
            input_source: InputSource {
                base64_encoded_content: file.to_base64(),
                name: file.name.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentHandle {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeginExtractionResponse {
    #[serde(default)]
    pub documents: Vec<DocumentHandle>,
}

impl BeginExtractionResponse {
    /// The job is identified by the first returned document handle.
    pub fn job_id(&self) -> Result<String> {
        self.documents
            .first()
            .map(|d| d.id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::InvalidResponse("No document id in response".to_string()))
    }
}

/// One poll result: current status plus whatever fields the service returned.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedDocument {
    pub status: String,
    pub fields: Map<String, Value>,
}

impl ExtractedDocument {
    /// Unwrap `{ "<model>": { "meta": { "status" }, "fields": { .. } } }`.
    pub fn from_response(document_type: DocumentType, response: &Value) -> Result<Self> {
        let body = response
            .get(model_name(document_type))
            .or_else(|| response.get(snake_model_name(document_type)))
            .unwrap_or(response);
        let status = body
            .get("meta")
            .and_then(|m| m.get("status"))
            .or_else(|| body.get("status"))
            .and_then(|s| s.as_str())
            .ok_or_else(|| AppError::InvalidResponse("No status in response".to_string()))?
            .trim()
            .to_string();
        let fields = body
            .get("fields")
            .and_then(|f| f.as_object())
            .cloned()
            .unwrap_or_default();
        Ok(Self { status, fields })
    }

    pub fn is_processed(&self) -> bool {
        self.status == STATUS_PROCESSED
    }

    pub fn is_failed(&self) -> bool {
        self.status.eq_ignore_ascii_case(STATUS_FAILED)
    }
}

/// Factory for per-document sessions against the extraction service.
pub trait ExtractionService: Sync {
    type Session: ExtractionSession;

    /// Fail fast before a batch starts (e.g. missing credentials).
    fn check(&self) -> Result<()> {
        Ok(())
    }

    fn open_session(&self) -> Result<Self::Session>;
}

pub trait ExtractionSession {
    fn begin_field_extraction(
        &self,
        document_type: DocumentType,
        request: &BeginExtractionRequest,
    ) -> Result<BeginExtractionResponse>;

    fn get_extracted_fields(
        &self,
        document_type: DocumentType,
        document_id: &str,
    ) -> Result<ExtractedDocument>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_uses_camel_case_payload() {
        let file = UploadedFile::from_bytes("lunch.png", b"abc".to_vec());
        let body = serde_json::to_value(BeginExtractionRequest::for_file(&file)).unwrap();
        assert_eq!(
            body,
            json!({"inputSource": {"base64EncodedContent": "YWJj", "name": "lunch.png"}})
        );
    }

    #[test]
    fn job_id_comes_from_first_document() {
        let response: BeginExtractionResponse =
            serde_json::from_value(json!({"documents": [{"id": "doc-1"}, {"id": "doc-2"}]})).unwrap();
        assert_eq!(response.job_id().unwrap(), "doc-1");

        let empty: BeginExtractionResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(empty.job_id(), Err(AppError::InvalidResponse(_))));
    }

    #[test]
    fn unwraps_model_envelope() {
        let response = json!({
            "hotelInvoice": {
                "meta": {"status": "Processed"},
                "fields": {"hotelName": "Grand Hotel", "total": 310.5}
            }
        });
        let doc = ExtractedDocument::from_response(DocumentType::HotelInvoice, &response).unwrap();
        assert!(doc.is_processed());
        assert_eq!(doc.fields.get("hotelName"), Some(&json!("Grand Hotel")));
    }

    #[test]
    fn pending_document_without_fields() {
        let response = json!({"utilityBill": {"meta": {"status": "InProgress"}}});
        let doc = ExtractedDocument::from_response(DocumentType::UtilityBill, &response).unwrap();
        assert!(!doc.is_processed());
        assert!(!doc.is_failed());
        assert!(doc.fields.is_empty());
    }

    #[test]
    fn missing_status_is_invalid() {
        let response = json!({"receipt": {"fields": {}}});
        assert!(ExtractedDocument::from_response(DocumentType::Receipt, &response).is_err());
    }
}
