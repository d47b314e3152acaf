use reqwest::blocking::{Client, Response};
use reqwest::Url;
use tracing::debug;

use super::{
    model_name, BeginExtractionRequest, BeginExtractionResponse, ExtractedDocument,
    ExtractionService, ExtractionSession,
};
use crate::config::ServiceConfig;
use crate::error::{AppError, Result};
use crate::types::DocumentType;

/// HTTP client for the ABBYY Document AI REST API.
#[derive(Debug, Clone)]
pub struct DocumentAiClient {
    config: ServiceConfig,
}

impl DocumentAiClient {
    pub fn new(config: ServiceConfig) -> Self {
        Self { config }
    }
}

impl ExtractionService for DocumentAiClient {
    type Session = DocumentAiSession;

    fn check(&self) -> Result<()> {
        self.config.validate()
    }

    fn open_session(&self) -> Result<DocumentAiSession> {
        self.config.validate()?;
        let client = Client::builder()
            .timeout(self.config.request_timeout)
            .build()
            .map_err(|e| AppError::Network(e.to_string()))?;
        debug!(endpoint = %self.config.endpoint, "opened extraction session");
        Ok(DocumentAiSession {
            client,
            config: self.config.clone(),
        })
    }
}

/// Authenticated connection used for one document's submit and poll calls.
pub struct DocumentAiSession {
    client: Client,
    config: ServiceConfig,
}

impl Drop for DocumentAiSession {
    fn drop(&mut self) {
        debug!(endpoint = %self.config.endpoint, "closed extraction session");
    }
}

/// `{endpoint}/v1/models/{model}/extract`
pub fn begin_url(endpoint: &str, document_type: DocumentType) -> Result<Url> {
    build_url(endpoint, &["v1", "models", model_name(document_type), "extract"])
}

/// `{endpoint}/v1/models/{model}/documents/{id}`
pub fn fields_url(endpoint: &str, document_type: DocumentType, document_id: &str) -> Result<Url> {
    build_url(
        endpoint,
        &["v1", "models", model_name(document_type), "documents", document_id],
    )
}

fn build_url(endpoint: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(endpoint.trim_end_matches('/'))
        .map_err(|e| AppError::Config(format!("Invalid endpoint '{}': {}", endpoint, e)))?;
    url.path_segments_mut()
        .map_err(|_| AppError::Config(format!("Invalid endpoint '{}'", endpoint)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(AppError::Api {
        status: status.as_u16(),
        message: if body.trim().is_empty() {
            "Invalid API key or endpoint?".to_string()
        } else {
            body
        },
    })
}

impl ExtractionSession for DocumentAiSession {
    fn begin_field_extraction(
        &self,
        document_type: DocumentType,
        request: &BeginExtractionRequest,
    ) -> Result<BeginExtractionResponse> {
        let url = begin_url(&self.config.endpoint, document_type)?;
        debug!(%url, file = %request.input_source.name, "submitting document");
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()?;
        let response = check_status(response)?;
        Ok(response.json()?)
    }

    fn get_extracted_fields(
        &self,
        document_type: DocumentType,
        document_id: &str,
    ) -> Result<ExtractedDocument> {
        let url = fields_url(&self.config.endpoint, document_type, document_id)?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.config.api_key)
            .send()?;
        let response = check_status(response)?;
        let body: serde_json::Value = response.json()?;
        ExtractedDocument::from_response(document_type, &body)
    }
}
