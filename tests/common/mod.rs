#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use expense_assistant_lib::extraction::{
    model_name, BeginExtractionRequest, BeginExtractionResponse, DocumentHandle,
    ExtractedDocument, ExtractionService, ExtractionSession,
};
use expense_assistant_lib::types::DocumentType;
use expense_assistant_lib::upload::UploadedFile;
use expense_assistant_lib::{AppError, Result};
use serde_json::{json, Value};

/// Scripted behaviour for one file name.
#[derive(Clone, Debug)]
pub enum Script {
    /// Report `InProgress` this many times, then `Processed` with these fields.
    Processed { pending_polls: u32, fields: Value },
    /// Begin call fails with an API error.
    RejectSubmit,
    /// Begin call returns no document handles.
    NoDocuments,
    /// Service reports `Failed` on the first poll.
    RemoteFailure,
    /// Never leaves `InProgress`.
    Stuck,
}

#[derive(Default)]
pub struct Counters {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub polls: AtomicUsize,
}

#[derive(Default)]
pub struct MockService {
    scripts: HashMap<String, Script>,
    pub counters: Arc<Counters>,
    polls_seen: Arc<Mutex<HashMap<String, u32>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, file_name: &str, script: Script) -> Self {
        self.scripts.insert(file_name.to_string(), script);
        self
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.counters.polls.load(Ordering::SeqCst)
    }
}

pub struct MockSession {
    scripts: HashMap<String, Script>,
    counters: Arc<Counters>,
    polls_seen: Arc<Mutex<HashMap<String, u32>>>,
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
    }
}

impl ExtractionService for MockService {
    type Session = MockSession;

    fn open_session(&self) -> Result<MockSession> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(MockSession {
            scripts: self.scripts.clone(),
            counters: Arc::clone(&self.counters),
            polls_seen: Arc::clone(&self.polls_seen),
        })
    }
}

fn envelope(document_type: DocumentType, status: &str, fields: Value) -> Value {
    let mut body = serde_json::Map::new();
    body.insert(
        model_name(document_type).to_string(),
        json!({ "meta": { "status": status }, "fields": fields }),
    );
    Value::Object(body)
}

impl ExtractionSession for MockSession {
    fn begin_field_extraction(
        &self,
        _document_type: DocumentType,
        request: &BeginExtractionRequest,
    ) -> Result<BeginExtractionResponse> {
        let name = &request.input_source.name;
        match self.scripts.get(name) {
            Some(Script::RejectSubmit) => Err(AppError::Api {
                status: 401,
                message: "Invalid API key or endpoint?".to_string(),
            }),
            Some(Script::NoDocuments) => Ok(BeginExtractionResponse::default()),
            Some(_) => Ok(BeginExtractionResponse {
                documents: vec![DocumentHandle { id: name.clone() }],
            }),
            None => Err(AppError::InvalidResponse(format!("unscripted file {}", name))),
        }
    }

    fn get_extracted_fields(
        &self,
        document_type: DocumentType,
        document_id: &str,
    ) -> Result<ExtractedDocument> {
        self.counters.polls.fetch_add(1, Ordering::SeqCst);
        let seen = {
            let mut polls = self.polls_seen.lock().unwrap();
            let count = polls.entry(document_id.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        let response = match self.scripts.get(document_id) {
            Some(Script::Processed { pending_polls, fields }) if seen > *pending_polls => {
                envelope(document_type, "Processed", fields.clone())
            }
            Some(Script::RemoteFailure) => envelope(document_type, "Failed", json!({})),
            _ => envelope(document_type, "InProgress", json!({})),
        };
        ExtractedDocument::from_response(document_type, &response)
    }
}

pub fn receipt_fields() -> Value {
    json!({
        "vendor": "Corner Cafe",
        "total": 23.4,
        "currency": "EUR",
        "lineItems": [
            {"description": "Espresso", "quantity": 2, "price": 2.5, "amount": 5.0},
            {"description": "Club sandwich", "quantity": 1, "price": 18.4, "amount": 18.4}
        ]
    })
}

pub fn utility_bill_fields() -> Value {
    json!({"billNumber": "EL-2024-03", "amountDue": 81.2, "currency": "USD"})
}

pub fn hotel_invoice_fields() -> Value {
    json!({
        "hotelName": "Grand Hotel",
        "total": 310.5,
        "currency": "EUR",
        "lineItems": [{"description": "Room, 2 nights", "quantity": 2, "price": 150, "amount": 300}]
    })
}

pub fn upload(name: &str) -> Option<UploadedFile> {
    Some(UploadedFile::from_bytes(name, b"%PDF-1.7 test".to_vec()))
}
