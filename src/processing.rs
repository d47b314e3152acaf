use std::thread;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::PollPolicy;
use crate::error::{AppError, Result};
use crate::extraction::fields::map_fields;
use crate::extraction::{
    BeginExtractionRequest, ExtractedDocument, ExtractionService, ExtractionSession,
};
use crate::types::{DocumentEntry, DocumentType, LineItem, SummaryRecord};

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub policy: PollPolicy,
    /// Documents processed at once. 1 keeps the loop strictly sequential.
    pub concurrency: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            policy: PollPolicy::default(),
            concurrency: 1,
        }
    }
}

/// Result of one successfully processed document.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedDocument {
    pub summary: SummaryRecord,
    /// Present for document types that carry a line-item table.
    pub line_items: Option<Vec<LineItem>>,
}

/// Poll until the job reports `Processed`, sleeping per the policy before every call.
pub fn poll_until_processed<S: ExtractionSession>(
    session: &S,
    document_type: DocumentType,
    document_id: &str,
    policy: &PollPolicy,
) -> Result<ExtractedDocument> {
    let mut attempt: u32 = 1;
    loop {
        if !policy.allows(attempt) {
            return Err(AppError::PollTimeout {
                attempts: attempt - 1,
            });
        }
        let delay = policy.delay_for(attempt);
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let document = session.get_extracted_fields(document_type, document_id)?;
        debug!(document_id, attempt, status = %document.status, "polled extraction");
        if document.is_processed() {
            return Ok(document);
        }
        if document.is_failed() {
            return Err(AppError::ExtractionFailed(format!(
                "service reported status '{}'",
                document.status
            )));
        }
        attempt += 1;
    }
}

/// Submit one document, wait for it, and map the returned fields.
///
/// The session is opened here and dropped on return, whether or not processing succeeded.
pub fn process_document<S: ExtractionService>(
    service: &S,
    entry: &DocumentEntry,
    policy: &PollPolicy,
) -> Result<ProcessedDocument> {
    let session = service.open_session()?;
    let request = BeginExtractionRequest::for_file(&entry.file);
    let response = session.begin_field_extraction(entry.document_type, &request)?;
    let document_id = response.job_id()?;
    info!(
        file = %entry.file_name(),
        document_type = %entry.document_type,
        %document_id,
        "extraction started"
    );

    let document = poll_until_processed(&session, entry.document_type, &document_id, policy)?;
    let mapped = map_fields(entry.document_type, &document.fields);
    Ok(ProcessedDocument {
        summary: SummaryRecord {
            file_name: entry.file_name().to_string(),
            document_type: entry.document_type,
            primary_entity: mapped.primary_entity,
            total_amount: mapped.total_amount,
            currency: mapped.currency,
            comment: entry.comment.clone(),
        },
        line_items: mapped.line_items,
    })
}

/// Process every entry and return one result per entry, in queue order.
/// A failure only affects its own slot; the rest of the batch still runs.
pub fn process_all<S: ExtractionService>(
    service: &S,
    entries: &[DocumentEntry],
    options: &BatchOptions,
) -> Vec<Result<ProcessedDocument>> {
    let started = Instant::now();
    let results = if options.concurrency <= 1 {
        entries
            .iter()
            .map(|entry| process_logged(service, entry, &options.policy))
            .collect()
    } else {
        process_chunked(service, entries, options)
    };
    info!(
        documents = entries.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "batch finished"
    );
    results
}

fn process_logged<S: ExtractionService>(
    service: &S,
    entry: &DocumentEntry,
    policy: &PollPolicy,
) -> Result<ProcessedDocument> {
    let result = process_document(service, entry, policy);
    if let Err(e) = &result {
        warn!(file = %entry.file_name(), error = %e, "could not process document");
    }
    result
}

/// Run up to `concurrency` documents at a time on scoped threads.
fn process_chunked<S: ExtractionService>(
    service: &S,
    entries: &[DocumentEntry],
    options: &BatchOptions,
) -> Vec<Result<ProcessedDocument>> {
    let mut results = Vec::with_capacity(entries.len());
    for chunk in entries.chunks(options.concurrency) {
        thread::scope(|scope| {
            let handles: Vec<_> = chunk
                .iter()
                .map(|entry| scope.spawn(move || process_logged(service, entry, &options.policy)))
                .collect();
            for (entry, handle) in chunk.iter().zip(handles) {
                results.push(handle.join().unwrap_or_else(|_| {
                    Err(AppError::ExtractionFailed(format!(
                        "processing of {} panicked",
                        entry.file_name()
                    )))
                }));
            }
        });
    }
    results
}
