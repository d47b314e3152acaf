use std::time::Instant;

use tracing::info;

use crate::error::{AppError, Result};
use crate::extraction::ExtractionService;
use crate::processing::{process_all, BatchOptions};
use crate::queue::DocumentQueue;
use crate::results::{LineItemTable, ResultStore};
use crate::types::{
    BatchReport, DocumentEntry, DocumentStatus, DocumentType, FailedDocument, SummaryRecord,
};
use crate::upload::UploadedFile;

/// State of one expense request: the queued documents and what analysis produced.
#[derive(Debug, Default)]
pub struct ExpenseSession {
    queue: DocumentQueue,
    results: ResultStore,
}

impl ExpenseSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        file: Option<UploadedFile>,
        document_type: DocumentType,
        comment: Option<String>,
    ) -> Result<Option<usize>> {
        self.queue.add(file, document_type, comment)
    }

    pub fn remove(&mut self, index: usize) -> Result<DocumentEntry> {
        self.queue.remove(index)
    }

    /// Clear documents and results and accept uploads again.
    pub fn reset(&mut self) {
        self.queue.reset();
        self.results.clear();
        info!("session reset");
    }

    pub fn uploads_locked(&self) -> bool {
        self.queue.is_frozen()
    }

    pub fn entries(&self) -> &[DocumentEntry] {
        self.queue.entries()
    }

    pub fn summaries(&self) -> &[SummaryRecord] {
        self.results.summaries()
    }

    pub fn line_item_tables(&self) -> &[LineItemTable] {
        self.results.line_item_tables()
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    /// Run every queued document through the extraction service, then lock the queue.
    pub fn analyze<S: ExtractionService>(
        &mut self,
        service: &S,
        options: &BatchOptions,
    ) -> Result<BatchReport> {
        if self.queue.is_frozen() {
            return Err(AppError::Session(
                "Documents were already analyzed. Start a new request to analyze again.".to_string(),
            ));
        }
        if self.queue.is_empty() {
            return Err(AppError::Session(
                "Add at least one document before analyzing.".to_string(),
            ));
        }
        service.check()?;

        let started = Instant::now();
        self.results.clear();
        let outcomes = process_all(service, self.queue.entries(), options);

        let mut report = BatchReport::default();
        for (index, (entry, outcome)) in self
            .queue
            .entries_mut()
            .iter_mut()
            .zip(outcomes)
            .enumerate()
        {
            match outcome {
                Ok(processed) => {
                    entry.status = DocumentStatus::Done;
                    entry.error = None;
                    let table = processed.line_items.map(|items| LineItemTable {
                        entry_index: index,
                        file_name: entry.file_name().to_string(),
                        document_type: entry.document_type,
                        items,
                    });
                    self.results.push(processed.summary, table);
                    report.processed += 1;
                }
                Err(e) => {
                    let message = format!("Could not process {}: {}", entry.file_name(), e);
                    entry.status = DocumentStatus::Failed;
                    entry.error = Some(message.clone());
                    report.failures.push(FailedDocument {
                        index,
                        file_name: entry.file_name().to_string(),
                        error: message,
                    });
                }
            }
        }
        self.queue.freeze();
        report.elapsed_ms = started.elapsed().as_millis();
        info!(
            processed = report.processed,
            failed = report.failures.len(),
            "analysis complete"
        );
        Ok(report)
    }
}
