use tracing::debug;

use crate::error::{AppError, Result};
use crate::types::{DocumentEntry, DocumentType};
use crate::upload::UploadedFile;

/// Ordered list of documents waiting for analysis.
///
/// Append-only while collecting. Once a batch has run the queue is frozen: no uploads and
/// no removals until [`DocumentQueue::reset`].
#[derive(Debug, Default)]
pub struct DocumentQueue {
    entries: Vec<DocumentEntry>,
    frozen: bool,
}

impl DocumentQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a Pending entry. A submission without a file is ignored and returns `Ok(None)`.
    pub fn add(
        &mut self,
        file: Option<UploadedFile>,
        document_type: DocumentType,
        comment: Option<String>,
    ) -> Result<Option<usize>> {
        if self.frozen {
            return Err(AppError::Session(
                "Upload disabled. Start a new request to add documents.".to_string(),
            ));
        }
        let Some(file) = file else {
            debug!("submission without a file ignored");
            return Ok(None);
        };
        debug!(file = %file.name, document_type = %document_type, "queued document");
        self.entries
            .push(DocumentEntry::new(file, document_type, comment));
        Ok(Some(self.entries.len() - 1))
    }

    pub fn remove(&mut self, index: usize) -> Result<DocumentEntry> {
        if self.frozen {
            return Err(AppError::Session(
                "Documents were already processed. Start a new request instead.".to_string(),
            ));
        }
        if index >= self.entries.len() {
            return Err(AppError::Session(format!(
                "No document #{} in the queue.",
                index + 1
            )));
        }
        Ok(self.entries.remove(index))
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.frozen = false;
    }

    pub(crate) fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn entries(&self) -> &[DocumentEntry] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [DocumentEntry] {
        &mut self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentStatus;

    fn file(name: &str) -> Option<UploadedFile> {
        Some(UploadedFile::from_bytes(name, b"%PDF-1.4".to_vec()))
    }

    #[test]
    fn add_appends_pending_entries_in_order() {
        let mut queue = DocumentQueue::new();
        assert_eq!(queue.add(file("a.pdf"), DocumentType::Receipt, None).unwrap(), Some(0));
        assert_eq!(
            queue
                .add(file("b.pdf"), DocumentType::UtilityBill, Some("March".into()))
                .unwrap(),
            Some(1)
        );
        let names: Vec<_> = queue.entries().iter().map(|e| e.file_name()).collect();
        assert_eq!(names, ["a.pdf", "b.pdf"]);
        assert!(queue.entries().iter().all(|e| e.status == DocumentStatus::Pending));
        assert_eq!(queue.entries()[1].comment.as_deref(), Some("March"));
    }

    #[test]
    fn add_without_file_is_a_no_op() {
        let mut queue = DocumentQueue::new();
        assert_eq!(queue.add(None, DocumentType::Receipt, Some("x".into())).unwrap(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn remove_preserves_order() {
        let mut queue = DocumentQueue::new();
        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            queue.add(file(name), DocumentType::Receipt, None).unwrap();
        }
        let removed = queue.remove(1).unwrap();
        assert_eq!(removed.file_name(), "b.pdf");
        let names: Vec<_> = queue.entries().iter().map(|e| e.file_name()).collect();
        assert_eq!(names, ["a.pdf", "c.pdf"]);
        assert!(queue.remove(5).is_err());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn frozen_queue_rejects_changes_until_reset() {
        let mut queue = DocumentQueue::new();
        queue.add(file("a.pdf"), DocumentType::Receipt, None).unwrap();
        queue.freeze();
        assert!(queue.add(file("b.pdf"), DocumentType::Receipt, None).is_err());
        assert!(queue.remove(0).is_err());
        assert_eq!(queue.len(), 1);

        queue.reset();
        assert!(queue.is_empty());
        assert!(!queue.is_frozen());
        assert!(queue.add(file("b.pdf"), DocumentType::Receipt, None).is_ok());
    }
}
