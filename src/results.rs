use crate::types::{DocumentType, LineItem, SummaryRecord};

/// Line items extracted from one receipt or hotel invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemTable {
    /// Position of the source document in the queue.
    pub entry_index: usize,
    pub file_name: String,
    pub document_type: DocumentType,
    pub items: Vec<LineItem>,
}

/// Everything produced by the last analyze run, in queue order.
#[derive(Debug, Default)]
pub struct ResultStore {
    summaries: Vec<SummaryRecord>,
    line_items: Vec<LineItemTable>,
}

impl ResultStore {
    pub fn push(&mut self, summary: SummaryRecord, line_items: Option<LineItemTable>) {
        self.summaries.push(summary);
        if let Some(table) = line_items {
            self.line_items.push(table);
        }
    }

    pub fn summaries(&self) -> &[SummaryRecord] {
        &self.summaries
    }

    pub fn line_item_tables(&self) -> &[LineItemTable] {
        &self.line_items
    }

    /// Line items of the document at `entry_index` in the queue, if it has any.
    pub fn line_items_for(&self, entry_index: usize) -> Option<&LineItemTable> {
        self.line_items.iter().find(|t| t.entry_index == entry_index)
    }

    pub fn clear(&mut self) {
        self.summaries.clear();
        self.line_items.clear();
    }
}
