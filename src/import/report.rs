use serde::Serialize;

use super::row::RawRow;
use crate::xlsx::{Sheet, Workbook, XCell};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteAction {
    Created,
    Updated,
}

/// Exactly one per input row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RowOutcome {
    Success {
        row: usize,
        id: String,
        action: WriteAction,
    },
    ValidationFailure {
        row: usize,
        errors: Vec<String>,
    },
    PersistFailure {
        row: usize,
        message: String,
    },
    Skipped {
        row: usize,
        reason: String,
    },
}

impl RowOutcome {
    pub fn row(&self) -> usize {
        match self {
            RowOutcome::Success { row, .. }
            | RowOutcome::ValidationFailure { row, .. }
            | RowOutcome::PersistFailure { row, .. }
            | RowOutcome::Skipped { row, .. } => *row,
        }
    }

    pub fn status_label(&self) -> &'static str {
        match self {
            RowOutcome::Success { .. } => "Success",
            RowOutcome::ValidationFailure { .. } => "Validation failed",
            RowOutcome::PersistFailure { .. } => "Save failed",
            RowOutcome::Skipped { .. } => "Skipped",
        }
    }

    pub fn messages(&self) -> Vec<String> {
        match self {
            RowOutcome::Success { .. } => Vec::new(),
            RowOutcome::ValidationFailure { errors, .. } => errors.clone(),
            RowOutcome::PersistFailure { message, .. } => vec![message.clone()],
            RowOutcome::Skipped { reason, .. } => vec![reason.clone()],
        }
    }
}

/// A non-success row, kept with its source cells for the error workbook.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportIssue {
    pub row: usize,
    pub status: &'static str,
    pub errors: Vec<String>,
    pub data: RawRow,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub created: usize,
    pub updated: usize,
    pub issues: Vec<ImportIssue>,
    pub warnings: Vec<String>,
}

impl UploadSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: &RowOutcome, data: &RawRow) {
        self.total += 1;
        match outcome {
            RowOutcome::Success { action, .. } => {
                self.success += 1;
                match action {
                    WriteAction::Created => self.created += 1,
                    WriteAction::Updated => self.updated += 1,
                }
                return;
            }
            RowOutcome::ValidationFailure { .. } | RowOutcome::PersistFailure { .. } => {
                self.failed += 1
            }
            RowOutcome::Skipped { .. } => self.skipped += 1,
        }
        self.issues.push(ImportIssue {
            row: outcome.row(),
            status: outcome.status_label(),
            errors: outcome.messages(),
            data: data.clone(),
        });
    }

    /// Orders issues by row once every outcome is in.
    pub fn finish(&mut self) {
        self.issues.sort_by_key(|i| i.row);
    }

    pub fn is_consistent(&self) -> bool {
        self.total == self.success + self.failed + self.skipped
            && self.success == self.created + self.updated
    }
}

/// `Upload Errors` sheet: row number, every original column, status, errors.
pub fn error_workbook(headers: &[String], summary: &UploadSummary) -> Workbook {
    let mut sheet = Sheet::new("Upload Errors");
    let mut header_row: Vec<XCell> = vec![XCell::from("Row")];
    header_row.extend(headers.iter().map(|h| XCell::from(h.as_str())));
    header_row.push(XCell::from("Status"));
    header_row.push(XCell::from("Errors"));
    sheet.push_row(header_row);

    for issue in &summary.issues {
        let mut cells = vec![XCell::Number(issue.row as f64)];
        for h in headers {
            let text = issue.data.get(h).map(|c| c.display()).unwrap_or_default();
            cells.push(if text.is_empty() {
                XCell::Empty
            } else {
                XCell::Text(text)
            });
        }
        cells.push(XCell::from(issue.status));
        cells.push(XCell::Text(issue.errors.join("; ")));
        sheet.push_row(cells);
    }

    let mut wb = Workbook::new();
    wb.add_sheet(sheet);
    wb
}
