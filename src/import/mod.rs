//! The bulk import pipeline: parse, map, validate, plan, write, report.

pub mod export;
pub mod mapper;
pub mod parse;
pub mod reference;
pub mod report;
pub mod row;
pub mod template;
pub mod upsert;
pub mod validate;

use tracing::info;

use crate::entities::Entity;
use crate::store::{EntityStore, StoreError};
use parse::{ParseError, ParsedFile};
use reference::ReferenceIndex;
use report::{RowOutcome, UploadSummary};
use row::RawRow;
use upsert::{CancelToken, OutcomeSink, Prepared};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Failed to load reference data: {0}")]
    Reference(#[source] StoreError),
}

/// Receives every row outcome as it happens, in row order.
pub trait ImportObserver {
    fn on_outcome(&mut self, _outcome: &RowOutcome, _data: &RawRow) {}

    /// Rows numbered up to `last_row` are finished.
    fn on_checkpoint(&mut self, _last_row: usize) {}
}

impl ImportObserver for () {}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub batch_size: usize,
    pub concurrency: usize,
    /// Rows numbered at or below this were finished by an earlier run.
    pub resume_after: Option<usize>,
    pub cancel: CancelToken,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: 1,
            concurrency: 1,
            resume_after: None,
            cancel: CancelToken::new(),
        }
    }
}

/// Maps and validates every parsed row.
pub fn prepare(
    entity: &dyn Entity,
    parsed: &ParsedFile,
    refs: &ReferenceIndex,
    resume_after: Option<usize>,
) -> Vec<(usize, Prepared)> {
    parsed
        .rows
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let number = parsed.row_number(i);
            if resume_after.is_some_and(|last| number <= last) {
                return (number, Prepared::Skip(upsert::RESUMED.to_string()));
            }
            let canonical = mapper::map_row(entity, raw);
            let errors = validate::validate_row(entity, &canonical, refs);
            if errors.is_empty() {
                (number, Prepared::Valid(canonical))
            } else {
                (number, Prepared::Invalid(errors))
            }
        })
        .collect()
}

struct Collector<'a> {
    rows: &'a [RawRow],
    summary: &'a mut UploadSummary,
    observer: &'a mut dyn ImportObserver,
}

impl OutcomeSink for Collector<'_> {
    fn emit(&mut self, position: usize, outcome: RowOutcome) {
        let empty = RawRow::new();
        let data = self.rows.get(position).unwrap_or(&empty);
        self.observer.on_outcome(&outcome, data);
        self.summary.record(&outcome, data);
    }

    fn checkpoint(&mut self, last_row: usize) {
        self.observer.on_checkpoint(last_row);
    }
}

fn begin<S: EntityStore + ?Sized>(
    store: &S,
    entity: &dyn Entity,
    parsed: &ParsedFile,
    options: &ImportOptions,
) -> Result<(Vec<upsert::Planned>, UploadSummary), ImportError> {
    info!(
        entity = entity.name(),
        rows = parsed.rows.len(),
        batch_size = options.batch_size,
        concurrency = options.concurrency,
        "import started"
    );
    let refs = ReferenceIndex::build(store, entity).map_err(ImportError::Reference)?;
    let prepared = prepare(entity, parsed, &refs, options.resume_after);
    let planned = upsert::plan(entity, prepared, &refs);
    let mut summary = UploadSummary::new();
    summary.warnings = mapper::analyze_headers(entity, &parsed.headers).warnings();
    Ok((planned, summary))
}

fn finish(entity: &dyn Entity, mut summary: UploadSummary) -> UploadSummary {
    summary.finish();
    info!(
        entity = entity.name(),
        total = summary.total,
        success = summary.success,
        failed = summary.failed,
        skipped = summary.skipped,
        "import finished"
    );
    summary
}

/// Runs the whole pipeline on the calling thread, one write at a time or in
/// batches of `options.batch_size`.
pub fn run_import<S: EntityStore + ?Sized>(
    store: &S,
    entity: &dyn Entity,
    parsed: &ParsedFile,
    options: &ImportOptions,
    observer: &mut dyn ImportObserver,
) -> Result<UploadSummary, ImportError> {
    let (planned, mut summary) = begin(store, entity, parsed, options)?;
    {
        let mut sink = Collector {
            rows: &parsed.rows,
            summary: &mut summary,
            observer,
        };
        upsert::execute(
            store,
            entity,
            planned,
            options.batch_size,
            &options.cancel,
            &mut sink,
        );
    }
    Ok(finish(entity, summary))
}

/// Like [`run_import`], but spreads writes over `options.concurrency` workers
/// when it is above one.
pub fn run_import_shared<S: EntityStore + Sync + ?Sized>(
    store: &S,
    entity: &dyn Entity,
    parsed: &ParsedFile,
    options: &ImportOptions,
    observer: &mut dyn ImportObserver,
) -> Result<UploadSummary, ImportError> {
    if options.concurrency <= 1 {
        return run_import(store, entity, parsed, options, observer);
    }
    let (planned, mut summary) = begin(store, entity, parsed, options)?;
    {
        let mut sink = Collector {
            rows: &parsed.rows,
            summary: &mut summary,
            observer,
        };
        upsert::execute_concurrent(
            store,
            entity,
            planned,
            options.batch_size,
            options.concurrency,
            &options.cancel,
            &mut sink,
        );
    }
    Ok(finish(entity, summary))
}
