//! Turns validated rows into writes and runs them against a store.
//!
//! Planning is sequential and decides create vs. update for every row,
//! including rows whose natural key an earlier row of the same file
//! introduced. Execution then runs the planned writes one at a time, in
//! batches, or on a bounded worker pool. Outcomes always reach the sink in
//! row order.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam::channel;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use super::reference::{normalize_key, ReferenceIndex};
use super::report::{RowOutcome, WriteAction};
use super::row::CanonicalRow;
use crate::entities::{Entity, OnExisting};
use crate::store::{EntityStore, Record, StoreError, Write};

pub const CANCELLED: &str = "upload cancelled before this row was saved";
pub const RESUMED: &str = "processed in a previous run";

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A row after mapping and validation.
#[derive(Debug, Clone)]
pub enum Prepared {
    Valid(CanonicalRow),
    Invalid(Vec<String>),
    Skip(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Write(Write),
    Done(RowOutcome),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Planned {
    pub row: usize,
    pub step: Step,
    /// An earlier row of this upload already writes the same record.
    pub follows_write: bool,
}

/// Receives outcomes in row order.
pub trait OutcomeSink {
    /// `position` is the row's index in the planned list.
    fn emit(&mut self, position: usize, outcome: RowOutcome);

    /// Every row up to and including `last_row` has an outcome.
    fn checkpoint(&mut self, _last_row: usize) {}
}

/// Persisted form of a valid row, with reference ids resolved.
pub fn record_for(entity: &dyn Entity, row: &CanonicalRow, refs: &ReferenceIndex) -> Record {
    let mut record = Record::new();
    for f in entity.fields() {
        record.insert(f.key.to_string(), row.get(f.key).to_json());
    }
    for r in entity.references() {
        let id = refs
            .resolve(r, row)
            .map(|e| Value::String(e.id.clone()))
            .unwrap_or(Value::Null);
        record.insert(r.id_column.to_string(), id);
    }
    record
}

pub fn natural_key(entity: &dyn Entity, row: &CanonicalRow) -> String {
    let parts: Vec<String> = entity.natural_key().iter().map(|k| row.key_part(k)).collect();
    normalize_key(&parts)
}

pub fn plan(
    entity: &dyn Entity,
    rows: Vec<(usize, Prepared)>,
    refs: &ReferenceIndex,
) -> Vec<Planned> {
    // natural key -> (id, written by an earlier row of this upload)
    let mut seen: HashMap<String, (String, bool)> = HashMap::new();
    let mut out = Vec::with_capacity(rows.len());

    for (row, prepared) in rows {
        let canonical = match prepared {
            Prepared::Invalid(errors) => {
                out.push(done(row, RowOutcome::ValidationFailure { row, errors }));
                continue;
            }
            Prepared::Skip(reason) => {
                out.push(done(row, RowOutcome::Skipped { row, reason }));
                continue;
            }
            Prepared::Valid(c) => c,
        };

        let key = natural_key(entity, &canonical);
        let existing = seen.get(&key).cloned().or_else(|| {
            refs.get(entity.name(), &key)
                .map(|e| (e.id.clone(), false))
        });
        let record = record_for(entity, &canonical, refs);

        match (existing, entity.on_existing()) {
            (Some(_), OnExisting::Skip(reason)) => {
                out.push(done(
                    row,
                    RowOutcome::Skipped {
                        row,
                        reason: reason.to_string(),
                    },
                ));
            }
            (Some((id, written_here)), OnExisting::Update) => {
                seen.insert(key, (id.clone(), true));
                out.push(Planned {
                    row,
                    step: Step::Write(Write::Update { id, record }),
                    follows_write: written_here,
                });
            }
            (None, _) => {
                let id = Uuid::new_v4().to_string();
                seen.insert(key, (id.clone(), true));
                out.push(Planned {
                    row,
                    step: Step::Write(Write::Create { id, record }),
                    follows_write: false,
                });
            }
        }
    }
    out
}

fn done(row: usize, outcome: RowOutcome) -> Planned {
    Planned {
        row,
        step: Step::Done(outcome),
        follows_write: false,
    }
}

fn success(write: &Write, saved: &Record, row: usize) -> RowOutcome {
    let id = saved
        .get("id")
        .and_then(|v| v.as_str())
        .unwrap_or(write.id())
        .to_string();
    let action = if write.is_create() {
        WriteAction::Created
    } else {
        WriteAction::Updated
    };
    RowOutcome::Success { row, id, action }
}

type Outcomes = Vec<(usize, usize, RowOutcome)>;

/// Runs one chunk of planned rows. Writes of the chunk go to the store as a
/// single batch when there is more than one of them.
fn run_chunk<S: EntityStore + ?Sized>(
    store: &S,
    entity: &dyn Entity,
    chunk: Vec<(usize, Planned)>,
    batch: bool,
    cancel: &CancelToken,
) -> Outcomes {
    let cancelled = cancel.is_cancelled();
    let mut out: Outcomes = Vec::with_capacity(chunk.len());
    let mut pending: Vec<(usize, usize, Write)> = Vec::new();

    for (pos, planned) in chunk {
        match planned.step {
            Step::Done(outcome) => out.push((pos, planned.row, outcome)),
            Step::Write(_) if cancelled => out.push((
                pos,
                planned.row,
                RowOutcome::Skipped {
                    row: planned.row,
                    reason: CANCELLED.to_string(),
                },
            )),
            Step::Write(w) => pending.push((pos, planned.row, w)),
        }
    }
    if pending.is_empty() {
        return out;
    }

    if batch && pending.len() > 1 {
        let writes: Vec<Write> = pending.iter().map(|(_, _, w)| w.clone()).collect();
        let result = store.write_batch(entity, &writes).and_then(|results| {
            if results.len() == writes.len() {
                Ok(results)
            } else {
                Err(StoreError::Rejected(format!(
                    "Batch returned {} results for {} rows",
                    results.len(),
                    writes.len()
                )))
            }
        });
        match result {
            Ok(results) => {
                for ((pos, row, w), result) in pending.iter().zip(results) {
                    out.push((*pos, *row, outcome_of(w, result, *row)));
                }
            }
            Err(e) => {
                warn!(entity = entity.name(), rows = pending.len(), error = %e, "batch write failed");
                let message = e.to_string();
                for (pos, row, _) in &pending {
                    out.push((
                        *pos,
                        *row,
                        RowOutcome::PersistFailure {
                            row: *row,
                            message: message.clone(),
                        },
                    ));
                }
            }
        }
    } else {
        for (pos, row, w) in &pending {
            out.push((*pos, *row, outcome_of(w, store.apply(entity, w), *row)));
        }
    }
    out
}

fn outcome_of(write: &Write, result: Result<Record, StoreError>, row: usize) -> RowOutcome {
    match result {
        Ok(saved) => success(write, &saved, row),
        Err(e) => {
            debug!(row, error = %e, "row write failed");
            RowOutcome::PersistFailure {
                row,
                message: e.to_string(),
            }
        }
    }
}

/// A row whose write never landed; a resumed run must attempt it again.
fn unsaved(outcome: &RowOutcome) -> bool {
    match outcome {
        RowOutcome::PersistFailure { .. } => true,
        RowOutcome::Skipped { reason, .. } => reason == CANCELLED,
        _ => false,
    }
}

/// Emits buffered outcomes as soon as they form a contiguous prefix.
///
/// The checkpoint follows the emitted prefix but stops for good before the
/// first unsaved row.
struct Reorder<'a> {
    next: usize,
    buffer: BTreeMap<usize, (usize, RowOutcome)>,
    halted: bool,
    sink: &'a mut dyn OutcomeSink,
}

impl<'a> Reorder<'a> {
    fn new(sink: &'a mut dyn OutcomeSink) -> Self {
        Self {
            next: 0,
            buffer: BTreeMap::new(),
            halted: false,
            sink,
        }
    }

    fn push(&mut self, outcomes: Outcomes) {
        for (pos, row, outcome) in outcomes {
            self.buffer.insert(pos, (row, outcome));
        }
        let mut last = None;
        while let Some((row, outcome)) = self.buffer.remove(&self.next) {
            if !self.halted && unsaved(&outcome) {
                self.halted = true;
            }
            if !self.halted {
                last = Some(row);
            }
            self.sink.emit(self.next, outcome);
            self.next += 1;
        }
        if let Some(row) = last {
            self.sink.checkpoint(row);
        }
    }
}

/// Sequential (`batch_size == 1`) or batched execution on the calling thread.
pub fn execute<S: EntityStore + ?Sized>(
    store: &S,
    entity: &dyn Entity,
    planned: Vec<Planned>,
    batch_size: usize,
    cancel: &CancelToken,
    sink: &mut dyn OutcomeSink,
) {
    let batch_size = batch_size.max(1);
    let mut reorder = Reorder::new(sink);
    let mut items = planned.into_iter().enumerate().peekable();
    while items.peek().is_some() {
        let chunk: Vec<(usize, Planned)> = items.by_ref().take(batch_size).collect();
        reorder.push(run_chunk(store, entity, chunk, batch_size > 1, cancel));
    }
}

/// Bounded worker pool. Rows whose record an earlier row of the same upload
/// also writes run after the pool drains, one at a time in row order, so the
/// last row in the file is the last write.
pub fn execute_concurrent<S: EntityStore + Sync + ?Sized>(
    store: &S,
    entity: &dyn Entity,
    planned: Vec<Planned>,
    batch_size: usize,
    workers: usize,
    cancel: &CancelToken,
    sink: &mut dyn OutcomeSink,
) {
    let batch_size = batch_size.max(1);
    let workers = workers.max(1);
    let (deferred, immediate): (Vec<(usize, Planned)>, Vec<(usize, Planned)>) = planned
        .into_iter()
        .enumerate()
        .partition(|(_, p)| p.follows_write);

    let (job_tx, job_rx) = channel::unbounded::<Vec<(usize, Planned)>>();
    let mut chunk = Vec::with_capacity(batch_size);
    for item in immediate {
        chunk.push(item);
        if chunk.len() == batch_size {
            let _ = job_tx.send(std::mem::take(&mut chunk));
        }
    }
    if !chunk.is_empty() {
        let _ = job_tx.send(chunk);
    }
    drop(job_tx);

    let mut reorder = Reorder::new(sink);
    std::thread::scope(|scope| {
        let (out_tx, out_rx) = channel::unbounded::<Outcomes>();
        for _ in 0..workers {
            let jobs = job_rx.clone();
            let results = out_tx.clone();
            scope.spawn(move || {
                for job in jobs.iter() {
                    let outcomes = run_chunk(store, entity, job, batch_size > 1, cancel);
                    if results.send(outcomes).is_err() {
                        break;
                    }
                }
            });
        }
        drop(out_tx);
        for outcomes in out_rx.iter() {
            reorder.push(outcomes);
        }
    });

    for item in deferred {
        reorder.push(run_chunk(store, entity, vec![item], false, cancel));
    }
}
