use chrono::{DateTime, Utc};

use crate::errors::{FloorError, FloorResult};

use super::db::FloorDb;
use super::models::{Process, Producer};
use super::repository::{
    LineRepository, ProducerRepository, ProductionLineRepository, Transactor, WorkerRepository,
    in_transaction,
};
use super::requests::UpdateLineWorkerRequest;

/// Reassigns workers to lines and keeps the producer records of the
/// current production run in step.
pub struct SwitchService<'a> {
    lines: &'a dyn LineRepository,
    production_lines: &'a dyn ProductionLineRepository,
    producers: &'a dyn ProducerRepository,
    workers: &'a dyn WorkerRepository,
    tx: &'a dyn Transactor,
}

impl<'a> SwitchService<'a> {
    pub fn new(
        lines: &'a dyn LineRepository,
        production_lines: &'a dyn ProductionLineRepository,
        producers: &'a dyn ProducerRepository,
        workers: &'a dyn WorkerRepository,
        tx: &'a dyn Transactor,
    ) -> Self {
        Self {
            lines,
            production_lines,
            producers,
            workers,
            tx,
        }
    }

    pub fn from_db(db: &'a FloorDb) -> Self {
        Self::new(db, db, db, db, db)
    }

    /// Apply every `{line_id, worker_id}` pair of the request in one
    /// transaction. Defective production lines keep their producers.
    pub fn update_line_worker(
        &self,
        request: &UpdateLineWorkerRequest,
        process: &Process,
    ) -> FloorResult<()> {
        let now = Utc::now();
        in_transaction(self.tx, || -> FloorResult<()> {
            for entry in &request.lines {
                if !self.lines.update_worker(entry.line_id, entry.worker_id)? {
                    return Err(FloorError::update_failed(format!("line {}", entry.line_id)));
                }

                let Some(history_id) = process.production_history_id else {
                    continue;
                };
                let Some(production_line) = self.production_lines.first(history_id, entry.line_id)? else {
                    tracing::debug!(line_id = entry.line_id, history_id, "Line has no production record");
                    continue;
                };
                if production_line.defective {
                    tracing::debug!(
                        production_line_id = production_line.production_line_id,
                        "Skipping defective production line"
                    );
                    continue;
                }

                let existing = self.producers.find_by(production_line.production_line_id)?;
                let ok = self.update_producer_worker(
                    existing.as_ref(),
                    entry.worker_id,
                    production_line.production_line_id,
                    now,
                )?;
                if !ok {
                    return Err(FloorError::update_failed(format!(
                        "producer for production line {}",
                        production_line.production_line_id
                    )));
                }
            }
            tracing::info!(
                process_id = process.process_id,
                lines = request.lines.len(),
                "Line workers updated"
            );
            Ok(())
        })
    }

    /// Reconcile the active producer of one production line with the
    /// requested worker.
    ///
    /// | existing          | requested | action                 |
    /// |-------------------|-----------|------------------------|
    /// | same worker       | `Some`    | nothing                |
    /// | other worker      | `Some`    | stop, then save new    |
    /// | any               | `None`    | stop                   |
    /// | `None`            | `Some`    | save new               |
    /// | `None`            | `None`    | nothing                |
    pub(crate) fn update_producer_worker(
        &self,
        existing: Option<&Producer>,
        new_worker_id: Option<i64>,
        production_line_id: i64,
        now: DateTime<Utc>,
    ) -> FloorResult<bool> {
        if existing.map(|p| p.worker_id) == new_worker_id {
            return Ok(true);
        }

        let mut ok = true;
        if let Some(producer) = existing {
            ok &= self.producers.stop(producer, now)?;
        }
        if let Some(worker_id) = new_worker_id {
            let worker = self
                .workers
                .find(worker_id)?
                .ok_or_else(|| FloorError::not_found("worker", worker_id))?;
            ok = ok && self.producers.save(&worker, production_line_id, now)?;
        }
        Ok(ok)
    }
}
