//! Repository traits, one per table.
//!
//! Services hold `&dyn` references to these so that tests can substitute
//! recording doubles. `FloorDb` implements every trait in `db.rs`.

use anyhow::Result;
use chrono::{DateTime, Utc};

use super::models::*;
use super::requests::{LayoutInput, UpdateAndonConfigRequest};

/// Transaction boundary shared by all repositories on one connection.
pub trait Transactor {
    fn begin(&self) -> Result<()>;
    fn commit(&self) -> Result<()>;
    fn rollback(&self) -> Result<()>;
}

/// Run `f` inside a transaction. Commits on `Ok`, rolls back on `Err`.
pub fn in_transaction<T, E, F>(tx: &dyn Transactor, f: F) -> std::result::Result<T, E>
where
    F: FnOnce() -> std::result::Result<T, E>,
    E: From<anyhow::Error>,
{
    tx.begin()?;
    match f() {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback() {
                tracing::error!(error = %rollback_err, "Rollback failed");
            }
            Err(e)
        }
    }
}

pub trait ProcessRepository {
    /// All processes, with the requested relations loaded. The Andon layout
    /// relation is resolved for `user_id`.
    fn all(&self, relations: &[ProcessRelation], user_id: i64) -> Result<Vec<ProcessDetail>>;
    fn find(&self, process_id: i64) -> Result<Option<Process>>;
    fn create(&self, name: &str) -> Result<Process>;
}

pub trait AndonConfigRepository {
    /// The singleton config row, created with defaults if missing.
    fn andon_config(&self) -> Result<AndonConfig>;
    /// Returns `false` when no row was changed.
    fn update(&self, request: &UpdateAndonConfigRequest, config: &AndonConfig) -> Result<bool>;
}

pub trait AndonLayoutRepository {
    fn layouts(&self, user_id: i64) -> Result<Vec<AndonLayout>>;
    /// Upserts one layout per process for `user_id`. Returns `false` when a
    /// referenced process does not exist.
    fn update_layouts(&self, layouts: &[LayoutInput], user_id: i64) -> Result<bool>;
}

pub trait LineRepository {
    /// Returns `false` when the line does not exist.
    fn update_worker(&self, line_id: i64, worker_id: Option<i64>) -> Result<bool>;
    fn find(&self, line_id: i64) -> Result<Option<Line>>;
    fn for_process(&self, process_id: i64) -> Result<Vec<Line>>;
    fn create(&self, process_id: i64, name: &str, order: i64) -> Result<Line>;
}

pub trait ProductionLineRepository {
    /// The production line for `line_id` within a production run.
    fn first(&self, production_history_id: i64, line_id: i64) -> Result<Option<ProductionLine>>;
    fn set_defective(&self, production_line_id: i64, defective: bool) -> Result<bool>;
}

pub trait ProducerRepository {
    /// The active producer on a production line.
    fn find_by(&self, production_line_id: i64) -> Result<Option<Producer>>;
    fn stop(&self, producer: &Producer, now: DateTime<Utc>) -> Result<bool>;
    fn save(&self, worker: &Worker, production_line_id: i64, now: DateTime<Utc>) -> Result<bool>;
}

pub trait WorkerRepository {
    fn find(&self, worker_id: i64) -> Result<Option<Worker>>;
    fn all(&self) -> Result<Vec<Worker>>;
    fn create(&self, name: &str, identification_number: &str) -> Result<Worker>;
}
