use crate::errors::{FloorError, FloorResult};

use super::db::FloorDb;
use super::models::{ProcessDetail, ProcessRelation};
use super::repository::{
    AndonConfigRepository, AndonLayoutRepository, ProcessRepository, Transactor, in_transaction,
};
use super::requests::UpdateAndonConfigRequest;

/// Relations the Andon board needs for every process.
pub const BOARD_RELATIONS: [ProcessRelation; 3] = [
    ProcessRelation::AndonLayout,
    ProcessRelation::SensorEvents,
    ProcessRelation::IndicatorPayload,
];

/// Board data and board configuration.
pub struct AndonService<'a> {
    configs: &'a dyn AndonConfigRepository,
    layouts: &'a dyn AndonLayoutRepository,
    processes: &'a dyn ProcessRepository,
    tx: &'a dyn Transactor,
}

impl<'a> AndonService<'a> {
    pub fn new(
        configs: &'a dyn AndonConfigRepository,
        layouts: &'a dyn AndonLayoutRepository,
        processes: &'a dyn ProcessRepository,
        tx: &'a dyn Transactor,
    ) -> Self {
        Self {
            configs,
            layouts,
            processes,
            tx,
        }
    }

    pub fn from_db(db: &'a FloorDb) -> Self {
        Self::new(db, db, db, db)
    }

    /// Every process with its layout, sensor events and indicator payloads.
    pub fn processes(&self, user_id: i64) -> FloorResult<Vec<ProcessDetail>> {
        Ok(self.processes.all(&BOARD_RELATIONS, user_id)?)
    }

    /// Apply a config edit and, when present, the user's layout edits.
    pub fn update(&self, request: &UpdateAndonConfigRequest, user_id: i64) -> FloorResult<()> {
        in_transaction(self.tx, || -> FloorResult<()> {
            let config = self.configs.andon_config()?;
            if !self.configs.update(request, &config)? {
                return Err(FloorError::update_failed("andon config"));
            }

            if let Some(layouts) = &request.layouts {
                if !self.layouts.update_layouts(layouts, user_id)? {
                    return Err(FloorError::not_found("andon layout", user_id));
                }
                tracing::debug!(user_id, count = layouts.len(), "Andon layouts updated");
            }

            tracing::info!(user_id, "Andon config updated");
            Ok(())
        })
    }
}
