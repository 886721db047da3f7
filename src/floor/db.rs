use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::errors::{FloorError, FloorResult};

use super::models::*;
use super::repository::*;
use super::requests::{LayoutInput, UpdateAndonConfigRequest};

/// Number of recent sensor events loaded per process for the board.
const SENSOR_EVENT_WINDOW: i64 = 50;

/// Async-safe handle to the floor database.
///
/// Wraps `FloorDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O
/// never ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<FloorDb>>,
}

impl DbHandle {
    pub fn new(db: FloorDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> FloorResult<R>
    where
        F: FnOnce(&FloorDb) -> FloorResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| FloorError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }

    /// Acquire the database mutex synchronously. Only for startup and tests.
    pub fn lock_sync(&self) -> FloorResult<std::sync::MutexGuard<'_, FloorDb>> {
        self.inner.lock().map_err(|_| FloorError::LockPoisoned)
    }
}

/// Defaults used when the singleton Andon config row is first created.
#[derive(Debug, Clone, Copy)]
pub struct AndonDefaults {
    pub row_count: i64,
    pub column_count: i64,
}

impl Default for AndonDefaults {
    fn default() -> Self {
        Self {
            row_count: 2,
            column_count: 3,
        }
    }
}

pub struct FloorDb {
    conn: Connection,
    andon_defaults: AndonDefaults,
}

impl FloorDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self {
            conn,
            andon_defaults: AndonDefaults::default(),
        };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self {
            conn,
            andon_defaults: AndonDefaults::default(),
        };
        db.init()?;
        Ok(db)
    }

    pub fn with_andon_defaults(mut self, defaults: AndonDefaults) -> Self {
        self.andon_defaults = defaults;
        self
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS users (
                    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    email TEXT NOT NULL UNIQUE,
                    password_hash TEXT NOT NULL,
                    is_admin INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS sessions (
                    token TEXT PRIMARY KEY,
                    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
                    expires_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS workers (
                    worker_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    identification_number TEXT NOT NULL UNIQUE
                );

                CREATE TABLE IF NOT EXISTS processes (
                    process_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    production_history_id INTEGER
                );

                CREATE TABLE IF NOT EXISTS lines (
                    line_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    process_id INTEGER NOT NULL REFERENCES processes(process_id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    display_order INTEGER NOT NULL DEFAULT 0,
                    worker_id INTEGER REFERENCES workers(worker_id) ON DELETE SET NULL
                );

                CREATE TABLE IF NOT EXISTS production_histories (
                    production_history_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    process_id INTEGER NOT NULL REFERENCES processes(process_id) ON DELETE CASCADE,
                    plan_count INTEGER NOT NULL DEFAULT 0,
                    indicator_line_id INTEGER,
                    start TEXT NOT NULL,
                    stop TEXT
                );

                CREATE TABLE IF NOT EXISTS production_lines (
                    production_line_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    production_history_id INTEGER NOT NULL REFERENCES production_histories(production_history_id) ON DELETE CASCADE,
                    line_id INTEGER NOT NULL REFERENCES lines(line_id) ON DELETE CASCADE,
                    display_order INTEGER NOT NULL DEFAULT 0,
                    defective INTEGER NOT NULL DEFAULT 0,
                    UNIQUE(production_history_id, line_id)
                );

                CREATE TABLE IF NOT EXISTS payloads (
                    payload_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    production_line_id INTEGER NOT NULL REFERENCES production_lines(production_line_id) ON DELETE CASCADE,
                    count INTEGER NOT NULL,
                    recorded_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS producers (
                    producer_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    worker_id INTEGER NOT NULL REFERENCES workers(worker_id),
                    production_line_id INTEGER NOT NULL REFERENCES production_lines(production_line_id) ON DELETE CASCADE,
                    start TEXT NOT NULL,
                    stop TEXT
                );

                CREATE TABLE IF NOT EXISTS sensor_events (
                    sensor_event_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    process_id INTEGER NOT NULL REFERENCES processes(process_id) ON DELETE CASCADE,
                    sensor_type TEXT NOT NULL,
                    signal TEXT NOT NULL,
                    triggered_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS andon_configs (
                    andon_config_id INTEGER PRIMARY KEY,
                    row_count INTEGER NOT NULL,
                    column_count INTEGER NOT NULL,
                    auto_play INTEGER NOT NULL DEFAULT 0,
                    auto_play_speed INTEGER NOT NULL DEFAULT 10,
                    item_column_count INTEGER NOT NULL DEFAULT 2,
                    is_show_part_number INTEGER NOT NULL DEFAULT 1,
                    is_show_start INTEGER NOT NULL DEFAULT 1,
                    is_show_good_rate INTEGER NOT NULL DEFAULT 1,
                    is_show_plan_count INTEGER NOT NULL DEFAULT 1,
                    is_show_achievement_rate INTEGER NOT NULL DEFAULT 1,
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS andon_layouts (
                    andon_layout_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
                    process_id INTEGER NOT NULL REFERENCES processes(process_id) ON DELETE CASCADE,
                    is_display INTEGER NOT NULL DEFAULT 1,
                    display_order INTEGER NOT NULL DEFAULT 0,
                    UNIQUE(user_id, process_id)
                );

                CREATE INDEX IF NOT EXISTS idx_lines_process ON lines(process_id);
                CREATE INDEX IF NOT EXISTS idx_production_lines_history ON production_lines(production_history_id);
                CREATE INDEX IF NOT EXISTS idx_payloads_line ON payloads(production_line_id);
                CREATE INDEX IF NOT EXISTS idx_sensor_events_process ON sensor_events(process_id);
                CREATE UNIQUE INDEX IF NOT EXISTS idx_producers_active
                    ON producers(production_line_id) WHERE stop IS NULL;
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Users & sessions ──────────────────────────────────────────────

    pub fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> Result<User> {
        self.conn
            .execute(
                "INSERT INTO users (name, email, password_hash, is_admin) VALUES (?1, ?2, ?3, ?4)",
                params![name, email, password_hash, is_admin],
            )
            .context("Failed to insert user")?;
        let id = self.conn.last_insert_rowid();
        self.get_user(id)?.context("User not found after insert")
    }

    pub fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        self.conn
            .query_row(
                "SELECT user_id, name, email, is_admin FROM users WHERE user_id = ?1",
                params![user_id],
                user_from_row,
            )
            .optional()
            .context("Failed to query user")
    }

    /// The user with `email` and their stored password hash.
    pub fn find_user_credentials(&self, email: &str) -> Result<Option<(User, String)>> {
        self.conn
            .query_row(
                "SELECT user_id, name, email, is_admin, password_hash FROM users WHERE email = ?1",
                params![email],
                |row| Ok((user_from_row(row)?, row.get(4)?)),
            )
            .optional()
            .context("Failed to query user credentials")
    }

    pub fn create_session(&self, token: &str, user_id: i64, expires_at: DateTime<Utc>) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
                params![token, user_id, expires_at.to_rfc3339()],
            )
            .context("Failed to insert session")?;
        Ok(())
    }

    /// The user owning an unexpired session token.
    pub fn session_user(&self, token: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        self.conn
            .query_row(
                "SELECT u.user_id, u.name, u.email, u.is_admin
                 FROM sessions s JOIN users u ON u.user_id = s.user_id
                 WHERE s.token = ?1 AND s.expires_at > ?2",
                params![token, now.to_rfc3339()],
                user_from_row,
            )
            .optional()
            .context("Failed to query session")
    }

    pub fn delete_session(&self, token: &str) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])
            .context("Failed to delete session")?;
        Ok(count > 0)
    }

    pub fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        self.conn
            .execute(
                "DELETE FROM sessions WHERE expires_at <= ?1",
                params![now.to_rfc3339()],
            )
            .context("Failed to purge sessions")
    }

    // ── Production tracking ───────────────────────────────────────────

    pub fn get_production_history(&self, id: i64) -> Result<Option<ProductionHistory>> {
        self.conn
            .query_row(
                "SELECT production_history_id, process_id, plan_count, indicator_line_id, start, stop
                 FROM production_histories WHERE production_history_id = ?1",
                params![id],
                production_history_from_row,
            )
            .optional()
            .context("Failed to query production history")
    }

    pub fn production_lines(&self, production_history_id: i64) -> Result<Vec<ProductionLine>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT production_line_id, production_history_id, line_id, display_order, defective
                 FROM production_lines WHERE production_history_id = ?1 ORDER BY display_order, production_line_id",
            )
            .context("Failed to prepare production_lines")?;
        let rows = stmt
            .query_map(params![production_history_id], production_line_from_row)
            .context("Failed to query production lines")?;
        let mut lines = Vec::new();
        for row in rows {
            lines.push(row.context("Failed to read production line row")?);
        }
        Ok(lines)
    }

    pub fn get_production_line(&self, production_line_id: i64) -> Result<Option<ProductionLine>> {
        self.conn
            .query_row(
                "SELECT production_line_id, production_history_id, line_id, display_order, defective
                 FROM production_lines WHERE production_line_id = ?1",
                params![production_line_id],
                production_line_from_row,
            )
            .optional()
            .context("Failed to query production line")
    }

    /// Every producer row on a production line, oldest first.
    pub fn producers_for(&self, production_line_id: i64) -> Result<Vec<Producer>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT producer_id, worker_id, production_line_id, start, stop
                 FROM producers WHERE production_line_id = ?1 ORDER BY producer_id",
            )
            .context("Failed to prepare producers_for")?;
        let rows = stmt
            .query_map(params![production_line_id], producer_from_row)
            .context("Failed to query producers")?;
        let mut producers = Vec::new();
        for row in rows {
            producers.push(row.context("Failed to read producer row")?);
        }
        Ok(producers)
    }

    /// Begin a production run for a process.
    ///
    /// Creates the history, one production line per physical line (the first
    /// line becomes the indicator line), and an active producer for every
    /// line that currently has a worker assigned.
    pub fn start_production(
        &self,
        process_id: i64,
        plan_count: i64,
        now: DateTime<Utc>,
    ) -> FloorResult<ProductionHistory> {
        let process = ProcessRepository::find(self, process_id)?
            .ok_or_else(|| FloorError::not_found("process", process_id))?;
        if let Some(active) = process.production_history_id {
            return Err(FloorError::Validation(format!(
                "process {} already has production run {} in progress",
                process_id, active
            )));
        }
        let lines = self.for_process(process_id)?;
        let stamp = now.to_rfc3339();

        in_transaction(self, || -> FloorResult<ProductionHistory> {
            self.conn.execute(
                "INSERT INTO production_histories (process_id, plan_count, start) VALUES (?1, ?2, ?3)",
                params![process_id, plan_count, stamp],
            )?;
            let history_id = self.conn.last_insert_rowid();

            let mut indicator = None;
            for line in &lines {
                self.conn.execute(
                    "INSERT INTO production_lines (production_history_id, line_id, display_order) VALUES (?1, ?2, ?3)",
                    params![history_id, line.line_id, line.order],
                )?;
                let production_line_id = self.conn.last_insert_rowid();
                if indicator.is_none() {
                    indicator = Some(production_line_id);
                }

                if let Some(worker_id) = line.worker_id {
                    self.conn.execute(
                        "INSERT INTO producers (worker_id, production_line_id, start) VALUES (?1, ?2, ?3)",
                        params![worker_id, production_line_id, stamp],
                    )?;
                }
            }

            self.conn.execute(
                "UPDATE production_histories SET indicator_line_id = ?1 WHERE production_history_id = ?2",
                params![indicator, history_id],
            )?;
            self.conn.execute(
                "UPDATE processes SET production_history_id = ?1 WHERE process_id = ?2",
                params![history_id, process_id],
            )?;

            let history = self
                .get_production_history(history_id)?
                .context("Production history not found after insert")?;
            tracing::info!(process_id, history_id, lines = lines.len(), "Production started");
            Ok(history)
        })
    }

    /// Finish the current production run of a process, stopping all of its
    /// active producers.
    pub fn stop_production(&self, process_id: i64, now: DateTime<Utc>) -> FloorResult<ProductionHistory> {
        let process = ProcessRepository::find(self, process_id)?
            .ok_or_else(|| FloorError::not_found("process", process_id))?;
        let history_id = process.production_history_id.ok_or_else(|| {
            FloorError::Validation(format!("process {} has no production run in progress", process_id))
        })?;
        let stamp = now.to_rfc3339();

        in_transaction(self, || -> FloorResult<ProductionHistory> {
            let stopped = self.conn.execute(
                "UPDATE producers SET stop = ?1
                 WHERE stop IS NULL AND production_line_id IN
                    (SELECT production_line_id FROM production_lines WHERE production_history_id = ?2)",
                params![stamp, history_id],
            )?;
            self.conn.execute(
                "UPDATE production_histories SET stop = ?1 WHERE production_history_id = ?2",
                params![stamp, history_id],
            )?;
            self.conn.execute(
                "UPDATE processes SET production_history_id = NULL WHERE process_id = ?1",
                params![process_id],
            )?;
            let history = self
                .get_production_history(history_id)?
                .context("Production history not found after stop")?;
            tracing::info!(process_id, history_id, stopped, "Production stopped");
            Ok(history)
        })
    }

    pub fn record_sensor_event(
        &self,
        process_id: i64,
        sensor_type: &str,
        signal: SensorSignal,
        now: DateTime<Utc>,
    ) -> FloorResult<SensorEvent> {
        ProcessRepository::find(self, process_id)?
            .ok_or_else(|| FloorError::not_found("process", process_id))?;
        self.conn.execute(
            "INSERT INTO sensor_events (process_id, sensor_type, signal, triggered_at) VALUES (?1, ?2, ?3, ?4)",
            params![process_id, sensor_type, signal.as_str(), now.to_rfc3339()],
        )?;
        let id = self.conn.last_insert_rowid();
        let event = self
            .conn
            .query_row(
                "SELECT sensor_event_id, process_id, sensor_type, signal, triggered_at
                 FROM sensor_events WHERE sensor_event_id = ?1",
                params![id],
                sensor_event_row,
            )?
            .into_sensor_event()?;
        Ok(event)
    }

    pub fn record_payload(
        &self,
        production_line_id: i64,
        count: i64,
        now: DateTime<Utc>,
    ) -> FloorResult<Payload> {
        self.get_production_line(production_line_id)?
            .ok_or_else(|| FloorError::not_found("production line", production_line_id))?;
        self.conn.execute(
            "INSERT INTO payloads (production_line_id, count, recorded_at) VALUES (?1, ?2, ?3)",
            params![production_line_id, count, now.to_rfc3339()],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(self.conn.query_row(
            "SELECT payload_id, production_line_id, count, recorded_at FROM payloads WHERE payload_id = ?1",
            params![id],
            payload_from_row,
        )?)
    }

    fn payloads_for(&self, production_line_id: i64) -> Result<Vec<Payload>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT payload_id, production_line_id, count, recorded_at
                 FROM payloads WHERE production_line_id = ?1 ORDER BY payload_id",
            )
            .context("Failed to prepare payloads_for")?;
        let rows = stmt
            .query_map(params![production_line_id], payload_from_row)
            .context("Failed to query payloads")?;
        let mut payloads = Vec::new();
        for row in rows {
            payloads.push(row.context("Failed to read payload row")?);
        }
        Ok(payloads)
    }

    fn recent_sensor_events(&self, process_id: i64) -> Result<Vec<SensorEvent>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT sensor_event_id, process_id, sensor_type, signal, triggered_at FROM (
                    SELECT * FROM sensor_events WHERE process_id = ?1
                    ORDER BY sensor_event_id DESC LIMIT ?2
                 ) ORDER BY sensor_event_id",
            )
            .context("Failed to prepare recent_sensor_events")?;
        let rows = stmt
            .query_map(params![process_id, SENSOR_EVENT_WINDOW], sensor_event_row)
            .context("Failed to query sensor events")?;
        let mut events = Vec::new();
        for row in rows {
            let r = row.context("Failed to read sensor event row")?;
            events.push(r.into_sensor_event()?);
        }
        Ok(events)
    }

    fn layout_for(&self, user_id: i64, process_id: i64) -> Result<Option<AndonLayout>> {
        self.conn
            .query_row(
                "SELECT andon_layout_id, user_id, process_id, is_display, display_order
                 FROM andon_layouts WHERE user_id = ?1 AND process_id = ?2",
                params![user_id, process_id],
                andon_layout_from_row,
            )
            .optional()
            .context("Failed to query andon layout")
    }

    fn history_detail(&self, production_history_id: i64) -> Result<Option<ProductionHistoryDetail>> {
        let Some(history) = self.get_production_history(production_history_id)? else {
            return Ok(None);
        };
        let indicator_line = match history.indicator_line_id {
            Some(id) => match self.get_production_line(id)? {
                Some(production_line) => Some(IndicatorLine {
                    payloads: self.payloads_for(id)?,
                    production_line,
                }),
                None => None,
            },
            None => None,
        };
        Ok(Some(ProductionHistoryDetail {
            history,
            indicator_line,
        }))
    }

    fn list_processes(&self) -> Result<Vec<Process>> {
        let mut stmt = self
            .conn
            .prepare("SELECT process_id, name, production_history_id FROM processes ORDER BY process_id")
            .context("Failed to prepare list_processes")?;
        let rows = stmt
            .query_map([], process_from_row)
            .context("Failed to query processes")?;
        let mut processes = Vec::new();
        for row in rows {
            processes.push(row.context("Failed to read process row")?);
        }
        Ok(processes)
    }
}

// ── Repository implementations ────────────────────────────────────────

impl Transactor for FloorDb {
    fn begin(&self) -> Result<()> {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .context("Failed to begin transaction")
    }

    fn commit(&self) -> Result<()> {
        self.conn
            .execute_batch("COMMIT")
            .context("Failed to commit transaction")
    }

    fn rollback(&self) -> Result<()> {
        self.conn
            .execute_batch("ROLLBACK")
            .context("Failed to roll back transaction")
    }
}

impl ProcessRepository for FloorDb {
    fn all(&self, relations: &[ProcessRelation], user_id: i64) -> Result<Vec<ProcessDetail>> {
        let with = |r: ProcessRelation| relations.contains(&r);
        let mut details = Vec::new();
        for process in self.list_processes()? {
            let mut detail = ProcessDetail::bare(process);
            let process_id = detail.process.process_id;
            if with(ProcessRelation::AndonLayout) {
                detail.andon_layout = self.layout_for(user_id, process_id)?;
            }
            if with(ProcessRelation::SensorEvents) {
                detail.sensor_events = self.recent_sensor_events(process_id)?;
            }
            if with(ProcessRelation::IndicatorPayload)
                && let Some(history_id) = detail.process.production_history_id
            {
                detail.production_history = self.history_detail(history_id)?;
            }
            details.push(detail);
        }
        Ok(details)
    }

    fn find(&self, process_id: i64) -> Result<Option<Process>> {
        self.conn
            .query_row(
                "SELECT process_id, name, production_history_id FROM processes WHERE process_id = ?1",
                params![process_id],
                process_from_row,
            )
            .optional()
            .context("Failed to query process")
    }

    fn create(&self, name: &str) -> Result<Process> {
        self.conn
            .execute("INSERT INTO processes (name) VALUES (?1)", params![name])
            .context("Failed to insert process")?;
        let id = self.conn.last_insert_rowid();
        ProcessRepository::find(self, id)?.context("Process not found after insert")
    }
}

impl AndonConfigRepository for FloorDb {
    fn andon_config(&self) -> Result<AndonConfig> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO andon_configs (andon_config_id, row_count, column_count) VALUES (1, ?1, ?2)",
                params![self.andon_defaults.row_count, self.andon_defaults.column_count],
            )
            .context("Failed to seed andon config")?;
        self.conn
            .query_row(
                "SELECT andon_config_id, row_count, column_count, auto_play, auto_play_speed, item_column_count,
                        is_show_part_number, is_show_start, is_show_good_rate, is_show_plan_count,
                        is_show_achievement_rate, updated_at
                 FROM andon_configs WHERE andon_config_id = 1",
                [],
                |row| {
                    Ok(AndonConfig {
                        andon_config_id: row.get(0)?,
                        row_count: row.get(1)?,
                        column_count: row.get(2)?,
                        auto_play: row.get(3)?,
                        auto_play_speed: row.get(4)?,
                        item_column_count: row.get(5)?,
                        is_show_part_number: row.get(6)?,
                        is_show_start: row.get(7)?,
                        is_show_good_rate: row.get(8)?,
                        is_show_plan_count: row.get(9)?,
                        is_show_achievement_rate: row.get(10)?,
                        updated_at: row.get(11)?,
                    })
                },
            )
            .context("Failed to query andon config")
    }

    fn update(&self, request: &UpdateAndonConfigRequest, config: &AndonConfig) -> Result<bool> {
        let count = self
            .conn
            .execute(
                "UPDATE andon_configs SET
                    row_count = ?1, column_count = ?2, auto_play = ?3, auto_play_speed = ?4,
                    item_column_count = ?5, is_show_part_number = ?6, is_show_start = ?7,
                    is_show_good_rate = ?8, is_show_plan_count = ?9, is_show_achievement_rate = ?10,
                    updated_at = datetime('now')
                 WHERE andon_config_id = ?11",
                params![
                    request.row_count,
                    request.column_count,
                    request.auto_play,
                    request.auto_play_speed,
                    request.item_column_count,
                    request.is_show_part_number,
                    request.is_show_start,
                    request.is_show_good_rate,
                    request.is_show_plan_count,
                    request.is_show_achievement_rate,
                    config.andon_config_id,
                ],
            )
            .context("Failed to update andon config")?;
        Ok(count > 0)
    }
}

impl AndonLayoutRepository for FloorDb {
    fn layouts(&self, user_id: i64) -> Result<Vec<AndonLayout>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT andon_layout_id, user_id, process_id, is_display, display_order
                 FROM andon_layouts WHERE user_id = ?1 ORDER BY display_order, process_id",
            )
            .context("Failed to prepare layouts")?;
        let rows = stmt
            .query_map(params![user_id], andon_layout_from_row)
            .context("Failed to query layouts")?;
        let mut layouts = Vec::new();
        for row in rows {
            layouts.push(row.context("Failed to read layout row")?);
        }
        Ok(layouts)
    }

    fn update_layouts(&self, layouts: &[LayoutInput], user_id: i64) -> Result<bool> {
        for layout in layouts {
            if ProcessRepository::find(self, layout.process_id)?.is_none() {
                tracing::warn!(process_id = layout.process_id, "Layout references unknown process");
                return Ok(false);
            }
            self.conn
                .execute(
                    "INSERT INTO andon_layouts (user_id, process_id, is_display, display_order)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(user_id, process_id) DO UPDATE SET
                        is_display = excluded.is_display,
                        display_order = excluded.display_order",
                    params![user_id, layout.process_id, layout.is_display, layout.order],
                )
                .context("Failed to upsert andon layout")?;
        }
        Ok(true)
    }
}

impl LineRepository for FloorDb {
    fn update_worker(&self, line_id: i64, worker_id: Option<i64>) -> Result<bool> {
        let count = self
            .conn
            .execute(
                "UPDATE lines SET worker_id = ?1 WHERE line_id = ?2",
                params![worker_id, line_id],
            )
            .context("Failed to update line worker")?;
        Ok(count > 0)
    }

    fn find(&self, line_id: i64) -> Result<Option<Line>> {
        self.conn
            .query_row(
                "SELECT line_id, process_id, name, display_order, worker_id FROM lines WHERE line_id = ?1",
                params![line_id],
                line_from_row,
            )
            .optional()
            .context("Failed to query line")
    }

    fn for_process(&self, process_id: i64) -> Result<Vec<Line>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT line_id, process_id, name, display_order, worker_id
                 FROM lines WHERE process_id = ?1 ORDER BY display_order, line_id",
            )
            .context("Failed to prepare lines for_process")?;
        let rows = stmt
            .query_map(params![process_id], line_from_row)
            .context("Failed to query lines")?;
        let mut lines = Vec::new();
        for row in rows {
            lines.push(row.context("Failed to read line row")?);
        }
        Ok(lines)
    }

    fn create(&self, process_id: i64, name: &str, order: i64) -> Result<Line> {
        self.conn
            .execute(
                "INSERT INTO lines (process_id, name, display_order) VALUES (?1, ?2, ?3)",
                params![process_id, name, order],
            )
            .context("Failed to insert line")?;
        let id = self.conn.last_insert_rowid();
        LineRepository::find(self, id)?.context("Line not found after insert")
    }
}

impl ProductionLineRepository for FloorDb {
    fn first(&self, production_history_id: i64, line_id: i64) -> Result<Option<ProductionLine>> {
        self.conn
            .query_row(
                "SELECT production_line_id, production_history_id, line_id, display_order, defective
                 FROM production_lines WHERE production_history_id = ?1 AND line_id = ?2",
                params![production_history_id, line_id],
                production_line_from_row,
            )
            .optional()
            .context("Failed to query production line")
    }

    fn set_defective(&self, production_line_id: i64, defective: bool) -> Result<bool> {
        let count = self
            .conn
            .execute(
                "UPDATE production_lines SET defective = ?1 WHERE production_line_id = ?2",
                params![defective, production_line_id],
            )
            .context("Failed to update production line")?;
        Ok(count > 0)
    }
}

impl ProducerRepository for FloorDb {
    fn find_by(&self, production_line_id: i64) -> Result<Option<Producer>> {
        self.conn
            .query_row(
                "SELECT producer_id, worker_id, production_line_id, start, stop
                 FROM producers WHERE production_line_id = ?1 AND stop IS NULL",
                params![production_line_id],
                producer_from_row,
            )
            .optional()
            .context("Failed to query producer")
    }

    fn stop(&self, producer: &Producer, now: DateTime<Utc>) -> Result<bool> {
        let count = self
            .conn
            .execute(
                "UPDATE producers SET stop = ?1 WHERE producer_id = ?2 AND stop IS NULL",
                params![now.to_rfc3339(), producer.producer_id],
            )
            .context("Failed to stop producer")?;
        Ok(count > 0)
    }

    fn save(&self, worker: &Worker, production_line_id: i64, now: DateTime<Utc>) -> Result<bool> {
        let count = self
            .conn
            .execute(
                "INSERT INTO producers (worker_id, production_line_id, start) VALUES (?1, ?2, ?3)",
                params![worker.worker_id, production_line_id, now.to_rfc3339()],
            )
            .context("Failed to save producer")?;
        Ok(count > 0)
    }
}

impl WorkerRepository for FloorDb {
    fn find(&self, worker_id: i64) -> Result<Option<Worker>> {
        self.conn
            .query_row(
                "SELECT worker_id, name, identification_number FROM workers WHERE worker_id = ?1",
                params![worker_id],
                worker_from_row,
            )
            .optional()
            .context("Failed to query worker")
    }

    fn all(&self) -> Result<Vec<Worker>> {
        let mut stmt = self
            .conn
            .prepare("SELECT worker_id, name, identification_number FROM workers ORDER BY worker_id")
            .context("Failed to prepare list workers")?;
        let rows = stmt
            .query_map([], worker_from_row)
            .context("Failed to query workers")?;
        let mut workers = Vec::new();
        for row in rows {
            workers.push(row.context("Failed to read worker row")?);
        }
        Ok(workers)
    }

    fn create(&self, name: &str, identification_number: &str) -> Result<Worker> {
        self.conn
            .execute(
                "INSERT INTO workers (name, identification_number) VALUES (?1, ?2)",
                params![name, identification_number],
            )
            .context("Failed to insert worker")?;
        let id = self.conn.last_insert_rowid();
        WorkerRepository::find(self, id)?.context("Worker not found after insert")
    }
}

// ── Row mapping ───────────────────────────────────────────────────────

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        is_admin: row.get(3)?,
    })
}

fn worker_from_row(row: &Row<'_>) -> rusqlite::Result<Worker> {
    Ok(Worker {
        worker_id: row.get(0)?,
        name: row.get(1)?,
        identification_number: row.get(2)?,
    })
}

fn process_from_row(row: &Row<'_>) -> rusqlite::Result<Process> {
    Ok(Process {
        process_id: row.get(0)?,
        name: row.get(1)?,
        production_history_id: row.get(2)?,
    })
}

fn line_from_row(row: &Row<'_>) -> rusqlite::Result<Line> {
    Ok(Line {
        line_id: row.get(0)?,
        process_id: row.get(1)?,
        name: row.get(2)?,
        order: row.get(3)?,
        worker_id: row.get(4)?,
    })
}

fn production_history_from_row(row: &Row<'_>) -> rusqlite::Result<ProductionHistory> {
    Ok(ProductionHistory {
        production_history_id: row.get(0)?,
        process_id: row.get(1)?,
        plan_count: row.get(2)?,
        indicator_line_id: row.get(3)?,
        start: row.get(4)?,
        stop: row.get(5)?,
    })
}

fn production_line_from_row(row: &Row<'_>) -> rusqlite::Result<ProductionLine> {
    Ok(ProductionLine {
        production_line_id: row.get(0)?,
        production_history_id: row.get(1)?,
        line_id: row.get(2)?,
        order: row.get(3)?,
        defective: row.get(4)?,
    })
}

fn payload_from_row(row: &Row<'_>) -> rusqlite::Result<Payload> {
    Ok(Payload {
        payload_id: row.get(0)?,
        production_line_id: row.get(1)?,
        count: row.get(2)?,
        recorded_at: row.get(3)?,
    })
}

fn producer_from_row(row: &Row<'_>) -> rusqlite::Result<Producer> {
    Ok(Producer {
        producer_id: row.get(0)?,
        worker_id: row.get(1)?,
        production_line_id: row.get(2)?,
        start: row.get(3)?,
        stop: row.get(4)?,
    })
}

fn andon_layout_from_row(row: &Row<'_>) -> rusqlite::Result<AndonLayout> {
    Ok(AndonLayout {
        andon_layout_id: row.get(0)?,
        user_id: row.get(1)?,
        process_id: row.get(2)?,
        is_display: row.get(3)?,
        order: row.get(4)?,
    })
}

/// Intermediate row struct for sensor_events; the signal is stored as text.
struct SensorEventRow {
    sensor_event_id: i64,
    process_id: i64,
    sensor_type: String,
    signal: String,
    triggered_at: String,
}

fn sensor_event_row(row: &Row<'_>) -> rusqlite::Result<SensorEventRow> {
    Ok(SensorEventRow {
        sensor_event_id: row.get(0)?,
        process_id: row.get(1)?,
        sensor_type: row.get(2)?,
        signal: row.get(3)?,
        triggered_at: row.get(4)?,
    })
}

impl SensorEventRow {
    fn into_sensor_event(self) -> Result<SensorEvent> {
        let signal = SensorSignal::from_str(&self.signal)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse sensor signal")?;
        Ok(SensorEvent {
            sensor_event_id: self.sensor_event_id,
            process_id: self.process_id,
            sensor_type: self.sensor_type,
            signal,
            triggered_at: self.triggered_at,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
