use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub worker_id: i64,
    pub name: String,
    pub identification_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Process {
    pub process_id: i64,
    pub name: String,
    /// The production run currently in progress, if any.
    pub production_history_id: Option<i64>,
}

/// A physical line belonging to a process, with its assigned worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    pub line_id: i64,
    pub process_id: i64,
    pub name: String,
    pub order: i64,
    pub worker_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionHistory {
    pub production_history_id: i64,
    pub process_id: i64,
    pub plan_count: i64,
    pub indicator_line_id: Option<i64>,
    pub start: String,
    pub stop: Option<String>,
}

/// One line's record within a production run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionLine {
    pub production_line_id: i64,
    pub production_history_id: i64,
    pub line_id: i64,
    pub order: i64,
    pub defective: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    pub payload_id: i64,
    pub production_line_id: i64,
    pub count: i64,
    pub recorded_at: String,
}

/// A worker producing on a production line. Active while `stop` is `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Producer {
    pub producer_id: i64,
    pub worker_id: i64,
    pub production_line_id: i64,
    pub start: String,
    pub stop: Option<String>,
}

impl Producer {
    pub fn is_active(&self) -> bool {
        self.stop.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SensorSignal {
    Running,
    Stopped,
    Call,
    Alert,
}

impl SensorSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Call => "call",
            Self::Alert => "alert",
        }
    }
}

impl FromStr for SensorSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            "call" => Ok(Self::Call),
            "alert" => Ok(Self::Alert),
            _ => Err(format!("Invalid sensor signal: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorEvent {
    pub sensor_event_id: i64,
    pub process_id: i64,
    pub sensor_type: String,
    pub signal: SensorSignal,
    pub triggered_at: String,
}

/// Board-wide display settings. There is exactly one row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AndonConfig {
    pub andon_config_id: i64,
    pub row_count: i64,
    pub column_count: i64,
    pub auto_play: bool,
    pub auto_play_speed: i64,
    pub item_column_count: i64,
    pub is_show_part_number: bool,
    pub is_show_start: bool,
    pub is_show_good_rate: bool,
    pub is_show_plan_count: bool,
    pub is_show_achievement_rate: bool,
    pub updated_at: String,
}

/// Per-user placement of one process on the board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AndonLayout {
    pub andon_layout_id: i64,
    pub user_id: i64,
    pub process_id: i64,
    pub is_display: bool,
    pub order: i64,
}

// ── Eager-loaded views ────────────────────────────────────────────────

/// Relations that `ProcessRepository::all` can load alongside each process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessRelation {
    AndonLayout,
    SensorEvents,
    /// `production_history.indicator_line.payloads`
    IndicatorPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorLine {
    #[serde(flatten)]
    pub production_line: ProductionLine,
    pub payloads: Vec<Payload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionHistoryDetail {
    #[serde(flatten)]
    pub history: ProductionHistory,
    pub indicator_line: Option<IndicatorLine>,
}

impl ProductionHistoryDetail {
    /// Latest payload count on the indicator line, or 0.
    pub fn produced_count(&self) -> i64 {
        self.indicator_line
            .as_ref()
            .and_then(|l| l.payloads.last())
            .map(|p| p.count)
            .unwrap_or(0)
    }

    /// Produced count as a percentage of the plan. `None` without a plan.
    pub fn achievement_rate(&self) -> Option<f64> {
        if self.history.plan_count <= 0 {
            return None;
        }
        Some(self.produced_count() as f64 * 100.0 / self.history.plan_count as f64)
    }
}

/// A process with whichever relations were requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDetail {
    #[serde(flatten)]
    pub process: Process,
    pub andon_layout: Option<AndonLayout>,
    pub sensor_events: Vec<SensorEvent>,
    pub production_history: Option<ProductionHistoryDetail>,
}

impl ProcessDetail {
    pub fn bare(process: Process) -> Self {
        Self {
            process,
            andon_layout: None,
            sensor_events: Vec::new(),
            production_history: None,
        }
    }

    /// The most recent sensor signal, which drives the board colour.
    pub fn latest_signal(&self) -> Option<SensorSignal> {
        self.sensor_events.last().map(|e| e.signal)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AndonSettings {
    pub config: AndonConfig,
    pub layouts: Vec<AndonLayout>,
}
