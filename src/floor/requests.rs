//! Incoming request payloads and their validation rules.
//!
//! Handlers deserialize one of these, call `validate()`, and only then hand
//! the value to a service. A failed check becomes `FloorError::Validation`.

use std::collections::HashSet;

use serde::Deserialize;

use crate::errors::{FloorError, FloorResult};

use super::models::SensorSignal;

fn check_range(field: &str, value: i64, min: i64, max: i64) -> FloorResult<()> {
    if value < min || value > max {
        return Err(FloorError::Validation(format!(
            "{} must be between {} and {}",
            field, min, max
        )));
    }
    Ok(())
}

fn check_not_blank(field: &str, value: &str) -> FloorResult<()> {
    if value.trim().is_empty() {
        return Err(FloorError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

// ── Andon configuration ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LayoutInput {
    pub process_id: i64,
    pub is_display: bool,
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateAndonConfigRequest {
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
    #[serde(default)]
    pub layouts: Option<Vec<LayoutInput>>,
}

impl UpdateAndonConfigRequest {
    pub fn validate(&self) -> FloorResult<()> {
        check_range("row_count", self.row_count, 1, 10)?;
        check_range("column_count", self.column_count, 1, 10)?;
        check_range("auto_play_speed", self.auto_play_speed, 1, 300)?;
        check_range("item_column_count", self.item_column_count, 1, 4)?;

        if let Some(layouts) = &self.layouts {
            let mut seen = HashSet::new();
            for layout in layouts {
                if layout.order < 0 {
                    return Err(FloorError::Validation(format!(
                        "layout order for process {} must not be negative",
                        layout.process_id
                    )));
                }
                if !seen.insert(layout.process_id) {
                    return Err(FloorError::Validation(format!(
                        "process {} appears in more than one layout",
                        layout.process_id
                    )));
                }
            }
        }
        Ok(())
    }
}

// ── Line worker switching ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LineWorkerInput {
    pub line_id: i64,
    #[serde(default)]
    pub worker_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateLineWorkerRequest {
    pub lines: Vec<LineWorkerInput>,
}

impl UpdateLineWorkerRequest {
    /// `process_line_ids` are the lines that belong to the target process.
    pub fn validate(&self, process_line_ids: &[i64]) -> FloorResult<()> {
        if self.lines.is_empty() {
            return Err(FloorError::Validation("lines must not be empty".into()));
        }
        let mut seen = HashSet::new();
        for entry in &self.lines {
            if !seen.insert(entry.line_id) {
                return Err(FloorError::Validation(format!(
                    "line {} appears more than once",
                    entry.line_id
                )));
            }
            if !process_line_ids.contains(&entry.line_id) {
                return Err(FloorError::Validation(format!(
                    "line {} does not belong to this process",
                    entry.line_id
                )));
            }
        }
        Ok(())
    }
}

// ── Master data ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CreateWorkerRequest {
    pub name: String,
    pub identification_number: String,
}

impl CreateWorkerRequest {
    pub fn validate(&self) -> FloorResult<()> {
        check_not_blank("name", &self.name)?;
        check_not_blank("identification_number", &self.identification_number)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProcessRequest {
    pub name: String,
}

impl CreateProcessRequest {
    pub fn validate(&self) -> FloorResult<()> {
        check_not_blank("name", &self.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLineRequest {
    pub name: String,
    #[serde(default)]
    pub order: Option<i64>,
}

impl CreateLineRequest {
    pub fn validate(&self) -> FloorResult<()> {
        check_not_blank("name", &self.name)?;
        if let Some(order) = self.order {
            check_range("order", order, 0, i64::MAX)?;
        }
        Ok(())
    }
}

// ── Production tracking ───────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct StartProductionRequest {
    pub plan_count: i64,
}

impl StartProductionRequest {
    pub fn validate(&self) -> FloorResult<()> {
        check_range("plan_count", self.plan_count, 0, 1_000_000)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensorEventRequest {
    pub sensor_type: String,
    pub signal: SensorSignal,
}

impl SensorEventRequest {
    pub fn validate(&self) -> FloorResult<()> {
        check_not_blank("sensor_type", &self.sensor_type)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayloadRequest {
    pub count: i64,
}

impl PayloadRequest {
    pub fn validate(&self) -> FloorResult<()> {
        check_range("count", self.count, 0, i64::MAX)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DefectiveRequest {
    pub defective: bool,
}

// ── Auth ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> FloorResult<()> {
        check_not_blank("email", &self.email)?;
        check_not_blank("password", &self.password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_request() -> UpdateAndonConfigRequest {
        UpdateAndonConfigRequest {
            row_count: 2,
            column_count: 3,
            auto_play: false,
            auto_play_speed: 10,
            item_column_count: 2,
            is_show_part_number: true,
            is_show_start: true,
            is_show_good_rate: false,
            is_show_plan_count: true,
            is_show_achievement_rate: true,
            layouts: None,
        }
    }

    #[test]
    fn test_config_request_accepts_valid_values() {
        assert!(config_request().validate().is_ok());
    }

    #[test]
    fn test_config_request_rejects_out_of_range_rows() {
        let mut req = config_request();
        req.row_count = 0;
        let err = req.validate().unwrap_err();
        assert!(matches!(err, FloorError::Validation(ref m) if m.contains("row_count")));
    }

    #[test]
    fn test_config_request_rejects_duplicate_layout_process() {
        let mut req = config_request();
        req.layouts = Some(vec![
            LayoutInput { process_id: 1, is_display: true, order: 0 },
            LayoutInput { process_id: 1, is_display: false, order: 1 },
        ]);
        assert!(matches!(req.validate(), Err(FloorError::Validation(_))));
    }

    #[test]
    fn test_config_request_rejects_negative_order() {
        let mut req = config_request();
        req.layouts = Some(vec![LayoutInput { process_id: 1, is_display: true, order: -1 }]);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_config_request_layouts_default_to_none() {
        let req: UpdateAndonConfigRequest = serde_json::from_value(serde_json::json!({
            "row_count": 2, "column_count": 3, "auto_play": true, "auto_play_speed": 5,
            "item_column_count": 1, "is_show_part_number": false, "is_show_start": false,
            "is_show_good_rate": false, "is_show_plan_count": false,
            "is_show_achievement_rate": false
        }))
        .unwrap();
        assert!(req.layouts.is_none());
    }

    #[test]
    fn test_line_worker_request_rejects_empty() {
        let req = UpdateLineWorkerRequest { lines: vec![] };
        assert!(req.validate(&[1, 2]).is_err());
    }

    #[test]
    fn test_line_worker_request_rejects_duplicate_lines() {
        let req = UpdateLineWorkerRequest {
            lines: vec![
                LineWorkerInput { line_id: 1, worker_id: Some(1) },
                LineWorkerInput { line_id: 1, worker_id: Some(2) },
            ],
        };
        assert!(req.validate(&[1]).is_err());
    }

    #[test]
    fn test_line_worker_request_rejects_foreign_line() {
        let req = UpdateLineWorkerRequest {
            lines: vec![LineWorkerInput { line_id: 9, worker_id: None }],
        };
        let err = req.validate(&[1, 2]).unwrap_err();
        assert!(err.to_string().contains("does not belong"));
    }

    #[test]
    fn test_line_worker_request_allows_unassignment() {
        let req: UpdateLineWorkerRequest = serde_json::from_value(serde_json::json!({
            "lines": [{"line_id": 1, "worker_id": null}, {"line_id": 2}]
        }))
        .unwrap();
        assert_eq!(req.lines[0].worker_id, None);
        assert_eq!(req.lines[1].worker_id, None);
        assert!(req.validate(&[1, 2]).is_ok());
    }

    #[test]
    fn test_blank_worker_name_rejected() {
        let req = CreateWorkerRequest {
            name: "  ".into(),
            identification_number: "W-1".into(),
        };
        assert!(req.validate().is_err());
    }
}
