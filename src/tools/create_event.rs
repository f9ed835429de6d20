//! create_event 工具：在日历中创建单个事件

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use serde_json::{json, Map, Value};

use crate::calendar::{CalendarClient, NewEvent};
use crate::core::AgentError;
use crate::scheduling::{is_date_only, parse_date_time};
use crate::tools::find_free_slots::SLOT_FORMAT;
use crate::tools::schema::{ParamSpec, ParamType};
use crate::tools::{arg_i64, arg_str, invalid_argument, Tool};

pub struct CreateEventTool {
    calendar: Arc<dyn CalendarClient>,
    calendar_id: String,
    utc_offset_minutes: i32,
}

impl CreateEventTool {
    pub fn new(calendar: Arc<dyn CalendarClient>, calendar_id: impl Into<String>) -> Self {
        Self {
            calendar,
            calendar_id: calendar_id.into(),
            utc_offset_minutes: 0,
        }
    }

    pub fn with_utc_offset(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    fn build_event(&self, args: &Map<String, Value>) -> Result<NewEvent, AgentError> {
        let title = arg_str(args, "title").map(str::trim).unwrap_or_default();
        if title.is_empty() {
            return Err(invalid_argument(self.name(), "title", "must not be empty"));
        }

        let start_raw = arg_str(args, "start").unwrap_or_default();
        if is_date_only(start_raw) {
            return Err(invalid_argument(
                self.name(),
                "start",
                "must include a time of day (YYYY-MM-DD HH:MM)",
            ));
        }
        let start = parse_date_time(start_raw, self.utc_offset_minutes)
            .ok_or_else(|| invalid_argument(self.name(), "start", "not a date-time"))?;

        let duration = arg_i64(args, "duration_minutes").unwrap_or(0);
        if duration <= 0 || duration > 24 * 60 {
            return Err(invalid_argument(
                self.name(),
                "duration_minutes",
                "must be between 1 and 1440 minutes",
            ));
        }

        let description = arg_str(args, "description")
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        Ok(NewEvent {
            title: title.to_string(),
            description,
            start,
            end: start + Duration::minutes(duration),
        })
    }
}

#[async_trait]
impl Tool for CreateEventTool {
    fn name(&self) -> &str {
        "create_event"
    }

    fn description(&self) -> &str {
        "Book a single event in the user's calendar. Only call this after the user has confirmed the time."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("title", ParamType::String, "Event title"),
            ParamSpec::required("start", ParamType::Date, "Start date-time, YYYY-MM-DD HH:MM"),
            ParamSpec::required("duration_minutes", ParamType::Integer, "Event length in minutes"),
            ParamSpec::optional("description", ParamType::String, "Optional event description"),
        ]
    }

    fn completes_action(&self) -> bool {
        true
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let event = self.build_event(args)?;
        let created = self.calendar.create_event(&self.calendar_id, &event).await?;
        tracing::info!(event_id = %created.id, title = %event.title, "event created");
        let mut payload = json!({
            "status": "booked",
            "event_id": created.id,
            "title": event.title,
            "start": event.start.format(SLOT_FORMAT).to_string(),
            "end": event.end.format(SLOT_FORMAT).to_string(),
        });
        if let Some(link) = created.link {
            payload["event_link"] = Value::String(link);
        }
        Ok(payload)
    }
}
