//! list_upcoming_events 工具：列出即将到来的事件

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime, Utc};
use serde_json::{json, Map, Value};

use crate::calendar::CalendarClient;
use crate::core::AgentError;
use crate::tools::find_free_slots::SLOT_FORMAT;
use crate::tools::schema::{ParamSpec, ParamType};
use crate::tools::{arg_i64, Tool};

const DEFAULT_MAX_RESULTS: i64 = 10;
const MAX_RESULTS_LIMIT: i64 = 50;

pub struct UpcomingEventsTool {
    calendar: Arc<dyn CalendarClient>,
    calendar_id: String,
    utc_offset_minutes: i32,
}

impl UpcomingEventsTool {
    pub fn new(calendar: Arc<dyn CalendarClient>, calendar_id: impl Into<String>, utc_offset_minutes: i32) -> Self {
        Self {
            calendar,
            calendar_id: calendar_id.into(),
            utc_offset_minutes,
        }
    }

    /// 日历本地时区的当前时间
    fn now(&self) -> NaiveDateTime {
        Utc::now().naive_utc() + Duration::minutes(i64::from(self.utc_offset_minutes))
    }
}

#[async_trait]
impl Tool for UpcomingEventsTool {
    fn name(&self) -> &str {
        "list_upcoming_events"
    }

    fn description(&self) -> &str {
        "List the user's upcoming calendar events, soonest first."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::optional(
            "max_results",
            ParamType::Integer,
            "How many events to return (default 10, at most 50)",
        )]
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let max_results = arg_i64(args, "max_results")
            .unwrap_or(DEFAULT_MAX_RESULTS)
            .clamp(1, MAX_RESULTS_LIMIT) as usize;
        let events = self
            .calendar
            .list_upcoming(&self.calendar_id, self.now(), max_results)
            .await?;
        let listed: Vec<Value> = events
            .iter()
            .map(|e| {
                json!({
                    "id": e.id,
                    "title": e.title,
                    "start": e.start.format(SLOT_FORMAT).to_string(),
                    "end": e.end.format(SLOT_FORMAT).to_string(),
                })
            })
            .collect();
        Ok(json!({
            "status": "success",
            "count": listed.len(),
            "events": listed,
        }))
    }
}
