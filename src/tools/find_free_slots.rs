//! find_free_slots 工具：查询日历忙碌区间并计算可用时段

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde_json::{json, Map, Value};

use crate::calendar::CalendarClient;
use crate::core::AgentError;
use crate::scheduling::{find_free_slots, is_date_only, parse_date_time, parse_time_of_day, FreeSlot, SlotRequest};
use crate::tools::schema::{ParamSpec, ParamType};
use crate::tools::{arg_bool, arg_i64, arg_str, invalid_argument, Tool};

pub const SLOT_FORMAT: &str = "%Y-%m-%d %H:%M";

/// 未指定时使用的时段查询参数（来自 [slots] 配置）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotDefaults {
    pub earliest: NaiveTime,
    pub latest: NaiveTime,
    pub exclude_weekends: bool,
    /// 返回给模型的最大时段数
    pub max_reported: usize,
}

impl Default for SlotDefaults {
    fn default() -> Self {
        Self {
            earliest: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            latest: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
            exclude_weekends: true,
            max_reported: 6,
        }
    }
}

pub struct FindFreeSlotsTool {
    calendar: Arc<dyn CalendarClient>,
    calendar_id: String,
    defaults: SlotDefaults,
    utc_offset_minutes: i32,
}

impl FindFreeSlotsTool {
    pub fn new(calendar: Arc<dyn CalendarClient>, calendar_id: impl Into<String>, defaults: SlotDefaults) -> Self {
        Self {
            calendar,
            calendar_id: calendar_id.into(),
            defaults,
            utc_offset_minutes: 0,
        }
    }

    /// 日历的 UTC 偏移（分钟），带偏移的时间参数按它换算
    pub fn with_utc_offset(mut self, minutes: i32) -> Self {
        self.utc_offset_minutes = minutes;
        self
    }

    fn build_request(&self, args: &Map<String, Value>) -> Result<SlotRequest, AgentError> {
        let duration = arg_i64(args, "duration_minutes").unwrap_or(0);
        if duration <= 0 || duration > 24 * 60 {
            return Err(invalid_argument(
                self.name(),
                "duration_minutes",
                "must be between 1 and 1440 minutes",
            ));
        }

        let start_raw = arg_str(args, "range_start").unwrap_or_default();
        let range_start = parse_date_time(start_raw, self.utc_offset_minutes)
            .ok_or_else(|| invalid_argument(self.name(), "range_start", "not a date"))?;

        // 未给出结束或只给出日期时，覆盖到该日结束
        let range_end = match arg_str(args, "range_end") {
            Some(raw) => {
                let end = parse_date_time(raw, self.utc_offset_minutes)
                    .ok_or_else(|| invalid_argument(self.name(), "range_end", "not a date"))?;
                if is_date_only(raw) {
                    end + Duration::days(1)
                } else {
                    end
                }
            }
            None => range_start.date().and_time(NaiveTime::MIN) + Duration::days(1),
        };
        if range_end <= range_start {
            return Err(invalid_argument(
                self.name(),
                "range_end",
                "must be after range_start",
            ));
        }

        let earliest = time_arg(self.name(), args, "earliest_time")?.unwrap_or(self.defaults.earliest);
        let latest = time_arg(self.name(), args, "latest_time")?.unwrap_or(self.defaults.latest);
        let exclude_weekends = arg_bool(args, "exclude_weekends").unwrap_or(self.defaults.exclude_weekends);

        Ok(SlotRequest::new(duration as u32, range_start, range_end)
            .with_daily_window(earliest, latest)
            .with_exclude_weekends(exclude_weekends))
    }
}

fn time_arg(tool: &str, args: &Map<String, Value>, name: &str) -> Result<Option<NaiveTime>, AgentError> {
    match arg_str(args, name) {
        None => Ok(None),
        Some(raw) => parse_time_of_day(raw)
            .map(Some)
            .ok_or_else(|| invalid_argument(tool, name, "not a time of day")),
    }
}

fn slot_json(slot: &FreeSlot) -> Value {
    json!({
        "start": slot.start.format(SLOT_FORMAT).to_string(),
        "end": slot.end.format(SLOT_FORMAT).to_string(),
    })
}

fn describe_range(start: NaiveDateTime, end: NaiveDateTime) -> String {
    format!("{} to {}", start.format(SLOT_FORMAT), end.format(SLOT_FORMAT))
}

#[async_trait]
impl Tool for FindFreeSlotsTool {
    fn name(&self) -> &str {
        "find_free_slots"
    }

    fn description(&self) -> &str {
        "Find open time slots in the user's calendar that can fit a meeting of the given length. \
         Returns whole free periods; any start inside a period that leaves room for the meeting is valid."
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::required("duration_minutes", ParamType::Integer, "Meeting length in minutes"),
            ParamSpec::required("range_start", ParamType::Date, "First day (or date-time) to search, YYYY-MM-DD"),
            ParamSpec::optional(
                "range_end",
                ParamType::Date,
                "Last day (inclusive) or date-time to search; defaults to the end of range_start's day",
            ),
            ParamSpec::optional("earliest_time", ParamType::Time, "Earliest time of day, HH:MM (default 09:00)"),
            ParamSpec::optional("latest_time", ParamType::Time, "Latest time of day, HH:MM (default 17:00)"),
            ParamSpec::optional("exclude_weekends", ParamType::Boolean, "Skip Saturdays and Sundays"),
        ]
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
        let request = self.build_request(args)?;
        let busy = self
            .calendar
            .query_free_busy(&self.calendar_id, request.range_start, request.range_end)
            .await?;
        let slots = find_free_slots(&busy, &request);
        tracing::debug!(busy = busy.len(), found = slots.len(), "slot search");

        if slots.is_empty() {
            let reason = AgentError::SlotNotFound(format!(
                "no {}-minute opening between {}",
                request.duration_minutes,
                describe_range(request.range_start, request.range_end)
            ));
            return Ok(json!({
                "status": "no_slots",
                "duration_minutes": request.duration_minutes,
                "message": reason.to_string(),
                "suggestion": "Try another date, a wider time window or a shorter meeting.",
            }));
        }

        let reported: Vec<Value> = slots.iter().take(self.defaults.max_reported).map(slot_json).collect();
        Ok(json!({
            "status": "success",
            "duration_minutes": request.duration_minutes,
            "slots": reported,
            "total_found": slots.len(),
        }))
    }
}
