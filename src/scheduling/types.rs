//! 排期数据模型：BusyInterval / SlotRequest / FreeSlot
//!
//! 时间统一使用日历本地时区下的 NaiveDateTime（时区换算在日历客户端边界完成）。

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// 日历返回的忙碌区间；集合可能重叠、无序，SlotFinder 内部会归一化
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl BusyInterval {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }
}

/// 一次空闲时段查询
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotRequest {
    pub duration_minutes: u32,
    pub range_start: NaiveDateTime,
    pub range_end: NaiveDateTime,
    /// 每日可用窗口起点（如 09:00）
    pub earliest_time_of_day: NaiveTime,
    /// 每日可用窗口终点（如 17:00）
    pub latest_time_of_day: NaiveTime,
    pub exclude_weekends: bool,
}

impl SlotRequest {
    /// 默认窗口为整天（00:00 ~ 23:59:59），不排除周末
    pub fn new(duration_minutes: u32, range_start: NaiveDateTime, range_end: NaiveDateTime) -> Self {
        Self {
            duration_minutes,
            range_start,
            range_end,
            earliest_time_of_day: NaiveTime::MIN,
            latest_time_of_day: end_of_day(),
            exclude_weekends: false,
        }
    }

    pub fn with_daily_window(mut self, earliest: NaiveTime, latest: NaiveTime) -> Self {
        self.earliest_time_of_day = earliest;
        self.latest_time_of_day = latest;
        self
    }

    pub fn with_exclude_weekends(mut self, exclude: bool) -> Self {
        self.exclude_weekends = exclude;
        self
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.duration_minutes))
    }
}

/// 可供预约的连续空闲时段（未按会议时长切片，由调用方在其中选择起点）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeSlot {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl FreeSlot {
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}
