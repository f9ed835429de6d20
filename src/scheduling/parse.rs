//! 日期 / 时刻解析
//!
//! 模型给出的参数格式并不统一：`2025-06-24`、`2025-06-24 14:00`、`2025-06-24T14:00:00`、RFC 3339，
//! 时刻则可能是 `14:00` 或 `2:00 PM`。这里统一转换为日历本地时区的 NaiveDateTime / NaiveTime。

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

const TIME_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p"];

/// 解析日期或日期时间；纯日期取当天 00:00。
/// 带偏移的 RFC 3339 时间先换算到 UTC，再换算到日历的 UTC 偏移（分钟）；无偏移的输入视为日历本地时间。
pub fn parse_date_time(input: &str, utc_offset_minutes: i32) -> Option<NaiveDateTime> {
    let s = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc() + Duration::minutes(i64::from(utc_offset_minutes)));
    }
    for fmt in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    parse_date(s).map(|d| d.and_time(NaiveTime::MIN))
}

/// 仅解析 `YYYY-MM-DD`
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").ok()
}

/// 输入是否只含日期部分（用于决定查询范围是否取整天）
pub fn is_date_only(input: &str) -> bool {
    parse_date(input).is_some()
}

/// 解析时刻：24 小时制或 12 小时制（AM/PM 大小写不敏感）
pub fn parse_time_of_day(input: &str) -> Option<NaiveTime> {
    let s = input.trim().to_uppercase();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(&s, fmt).ok())
}
