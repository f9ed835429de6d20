//! Google Calendar REST 客户端（v3）
//!
//! - freeBusy：POST /freeBusy
//! - 创建事件：POST /calendars/{id}/events
//! - 即将到来的事件：GET /calendars/{id}/events?singleEvents=true&orderBy=startTime
//! - 连通性检查：GET /calendars/{id}
//!
//! 鉴权只接受已获取的 Bearer Token（OAuth 流程与 Token 持久化不在本客户端职责内）。
//! 所有时间按配置的固定 UTC 偏移与 NaiveDateTime 互转。
//! 只读请求按 RetryPolicy 重试；创建事件不是幂等操作，只发送一次。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::calendar::{CalendarClient, CalendarError, CalendarEvent, CreatedEvent, NewEvent};
use crate::core::retry::RetryPolicy;
use crate::scheduling::BusyInterval;

pub const GOOGLE_CALENDAR_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

pub struct GoogleCalendarClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
    offset: FixedOffset,
    timeout: Duration,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct FreeBusyResponse {
    #[serde(default)]
    calendars: HashMap<String, FreeBusyCalendar>,
}

#[derive(Debug, Deserialize)]
struct FreeBusyCalendar {
    #[serde(default)]
    busy: Vec<RawPeriod>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawPeriod {
    start: String,
    end: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertedEvent {
    id: String,
    html_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CalendarMetadata {
    id: String,
}

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    summary: Option<String>,
    start: RawEventTime,
    end: RawEventTime,
}

/// 定时事件给 dateTime，全天事件只给 date
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEventTime {
    date_time: Option<String>,
    date: Option<String>,
}

impl GoogleCalendarClient {
    pub fn new(
        base_url: Option<&str>,
        access_token: impl Into<String>,
        utc_offset_minutes: i32,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, CalendarError> {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
            CalendarError::InvalidRequest(format!("invalid UTC offset: {utc_offset_minutes} minutes"))
        })?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CalendarError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or(GOOGLE_CALENDAR_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            access_token: access_token.into(),
            offset,
            timeout,
            retry,
        })
    }

    fn format_time(&self, t: NaiveDateTime) -> Result<String, CalendarError> {
        self.offset
            .from_local_datetime(&t)
            .single()
            .map(|dt| dt.to_rfc3339())
            .ok_or_else(|| CalendarError::InvalidRequest(format!("unrepresentable time {t}")))
    }

    fn parse_time(&self, s: &str) -> Result<NaiveDateTime, CalendarError> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&self.offset).naive_local())
            .map_err(|e| CalendarError::Decode(format!("bad timestamp '{s}': {e}")))
    }

    fn event_time(&self, t: &RawEventTime) -> Result<NaiveDateTime, CalendarError> {
        match (&t.date_time, &t.date) {
            (Some(dt), _) => self.parse_time(dt),
            (None, Some(d)) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
                .map_err(|e| CalendarError::Decode(format!("bad date '{d}': {e}"))),
            (None, None) => Err(CalendarError::Decode("event without start/end".into())),
        }
    }

    fn map_reqwest(&self, e: reqwest::Error) -> CalendarError {
        if e.is_timeout() {
            CalendarError::Timeout {
                after_ms: self.timeout.as_millis() as u64,
            }
        } else if e.is_decode() {
            CalendarError::Decode(e.to_string())
        } else {
            CalendarError::Network(e.to_string())
        }
    }

    /// 发送请求并解析 JSON；瞬时失败（超时、网络、429/5xx）按给定策略重试
    async fn send_json<T, F>(&self, retry: &RetryPolicy, build: F) -> Result<T, CalendarError>
    where
        T: DeserializeOwned,
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        let build = &build;
        let this = self;
        retry
            .run("calendar", || async move {
                let response = build(&this.http)
                    .bearer_auth(&this.access_token)
                    .send()
                    .await
                    .map_err(|e| this.map_reqwest(e))?;
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(CalendarError::Http {
                        status: status.as_u16(),
                        body,
                    });
                }
                response.json::<T>().await.map_err(|e| this.map_reqwest(e))
            })
            .await
    }
}

#[async_trait]
impl CalendarClient for GoogleCalendarClient {
    async fn query_free_busy(
        &self,
        calendar_id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<BusyInterval>, CalendarError> {
        let url = format!("{}/freeBusy", self.base_url);
        let body = json!({
            "timeMin": self.format_time(start)?,
            "timeMax": self.format_time(end)?,
            "items": [{ "id": calendar_id }],
        });
        let response: FreeBusyResponse = self.send_json(&self.retry, |c| c.post(&url).json(&body)).await?;

        let calendar = response.calendars.get(calendar_id).ok_or_else(|| {
            CalendarError::Decode(format!("calendar '{calendar_id}' missing from freeBusy response"))
        })?;
        if let Some(err) = calendar.errors.first() {
            return Err(CalendarError::Http {
                status: 404,
                body: err.to_string(),
            });
        }

        let busy = calendar
            .busy
            .iter()
            .map(|p| Ok(BusyInterval::new(self.parse_time(&p.start)?, self.parse_time(&p.end)?)))
            .collect::<Result<Vec<_>, CalendarError>>()?;
        tracing::debug!(calendar_id, busy = busy.len(), "freeBusy query");
        Ok(busy)
    }

    async fn create_event(&self, calendar_id: &str, event: &NewEvent) -> Result<CreatedEvent, CalendarError> {
        let url = format!("{}/calendars/{}/events", self.base_url, calendar_id);
        let body = json!({
            "summary": event.title,
            "description": event.description.clone().unwrap_or_default(),
            "start": { "dateTime": self.format_time(event.start)? },
            "end": { "dateTime": self.format_time(event.end)? },
        });
        // 服务端可能已写入但响应丢失，重试会重复预订
        let inserted: InsertedEvent = self
            .send_json(&RetryPolicy::none(), |c| c.post(&url).json(&body))
            .await?;
        tracing::info!(calendar_id, event_id = %inserted.id, "event created");
        Ok(CreatedEvent {
            id: inserted.id,
            link: inserted.html_link,
        })
    }

    async fn list_upcoming(
        &self,
        calendar_id: &str,
        from: NaiveDateTime,
        max_results: usize,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        let url = format!("{}/calendars/{}/events", self.base_url, calendar_id);
        let query = [
            ("timeMin", self.format_time(from)?),
            ("maxResults", max_results.to_string()),
            ("singleEvents", "true".to_string()),
            ("orderBy", "startTime".to_string()),
        ];
        let list: EventList = self.send_json(&self.retry, |c| c.get(&url).query(&query)).await?;
        list.items
            .iter()
            .map(|e| {
                Ok(CalendarEvent {
                    id: e.id.clone(),
                    title: e.summary.clone().unwrap_or_else(|| "No Title".to_string()),
                    start: self.event_time(&e.start)?,
                    end: self.event_time(&e.end)?,
                })
            })
            .collect::<Result<Vec<_>, CalendarError>>()
    }

    async fn check_connection(&self, calendar_id: &str) -> Result<(), CalendarError> {
        let url = format!("{}/calendars/{}", self.base_url, calendar_id);
        let metadata: CalendarMetadata = self.send_json(&self.retry, |c| c.get(&url)).await?;
        tracing::info!(calendar = %metadata.id, "calendar connected");
        Ok(())
    }
}
