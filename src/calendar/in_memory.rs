//! 内存日历：测试替身与离线演示
//!
//! 忙碌区间 = 预置区间 + 已创建事件；可配置为每次调用都失败，用于验证错误路径。

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::calendar::{CalendarClient, CalendarError, CalendarEvent, CreatedEvent, NewEvent};
use crate::scheduling::BusyInterval;

#[derive(Debug, Default)]
pub struct InMemoryCalendar {
    busy: Vec<BusyInterval>,
    events: Mutex<Vec<CalendarEvent>>,
    failure: Option<CalendarError>,
}

impl InMemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_busy(mut self, busy: Vec<BusyInterval>) -> Self {
        self.busy = busy;
        self
    }

    /// 所有调用都返回该错误
    pub fn failing(error: CalendarError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<CalendarEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    fn check_failure(&self) -> Result<(), CalendarError> {
        match &self.failure {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CalendarClient for InMemoryCalendar {
    async fn query_free_busy(
        &self,
        _calendar_id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<BusyInterval>, CalendarError> {
        self.check_failure()?;
        let booked: Vec<BusyInterval> = self
            .events()
            .into_iter()
            .map(|e| BusyInterval::new(e.start, e.end))
            .collect();
        Ok(self
            .busy
            .iter()
            .copied()
            .chain(booked)
            .filter(|b| b.start < end && b.end > start)
            .collect())
    }

    async fn create_event(&self, _calendar_id: &str, event: &NewEvent) -> Result<CreatedEvent, CalendarError> {
        self.check_failure()?;
        if event.start >= event.end {
            return Err(CalendarError::InvalidRequest("event end must be after start".into()));
        }
        let mut events = self
            .events
            .lock()
            .map_err(|_| CalendarError::Network("calendar state poisoned".into()))?;
        let id = format!("evt-{}", events.len() + 1);
        events.push(CalendarEvent {
            id: id.clone(),
            title: event.title.clone(),
            start: event.start,
            end: event.end,
        });
        Ok(CreatedEvent { id, link: None })
    }

    async fn list_upcoming(
        &self,
        _calendar_id: &str,
        from: NaiveDateTime,
        max_results: usize,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        self.check_failure()?;
        let mut upcoming: Vec<CalendarEvent> =
            self.events().into_iter().filter(|e| e.end > from).collect();
        upcoming.sort_by_key(|e| e.start);
        upcoming.truncate(max_results);
        Ok(upcoming)
    }

    async fn check_connection(&self, _calendar_id: &str) -> Result<(), CalendarError> {
        self.check_failure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[tokio::test]
    async fn test_created_events_become_busy() {
        let cal = InMemoryCalendar::new()
            .with_busy(vec![BusyInterval::new(at("2025-06-24 09:00"), at("2025-06-24 10:00"))]);
        let id = cal
            .create_event(
                "primary",
                &NewEvent {
                    title: "Sync".into(),
                    description: None,
                    start: at("2025-06-24 14:00"),
                    end: at("2025-06-24 14:30"),
                },
            )
            .await
            .unwrap();
        assert_eq!(id.id, "evt-1");
        assert!(id.link.is_none());

        let busy = cal
            .query_free_busy("primary", at("2025-06-24 00:00"), at("2025-06-25 00:00"))
            .await
            .unwrap();
        assert_eq!(busy.len(), 2);

        let outside = cal
            .query_free_busy("primary", at("2025-06-25 00:00"), at("2025-06-26 00:00"))
            .await
            .unwrap();
        assert!(outside.is_empty());
    }

    #[tokio::test]
    async fn test_failing_calendar() {
        let cal = InMemoryCalendar::failing(CalendarError::Http {
            status: 500,
            body: "boom".into(),
        });
        assert!(cal
            .list_upcoming("primary", at("2025-06-24 00:00"), 5)
            .await
            .is_err());
        assert!(cal.check_connection("primary").await.is_err());
        assert!(InMemoryCalendar::new().check_connection("primary").await.is_ok());
    }
}
