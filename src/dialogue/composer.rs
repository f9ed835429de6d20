//! ResponseComposer：固定模板的回复文本
//!
//! 工具结果、错误与最终结果都在这里转成适合朗读的句子。

use chrono::NaiveDateTime;
use serde_json::Value;

use crate::core::orchestrator::AgentOutcome;
use crate::core::recovery::RecoveryEngine;
use crate::core::{AgentError, RecoveryAction};
use crate::tools::find_free_slots::SLOT_FORMAT;
use crate::tools::ToolResult;

pub struct ResponseComposer {
    max_reported: usize,
    recovery: RecoveryEngine,
}

impl ResponseComposer {
    pub fn new(max_reported: usize) -> Self {
        Self {
            max_reported: max_reported.max(1),
            recovery: RecoveryEngine::new(),
        }
    }

    pub fn greeting(&self) -> String {
        "Hello! I'm your Smart Scheduler assistant. I can find open times and book meetings in your calendar. \
         What would you like to schedule?"
            .to_string()
    }

    pub fn farewell(&self) -> String {
        "Goodbye! Have a great day!".to_string()
    }

    /// 工具结果的朗读摘要
    pub fn summarize(&self, result: &ToolResult) -> String {
        match &result.outcome {
            Ok(payload) => self.summarize_payload(payload),
            Err(e) => self.apology(e),
        }
    }

    fn summarize_payload(&self, payload: &Value) -> String {
        match payload["status"].as_str() {
            Some("no_slots") => self.no_slots(payload),
            Some("booked") => self.booked(payload),
            Some("success") if payload.get("slots").is_some() => self.slots_found(payload),
            Some("success") if payload.get("events").is_some() => self.upcoming(payload),
            _ => "Done.".to_string(),
        }
    }

    fn slots_found(&self, payload: &Value) -> String {
        let slots = payload["slots"].as_array().cloned().unwrap_or_default();
        let total = payload["total_found"].as_u64().unwrap_or(slots.len() as u64) as usize;
        let listed: Vec<String> = slots
            .iter()
            .take(self.max_reported)
            .map(|s| speak_range(s["start"].as_str().unwrap_or_default(), s["end"].as_str().unwrap_or_default()))
            .collect();
        let noun = if total == 1 { "slot" } else { "slots" };
        let mut text = format!("I found {total} open {noun}: {}", listed.join("; "));
        if total > listed.len() {
            text.push_str(&format!("; and {} more", total - listed.len()));
        }
        text.push('.');
        text
    }

    fn no_slots(&self, payload: &Value) -> String {
        let suggestion = payload["suggestion"]
            .as_str()
            .unwrap_or("Would another date work?");
        match payload["duration_minutes"].as_u64() {
            Some(minutes) => format!("I couldn't find a {minutes}-minute opening in that range. {suggestion}"),
            None => format!("I couldn't find an opening in that range. {suggestion}"),
        }
    }

    fn booked(&self, payload: &Value) -> String {
        let title = payload["title"].as_str().unwrap_or("your meeting");
        format!(
            "Booked \"{title}\" for {}.",
            speak_range(
                payload["start"].as_str().unwrap_or_default(),
                payload["end"].as_str().unwrap_or_default()
            )
        )
    }

    fn upcoming(&self, payload: &Value) -> String {
        let events = payload["events"].as_array().cloned().unwrap_or_default();
        if events.is_empty() {
            return "You have no upcoming events.".to_string();
        }
        let listed: Vec<String> = events
            .iter()
            .map(|e| {
                format!(
                    "{} on {}",
                    e["title"].as_str().unwrap_or("(untitled)"),
                    speak_time(e["start"].as_str().unwrap_or_default())
                )
            })
            .collect();
        format!("Your upcoming events: {}.", listed.join("; "))
    }

    /// 错误的致歉文本
    pub fn apology(&self, err: &AgentError) -> String {
        match self.recovery.handle(err) {
            RecoveryAction::SurfaceToUser(text) => text,
            RecoveryAction::RetryWithPrompt(_) => {
                "Sorry, I didn't catch all the details. Could you rephrase that?".to_string()
            }
            RecoveryAction::FailTurn => "Sorry, I couldn't complete that request. Please try again.".to_string(),
            RecoveryAction::Abort => "Sorry, I'm not configured correctly and have to stop.".to_string(),
        }
    }

    /// 最终朗读文本
    pub fn render(&self, outcome: &AgentOutcome) -> String {
        match outcome {
            AgentOutcome::SpokenReply(text)
            | AgentOutcome::ClarificationNeeded(text)
            | AgentOutcome::ActionCompleted(text) => text.clone(),
            AgentOutcome::Error(reason) => format!("Sorry, something went wrong: {reason}."),
        }
    }
}

impl Default for ResponseComposer {
    fn default() -> Self {
        Self::new(6)
    }
}

fn parse_slot_time(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, SLOT_FORMAT).ok()
}

fn speak_time(s: &str) -> String {
    match parse_slot_time(s) {
        Some(t) => t.format("%A %B %-d at %-I:%M %p").to_string(),
        None => s.to_string(),
    }
}

fn speak_range(start: &str, end: &str) -> String {
    match (parse_slot_time(start), parse_slot_time(end)) {
        (Some(s), Some(e)) if s.date() == e.date() => format!(
            "{} from {} to {}",
            s.format("%A %B %-d"),
            s.format("%-I:%M %p"),
            e.format("%-I:%M %p")
        ),
        (Some(s), Some(e)) => format!(
            "{} to {}",
            s.format("%A %B %-d %-I:%M %p"),
            e.format("%A %B %-d %-I:%M %p")
        ),
        _ => format!("{start} to {end}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(tool: &str, payload: Value) -> ToolResult {
        ToolResult {
            call_id: "c-1".into(),
            tool: tool.into(),
            outcome: Ok(payload),
            completed_action: false,
            cause_kind: None,
        }
    }

    #[test]
    fn test_slots_summary() {
        let composer = ResponseComposer::new(2);
        let text = composer.summarize(&ok(
            "find_free_slots",
            json!({
                "status": "success",
                "duration_minutes": 30,
                "total_found": 3,
                "slots": [
                    {"start": "2025-06-24 08:00", "end": "2025-06-24 09:00"},
                    {"start": "2025-06-24 10:00", "end": "2025-06-24 18:00"},
                    {"start": "2025-06-25 08:00", "end": "2025-06-25 18:00"}
                ]
            }),
        ));
        assert_eq!(
            text,
            "I found 3 open slots: Tuesday June 24 from 8:00 AM to 9:00 AM; \
             Tuesday June 24 from 10:00 AM to 6:00 PM; and 1 more."
        );
    }

    #[test]
    fn test_no_slots_and_booked() {
        let composer = ResponseComposer::default();
        let none = composer.summarize(&ok(
            "find_free_slots",
            json!({"status": "no_slots", "duration_minutes": 60, "suggestion": "Try another date."}),
        ));
        assert_eq!(none, "I couldn't find a 60-minute opening in that range. Try another date.");

        let booked = composer.summarize(&ok(
            "create_event",
            json!({"status": "booked", "title": "Sync", "start": "2025-06-24 14:00", "end": "2025-06-24 14:30"}),
        ));
        assert_eq!(booked, "Booked \"Sync\" for Tuesday June 24 from 2:00 PM to 2:30 PM.");
    }

    #[test]
    fn test_upcoming_summary() {
        let composer = ResponseComposer::default();
        let empty = composer.summarize(&ok("list_upcoming_events", json!({"status": "success", "events": []})));
        assert_eq!(empty, "You have no upcoming events.");
    }

    #[test]
    fn test_apologies() {
        let composer = ResponseComposer::default();
        let exec = composer.apology(&AgentError::ToolExecution {
            tool: "find_free_slots".into(),
            cause: "HTTP 500".into(),
        });
        assert!(exec.starts_with("Sorry"));
        assert!(!exec.contains("HTTP 500"));

        let schema = composer.apology(&AgentError::SchemaValidation {
            tool: "t".into(),
            field: "f".into(),
            reason: "r".into(),
        });
        assert!(schema.contains("rephrase"));
    }

    #[test]
    fn test_render_outcomes() {
        let composer = ResponseComposer::default();
        assert_eq!(composer.render(&AgentOutcome::SpokenReply("Hi".into())), "Hi");
        assert!(composer
            .render(&AgentOutcome::Error("could not complete request".into()))
            .contains("could not complete request"));
    }
}
