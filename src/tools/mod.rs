pub mod create_event;
pub mod dispatcher;
pub mod find_free_slots;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod upcoming_events;

use serde_json::{Map, Value};

use crate::core::AgentError;

pub use create_event::CreateEventTool;
pub use dispatcher::{DispatchOutcome, ToolDispatcher, ToolResult};
pub use find_free_slots::{FindFreeSlotsTool, SlotDefaults};
pub use protocol::{parse_model_output, ModelReply, ToolCall};
pub use registry::{Tool, ToolRegistry};
pub use schema::{tool_call_schema_json, ParamSpec, ParamType};
pub use upcoming_events::UpcomingEventsTool;

pub(crate) fn arg_str<'a>(args: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    args.get(name).and_then(|v| v.as_str())
}

pub(crate) fn arg_i64(args: &Map<String, Value>, name: &str) -> Option<i64> {
    args.get(name).and_then(|v| v.as_i64())
}

pub(crate) fn arg_bool(args: &Map<String, Value>, name: &str) -> Option<bool> {
    args.get(name).and_then(|v| v.as_bool())
}

/// handler 内部发现的取值错误（类型正确但语义不合法）
pub(crate) fn invalid_argument(tool: &str, field: &str, reason: &str) -> AgentError {
    AgentError::SchemaValidation {
        tool: tool.to_string(),
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
