//! 工具参数 Schema 与校验
//!
//! 每个工具声明参数列表（名称、类型、是否必填）；dispatch 前按声明严格校验，
//! 不合法时返回 SchemaValidation，handler 不会被调用。
//! 工具调用信封的 JSON Schema 由 schemars 生成，拼入 system prompt 以减少模型格式错误。

use std::collections::HashMap;

use schemars::{schema_for, JsonSchema};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::core::AgentError;
use crate::scheduling::{parse_date_time, parse_time_of_day};

/// 参数类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    /// 任意 JSON 数字
    Number,
    /// JSON 整数（30 合法，30.5 与 "30" 均不合法）
    Integer,
    /// `YYYY-MM-DD`、`YYYY-MM-DD HH:MM` 或 RFC 3339
    Date,
    /// 时刻：`HH:MM` 或 `H:MM AM/PM`
    Time,
    Boolean,
}

impl ParamType {
    /// 检查取值是否符合类型；不符合时返回原因
    fn check(&self, value: &Value) -> Result<(), String> {
        let ok = match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Date => {
                return match value.as_str() {
                    Some(s) if parse_date_time(s, 0).is_some() => Ok(()),
                    Some(s) => Err(format!("'{s}' is not a date (expected YYYY-MM-DD or YYYY-MM-DD HH:MM)")),
                    None => Err(format!("expected a date string, got {}", json_type(value))),
                };
            }
            ParamType::Time => {
                return match value.as_str() {
                    Some(s) if parse_time_of_day(s).is_some() => Ok(()),
                    Some(s) => Err(format!("'{s}' is not a time of day (expected HH:MM)")),
                    None => Err(format!("expected a time string, got {}", json_type(value))),
                };
            }
        };
        if ok {
            Ok(())
        } else {
            Err(format!(
                "expected {}, got {}",
                self.json_name(),
                json_type(value)
            ))
        }
    }

    fn json_name(&self) -> &'static str {
        match self {
            ParamType::String | ParamType::Date | ParamType::Time => "string",
            ParamType::Number => "number",
            ParamType::Integer => "integer",
            ParamType::Boolean => "boolean",
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// 单个参数声明
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub required: bool,
    pub description: String,
}

impl ParamSpec {
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            required: true,
            description: description.to_string(),
        }
    }

    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }
}

/// 按声明校验参数：必填项存在、无未知参数、类型匹配。可选参数传 null 视为未传。
pub fn validate_arguments(
    tool: &str,
    specs: &[ParamSpec],
    args: &Map<String, Value>,
) -> Result<(), AgentError> {
    let fail = |field: &str, reason: String| AgentError::SchemaValidation {
        tool: tool.to_string(),
        field: field.to_string(),
        reason,
    };

    for spec in specs.iter().filter(|s| s.required) {
        match args.get(&spec.name) {
            None | Some(Value::Null) => {
                return Err(fail(spec.name.as_str(), "required parameter is missing".to_string()))
            }
            Some(_) => {}
        }
    }

    let by_name: HashMap<&str, &ParamSpec> = specs.iter().map(|s| (s.name.as_str(), s)).collect();
    for (key, value) in args {
        let spec = by_name
            .get(key.as_str())
            .ok_or_else(|| fail(key.as_str(), "unknown parameter".to_string()))?;
        if value.is_null() && !spec.required {
            continue;
        }
        spec.param_type.check(value).map_err(|reason| fail(key.as_str(), reason))?;
    }
    Ok(())
}

/// 参数声明 → JSON Schema 对象（供 prompt 展示）
pub fn parameters_json(specs: &[ParamSpec]) -> Value {
    let properties: Map<String, Value> = specs
        .iter()
        .map(|s| {
            let mut prop = json!({
                "type": s.param_type.json_name(),
                "description": s.description,
            });
            match s.param_type {
                ParamType::Date => prop["format"] = json!("date or date-time (YYYY-MM-DD[ HH:MM])"),
                ParamType::Time => prop["format"] = json!("time of day (HH:MM)"),
                _ => {}
            }
            (s.name.clone(), prop)
        })
        .collect();
    let required: Vec<&str> = specs
        .iter()
        .filter(|s| s.required)
        .map(|s| s.name.as_str())
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// 工具调用信封格式：`{"tool_call": {"tool": "...", "arguments": {...}}}`（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallEnvelope {
    tool_call: ToolCallBody,
}

#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallBody {
    /// 工具名，如 find_free_slots、create_event
    tool: String,
    /// 工具参数，依工具不同而不同
    arguments: HashMap<String, serde_json::Value>,
}

/// 返回工具调用信封的 JSON Schema 字符串，可拼入 system prompt
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCallEnvelope);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
