//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters / execute），由 ToolRegistry 按名注册与查找；
//! validate 在 dispatch 前按参数声明校验调用，ToolDispatcher 负责超时与错误归一化。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::core::AgentError;
use crate::tools::protocol::ToolCall;
use crate::tools::schema::{parameters_json, validate_arguments, ParamSpec};

/// 工具 trait：名称、描述（供模型理解）、参数声明、异步执行
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（对应信封中的 "tool" 字段）
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 参数声明；dispatch 前据此严格校验
    fn parameters(&self) -> Vec<ParamSpec>;

    /// 成功执行即完成用户请求的动作（如创建事件）
    fn completes_action(&self) -> bool {
        false
    }

    /// 执行工具。参数已通过校验；返回结构化结果供模型阅读
    async fn execute(&self, args: &Map<String, Value>) -> Result<Value, AgentError>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// 校验调用：工具存在且参数符合声明。返回要执行的工具
    pub fn validate(&self, call: &ToolCall) -> Result<Arc<dyn Tool>, AgentError> {
        let tool = self.get(&call.tool).ok_or_else(|| AgentError::SchemaValidation {
            tool: call.tool.clone(),
            field: "tool".to_string(),
            reason: format!(
                "unknown tool; available tools: {}",
                self.tool_names().join(", ")
            ),
        })?;
        validate_arguments(&call.tool, &tool.parameters(), &call.arguments)?;
        Ok(tool)
    }

    /// 按名称排序的工具 schema JSON，拼入 system prompt
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<Value> = self
            .tool_names()
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "parameters": parameters_json(&tool.parameters()),
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::schema::ParamType;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the text back"
        }

        fn parameters(&self) -> Vec<ParamSpec> {
            vec![ParamSpec::required("text", ParamType::String, "text to echo")]
        }

        async fn execute(&self, args: &Map<String, Value>) -> Result<Value, AgentError> {
            Ok(args["text"].clone())
        }
    }

    fn call(tool: &str, args: Value) -> ToolCall {
        ToolCall::new(tool, args.as_object().cloned().unwrap())
    }

    #[test]
    fn test_validate_unknown_tool() {
        let mut reg = ToolRegistry::new();
        reg.register(Echo);
        let err = reg.validate(&call("shout", json!({}))).err().unwrap();
        match err {
            AgentError::SchemaValidation { tool, field, reason } => {
                assert_eq!(tool, "shout");
                assert_eq!(field, "tool");
                assert!(reason.contains("echo"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_validate_arguments_via_registry() {
        let mut reg = ToolRegistry::new();
        reg.register(Echo);
        assert!(reg.validate(&call("echo", json!({"text": "hi"}))).is_ok());
        assert!(matches!(
            reg.validate(&call("echo", json!({"text": 3}))),
            Err(AgentError::SchemaValidation { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_and_execute() {
        let mut reg = ToolRegistry::new();
        reg.register(Echo);
        let tool = reg.get("echo").unwrap();
        assert!(!tool.completes_action());
        let args = json!({"text": "hello"}).as_object().cloned().unwrap();
        assert_eq!(tool.execute(&args).await.unwrap(), json!("hello"));
    }

    #[test]
    fn test_schema_json_lists_tools() {
        let mut reg = ToolRegistry::new();
        reg.register(Echo);
        let schema: Value = serde_json::from_str(&reg.to_schema_json()).unwrap();
        assert_eq!(schema[0]["name"], "echo");
        assert_eq!(schema[0]["parameters"]["required"], json!(["text"]));
    }
}
