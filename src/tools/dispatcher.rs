//! 工具调度器
//!
//! dispatch(name, args)：先做参数校验（在任何副作用执行前），再在超时内执行，
//! 执行失败与超时一律捕获为失败的 ToolInvocation 而非控制流错误；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::tools::{ToolError, ToolInvocation, ToolRegistry};

/// 工具调度器：持有注册表与全局超时
pub struct ToolDispatcher {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// 调度一次工具调用。
    ///
    /// - 未注册的名称返回 Err(Unknown)
    /// - 参数不满足 schema 返回 Err(ArgumentValidation)，此时工具尚未执行
    /// - 工具自身失败或超时捕获为失败的 ToolInvocation（Ok 返回），由编排层决定如何呈现
    pub async fn dispatch(&self, name: &str, args: Value) -> Result<ToolInvocation, ToolError> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| ToolError::Unknown(name.to_string()))?;

        if let Err(reason) = validate_args(&tool.parameters_schema(), &args) {
            return Err(ToolError::ArgumentValidation {
                tool: name.to_string(),
                reason,
            });
        }

        let start = Instant::now();
        let result = timeout(self.timeout, tool.execute(args.clone())).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview(&args),
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        let invocation = match result {
            Ok(Ok(payload)) => ToolInvocation::success(name, args, payload),
            Ok(Err(reason)) => ToolInvocation::failure(name, args, reason),
            Err(_) => ToolInvocation::failure(name, args, format!("{} timed out", name)),
        };
        Ok(invocation)
    }
}

/// 按声明的 schema 校验参数：args 须为对象，required 键必须存在，properties 声明的类型必须匹配
fn validate_args(schema: &Value, args: &Value) -> Result<(), String> {
    let Some(obj) = args.as_object() else {
        return Err("args must be a JSON object".to_string());
    };

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for key in required.iter().filter_map(|k| k.as_str()) {
            if !obj.contains_key(key) {
                return Err(format!("missing required argument: {}", key));
            }
        }
    }

    if let Some(props) = schema.get("properties").and_then(|p| p.as_object()) {
        for (key, value) in obj {
            let Some(expected) = props.get(key).and_then(|p| p.get("type")).and_then(|t| t.as_str())
            else {
                continue;
            };
            if !type_matches(expected, value) {
                return Err(format!(
                    "argument {} expected type {}, got {}",
                    key,
                    expected,
                    json_type_name(value)
                ));
            }
        }
    }

    Ok(())
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::tools::{EchoTool, Tool};

    /// 总是失败的工具，用于验证失败捕获
    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "Always fails (for testing)"
        }

        async fn execute(&self, _args: serde_json::Value) -> Result<String, String> {
            Err("deliberate failure".to_string())
        }
    }

    /// 声明必填参数的工具，用于验证前置校验
    struct StrictTool;

    #[async_trait]
    impl Tool for StrictTool {
        fn name(&self) -> &str {
            "strict"
        }

        fn description(&self) -> &str {
            "Requires a string city argument"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            json!({
                "type": "object",
                "properties": { "city": { "type": "string" } },
                "required": ["city"]
            })
        }

        async fn execute(&self, _args: serde_json::Value) -> Result<String, String> {
            Ok("ran".to_string())
        }
    }

    fn dispatcher_with(tool: impl Tool + 'static) -> ToolDispatcher {
        let mut registry = ToolRegistry::new();
        registry.register(tool).unwrap();
        ToolDispatcher::new(registry, 5)
    }

    #[tokio::test]
    async fn test_dispatch_success() {
        let dispatcher = dispatcher_with(EchoTool);
        let inv = dispatcher
            .dispatch("echo", json!({"text": "hello"}))
            .await
            .unwrap();
        assert!(inv.is_success());
        assert_eq!(inv.observation(), "hello");
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let dispatcher = dispatcher_with(EchoTool);
        let err = dispatcher.dispatch("nope", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::Unknown(name) if name == "nope"));
    }

    #[tokio::test]
    async fn test_dispatch_missing_required_arg_blocks_execution() {
        let dispatcher = dispatcher_with(StrictTool);
        let err = dispatcher.dispatch("strict", json!({})).await.unwrap_err();
        match err {
            ToolError::ArgumentValidation { tool, reason } => {
                assert_eq!(tool, "strict");
                assert!(reason.contains("city"));
            }
            other => panic!("expected ArgumentValidation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_wrong_type_rejected() {
        let dispatcher = dispatcher_with(StrictTool);
        let err = dispatcher
            .dispatch("strict", json!({"city": 42}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ArgumentValidation { .. }));
    }

    #[tokio::test]
    async fn test_execution_failure_captured_not_propagated() {
        let dispatcher = dispatcher_with(FailingTool);
        let inv = dispatcher.dispatch("failing", json!({})).await.unwrap();
        assert!(!inv.is_success());
        assert!(inv.observation().contains("deliberate failure"));
    }
}
