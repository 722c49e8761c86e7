//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），
//! 由 ToolRegistry 按名注册与查找；重名注册直接报错，注册表本身进程级只读、可并发读。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// 工具层错误：注册冲突与调度前置校验失败
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("duplicate tool name: {0}")]
    Duplicate(String),

    #[error("unknown tool: {0}")]
    Unknown(String),

    /// 参数不满足声明的 schema（缺必填、类型不符）；在任何副作用执行前返回
    #[error("argument validation failed for {tool}: {reason}")]
    ArgumentValidation { tool: String, reason: String },
}

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（用于 JSON 中的 "tool" 字段，注册表内唯一）
    fn name(&self) -> &str;

    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 JSON Schema（properties 声明类型，required 声明必填）
    /// 默认返回空对象，表示无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行工具；失败以 Err(原因) 返回，由 Dispatcher 捕获为失败的 ToolInvocation
    async fn execute(&self, args: Value) -> Result<String, String>;
}

/// 对 LLM 暴露的工具签名（名称 + 描述 + 参数 schema）
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 一次工具调用的完整记录：工具名、绑定参数、成功载荷或失败原因；创建后不再修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool: String,
    pub args: Value,
    pub outcome: Result<String, String>,
}

impl ToolInvocation {
    pub fn success(tool: impl Into<String>, args: Value, payload: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            args,
            outcome: Ok(payload.into()),
        }
    }

    pub fn failure(tool: impl Into<String>, args: Value, reason: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            args,
            outcome: Err(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// 写回对话的观察文本：成功为载荷本身，失败为 "Error: 原因"（供模型自我纠正）
    pub fn observation(&self) -> String {
        match &self.outcome {
            Ok(payload) => payload.clone(),
            Err(reason) => format!("Error: {}", reason),
        }
    }
}

/// 工具注册表：按名称存储 Arc<dyn Tool>，支持 register / get / contains / specs
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工具；名称已存在时返回 Duplicate
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::Duplicate(name));
        }
        self.tools.insert(name, Arc::new(tool));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// 对 LLM 暴露的全部工具签名
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|(name, tool)| ToolSpec {
                name: name.clone(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }

    /// 动态生成工具 schema JSON，拼入 system prompt 的 Available tools 段落
    pub fn to_schema_json(&self) -> String {
        serde_json::to_string_pretty(&self.specs()).unwrap_or_else(|_| "[]".to_string())
    }
}
