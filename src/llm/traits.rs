//! LLM 提供商抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 ModelProvider：complete(request) 返回
//! 纯文本或 tool call，错误带瞬时/永久分类，供网关决定重试还是切换提供商。

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::tools::ToolSpec;

/// 请求消息角色（面向 API；Tool 观察在发送前折叠为 User 消息）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// 单条请求消息
#[derive(Clone, Debug)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
        }
    }
}

/// 一次生成请求：有序消息段 + 可用工具签名
#[derive(Clone, Debug, Default)]
pub struct ModelRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolSpec>,
}

/// 提供商返回：纯文本回复或 tool call 请求
#[derive(Clone, Debug, PartialEq)]
pub enum ModelOutput {
    Text(String),
    ToolCall { tool: String, args: Value },
}

/// 提供商错误，按可否立即重试分类
#[derive(Error, Debug)]
pub enum ProviderError {
    // 瞬时：重试同一提供商可能成功
    #[error("rate limited")]
    RateLimited,

    #[error("request timed out")]
    Timeout,

    #[error("server error: {0}")]
    Server(String),

    /// 输出无法解析为文本或 tool call（重试常可恢复）
    #[error("malformed model output: {0}")]
    MalformedOutput(String),

    // 永久：该提供商不必再试，直接切换
    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("content policy rejection: {0}")]
    ContentPolicy(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited
                | ProviderError::Timeout
                | ProviderError::Server(_)
                | ProviderError::MalformedOutput(_)
        )
    }
}

/// LLM 提供商 trait：名称（用于遥测）与完成调用
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: &ModelRequest) -> Result<ModelOutput, ProviderError>;
}

/// 解析提供商的原始文本输出：若含有效 JSON 且 tool 非空则为 ToolCall，否则为纯文本。
/// JSON 块存在但解析失败时返回 MalformedOutput，让网关按瞬时错误重试。
pub fn parse_model_output(output: &str) -> Result<ModelOutput, ProviderError> {
    let trimmed = output.trim();

    // 尝试提取 JSON 块（```json ... ``` 或裸 JSON 对象）
    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```")
            .map(|end| rest[..end].trim())
            .unwrap_or_else(|| rest.trim())
    } else if let Some(start) = trimmed.find('{') {
        match trimmed.rfind('}') {
            Some(end) if end > start => &trimmed[start..=end],
            _ => return Ok(ModelOutput::Text(trimmed.to_string())),
        }
    } else {
        return Ok(ModelOutput::Text(trimmed.to_string()));
    };

    #[derive(serde::Deserialize)]
    struct RawCall {
        tool: String,
        #[serde(default)]
        args: Value,
    }

    match serde_json::from_str::<RawCall>(json_str) {
        Ok(call) if !call.tool.is_empty() => {
            let args = if call.args.is_null() {
                serde_json::json!({})
            } else {
                call.args
            };
            Ok(ModelOutput::ToolCall {
                tool: call.tool,
                args,
            })
        }
        Ok(_) => Ok(ModelOutput::Text(trimmed.to_string())),
        Err(_) if !looks_like_tool_call(json_str) => Ok(ModelOutput::Text(trimmed.to_string())),
        Err(e) => Err(ProviderError::MalformedOutput(format!("{}: {}", e, json_str))),
    }
}

/// 含 "tool" 键的 JSON 碎片视为失败的 tool call 尝试，其余 JSON 当普通文本放行
fn looks_like_tool_call(json_str: &str) -> bool {
    json_str.contains("\"tool\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes_through() {
        let out = parse_model_output("It's 18°C and cloudy in Paris.").unwrap();
        assert_eq!(out, ModelOutput::Text("It's 18°C and cloudy in Paris.".to_string()));
    }

    #[test]
    fn test_bare_json_tool_call() {
        let out = parse_model_output(r#"{"tool": "clock", "args": {"format": "%H:%M"}}"#).unwrap();
        match out {
            ModelOutput::ToolCall { tool, args } => {
                assert_eq!(tool, "clock");
                assert_eq!(args["format"], "%H:%M");
            }
            other => panic!("expected tool call, got {:?}", other),
        }
    }

    #[test]
    fn test_fenced_json_tool_call() {
        let raw = "Let me check.\n```json\n{\"tool\": \"echo\", \"args\": {\"text\": \"hi\"}}\n```";
        let out = parse_model_output(raw).unwrap();
        assert!(matches!(out, ModelOutput::ToolCall { tool, .. } if tool == "echo"));
    }

    #[test]
    fn test_broken_tool_call_is_malformed() {
        let err = parse_model_output(r#"{"tool": "echo", "args": }"#).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedOutput(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_json_without_tool_key_is_text() {
        let out = parse_model_output(r#"{"note": "not a call"}"#).unwrap();
        assert!(matches!(out, ModelOutput::Text(_)));
    }

    #[test]
    fn test_error_classification() {
        assert!(ProviderError::RateLimited.is_transient());
        assert!(ProviderError::Timeout.is_transient());
        assert!(ProviderError::Server("500".into()).is_transient());
        assert!(!ProviderError::Auth("bad key".into()).is_transient());
        assert!(!ProviderError::BadRequest("oops".into()).is_transient());
        assert!(!ProviderError::ContentPolicy("no".into()).is_transient());
    }
}
