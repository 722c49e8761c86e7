//! OpenAI 兼容 API 提供商
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；覆盖 DeepSeek、OpenAI、自建代理等。
//! API 错误在此映射为 ProviderError 的瞬时/永久分类。

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::config::ProviderEntry;
use crate::llm::{
    parse_model_output, ChatMessage, ChatRole, ModelOutput, ModelProvider, ModelRequest,
    ProviderError,
};

/// OpenAI 兼容提供商：持有 Client 与 model 名
pub struct OpenAiProvider {
    name: String,
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiProvider {
    pub fn new(name: &str, base_url: Option<&str>, model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            name: name.to_string(),
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }

    /// 从配置条目构造（API Key 从 api_key_env 指定的环境变量读取）
    pub fn from_entry(entry: &ProviderEntry) -> Self {
        let api_key = entry
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok());
        Self::new(
            &entry.name,
            entry.base_url.as_deref(),
            &entry.model,
            api_key.as_deref(),
        )
    }

    fn to_openai_messages(&self, messages: &[ChatMessage]) -> Vec<ChatCompletionRequestMessage> {
        messages
            .iter()
            .map(|m| match m.role {
                ChatRole::System => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .unwrap(),
                ),
                // Tool 观察折叠为 User 消息：tool call 协议走 prompt 内 JSON，不用原生 tool role
                ChatRole::User | ChatRole::Tool => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .unwrap(),
                ),
                ChatRole::Assistant => ChatCompletionRequestMessage::Assistant(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .unwrap(),
                ),
            })
            .collect()
    }
}

/// 将 async_openai 错误映射为瞬时/永久分类
fn classify_error(err: OpenAIError) -> ProviderError {
    match err {
        OpenAIError::ApiError(api) => {
            let msg = api.message.clone();
            let lower = msg.to_lowercase();
            if lower.contains("rate limit") || lower.contains("too many requests") {
                ProviderError::RateLimited
            } else if lower.contains("api key")
                || lower.contains("unauthorized")
                || lower.contains("authentication")
            {
                ProviderError::Auth(msg)
            } else if lower.contains("content") && (lower.contains("policy") || lower.contains("filter"))
            {
                ProviderError::ContentPolicy(msg)
            } else if lower.contains("invalid") || lower.contains("unsupported") {
                ProviderError::BadRequest(msg)
            } else {
                ProviderError::Server(msg)
            }
        }
        other => {
            let msg = other.to_string();
            if msg.to_lowercase().contains("timed out") || msg.to_lowercase().contains("timeout") {
                ProviderError::Timeout
            } else {
                ProviderError::Server(msg)
            }
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelOutput, ProviderError> {
        let api_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(self.to_openai_messages(&request.messages))
            .build()
            .map_err(|e| ProviderError::BadRequest(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(api_request)
            .await
            .map_err(classify_error)?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        parse_model_output(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::error::ApiError;

    fn api_error(message: &str) -> OpenAIError {
        OpenAIError::ApiError(ApiError {
            message: message.to_string(),
            r#type: None,
            param: None,
            code: None,
        })
    }

    #[test]
    fn test_rate_limit_is_transient() {
        let err = classify_error(api_error("Rate limit reached for requests"));
        assert!(matches!(err, ProviderError::RateLimited));
        assert!(err.is_transient());
    }

    #[test]
    fn test_bad_api_key_is_permanent() {
        let err = classify_error(api_error("Incorrect API key provided"));
        assert!(matches!(err, ProviderError::Auth(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_unclassified_api_error_is_server() {
        let err = classify_error(api_error("internal failure"));
        assert!(matches!(err, ProviderError::Server(_)));
        assert!(err.is_transient());
    }
}
