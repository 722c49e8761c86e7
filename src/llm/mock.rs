//! Scripted 提供商（用于测试，无需 API）
//!
//! 按脚本顺序弹出预置结果（文本 / tool call / 错误），并记录被调用次数，
//! 便于验证网关的重试计数与故障转移路径。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{ModelOutput, ModelProvider, ModelRequest, ProviderError};

/// 单步脚本：成功输出或错误
pub enum ScriptedStep {
    Output(ModelOutput),
    Fail(ProviderError),
}

/// Scripted 提供商：依次返回脚本步骤；脚本耗尽后重复最后的行为或回显
pub struct ScriptedProvider {
    name: String,
    steps: Mutex<VecDeque<ScriptedStep>>,
    calls: AtomicU32,
    /// 脚本耗尽后是否总是返回 RateLimited（模拟持续故障的提供商）
    exhausted_fails: bool,
}

impl ScriptedProvider {
    pub fn new(name: &str, steps: Vec<ScriptedStep>) -> Self {
        Self {
            name: name.to_string(),
            steps: Mutex::new(steps.into()),
            calls: AtomicU32::new(0),
            exhausted_fails: false,
        }
    }

    /// 总是返回指定文本的提供商
    pub fn always_text(name: &str, text: &str) -> Self {
        let mut p = Self::new(name, Vec::new());
        p.steps
            .get_mut()
            .unwrap()
            .push_back(ScriptedStep::Output(ModelOutput::Text(text.to_string())));
        p
    }

    /// 每次调用都失败的提供商（瞬时错误）
    pub fn always_transient_failure(name: &str) -> Self {
        Self {
            name: name.to_string(),
            steps: Mutex::new(VecDeque::new()),
            calls: AtomicU32::new(0),
            exhausted_fails: true,
        }
    }

    /// 被调用的总次数
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &ModelRequest) -> Result<ModelOutput, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(ScriptedStep::Output(out)) => Ok(out),
            Some(ScriptedStep::Fail(err)) => Err(err),
            None if self.exhausted_fails => Err(ProviderError::RateLimited),
            None => {
                // 脚本耗尽：回显最后一条用户消息，保证流程可继续
                let last_user = request
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.role == crate::llm::ChatRole::User)
                    .map(|m| m.content.as_str())
                    .unwrap_or("(no input)");
                Ok(ModelOutput::Text(format!("Echo: {}", last_user)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;

    #[tokio::test]
    async fn test_scripted_steps_in_order() {
        let provider = ScriptedProvider::new(
            "mock",
            vec![
                ScriptedStep::Fail(ProviderError::RateLimited),
                ScriptedStep::Output(ModelOutput::Text("ok".to_string())),
            ],
        );
        let request = ModelRequest {
            messages: vec![ChatMessage::user("hi")],
            tools: Vec::new(),
        };
        assert!(provider.complete(&request).await.is_err());
        assert_eq!(
            provider.complete(&request).await.unwrap(),
            ModelOutput::Text("ok".to_string())
        );
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_script_echoes() {
        let provider = ScriptedProvider::new("mock", Vec::new());
        let request = ModelRequest {
            messages: vec![ChatMessage::user("hello")],
            tools: Vec::new(),
        };
        let out = provider.complete(&request).await.unwrap();
        assert_eq!(out, ModelOutput::Text("Echo: hello".to_string()));
    }
}
