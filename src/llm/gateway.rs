//! Model Gateway：多提供商故障转移
//!
//! 按偏好顺序持有提供商列表；单次 generate 内先在当前提供商上按策略重试，
//! 耗尽后切换到下一个，全部失败返回 AllProvidersExhausted。
//! 发送前做 token 预算裁剪；每次尝试记录 provider / latency / outcome 遥测。

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::core::{OrchestratorError, PolicyAction, RetryPolicy};
use crate::llm::budget::fit_to_budget;
use crate::llm::{ModelOutput, ModelProvider, ModelRequest, ProviderError};

/// 网关：有序提供商 + 重试策略 + token 预算
pub struct ModelGateway {
    providers: Vec<Arc<dyn ModelProvider>>,
    policy: RetryPolicy,
    token_budget: usize,
    request_timeout: Duration,
}

impl ModelGateway {
    pub fn new(
        providers: Vec<Arc<dyn ModelProvider>>,
        policy: RetryPolicy,
        token_budget: usize,
        request_timeout: Duration,
    ) -> Self {
        Self {
            providers,
            policy,
            token_budget,
            request_timeout,
        }
    }

    /// 执行一次生成：逐提供商尝试，策略决定重试/切换/放弃。
    ///
    /// 一次调用至多采纳一个成功结果：尝试串行执行，超时的请求被丢弃后
    /// 不再回收其结果。
    pub async fn generate(&self, request: &ModelRequest) -> Result<ModelOutput, OrchestratorError> {
        if self.providers.is_empty() {
            return Err(OrchestratorError::AllProvidersExhausted(
                "no providers configured".to_string(),
            ));
        }

        let mut fitted = request.clone();
        fitted.messages = fit_to_budget(fitted.messages, self.token_budget);

        let mut provider_index = 0usize;
        let mut attempt = 0u32;
        let mut last_error = String::new();

        loop {
            let provider = &self.providers[provider_index];
            attempt += 1;

            let started = Instant::now();
            let outcome = tokio::time::timeout(self.request_timeout, provider.complete(&fitted))
                .await
                .unwrap_or(Err(ProviderError::Timeout));
            let latency_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(output) => {
                    info!(
                        provider = provider.name(),
                        attempt, latency_ms, outcome = "ok",
                        "模型生成成功"
                    );
                    return Ok(output);
                }
                Err(err) => {
                    let transient = err.is_transient();
                    warn!(
                        provider = provider.name(),
                        attempt,
                        latency_ms,
                        outcome = "error",
                        transient,
                        error = %err,
                        "模型调用失败"
                    );
                    last_error = format!("{}: {}", provider.name(), err);

                    match self.policy.next_action(
                        attempt,
                        transient,
                        provider_index,
                        self.providers.len(),
                    ) {
                        PolicyAction::RetrySameProvider(delay) => {
                            tokio::time::sleep(delay).await;
                        }
                        PolicyAction::AdvanceProvider => {
                            provider_index += 1;
                            attempt = 0;
                        }
                        PolicyAction::GiveUp => {
                            return Err(OrchestratorError::AllProvidersExhausted(last_error));
                        }
                    }
                }
            }
        }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::{ScriptedProvider, ScriptedStep};
    use crate::llm::ChatMessage;
    use std::time::Duration;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5))
    }

    fn request() -> ModelRequest {
        ModelRequest {
            messages: vec![ChatMessage::user("hi")],
            tools: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_first_provider_success_no_fallback() {
        let primary = Arc::new(ScriptedProvider::always_text("primary", "pong"));
        let backup = Arc::new(ScriptedProvider::always_text("backup", "never"));
        let gateway = ModelGateway::new(
            vec![primary.clone(), backup.clone()],
            fast_policy(),
            10_000,
            Duration::from_secs(5),
        );

        let out = gateway.generate(&request()).await.unwrap();
        assert_eq!(out, ModelOutput::Text("pong".to_string()));
        assert_eq!(primary.calls(), 1);
        assert_eq!(backup.calls(), 0);
    }

    #[tokio::test]
    async fn test_transient_retry_then_success() {
        let primary = Arc::new(ScriptedProvider::new(
            "primary",
            vec![
                ScriptedStep::Fail(ProviderError::RateLimited),
                ScriptedStep::Output(ModelOutput::Text("ok".to_string())),
            ],
        ));
        let gateway = ModelGateway::new(
            vec![primary.clone()],
            fast_policy(),
            10_000,
            Duration::from_secs(5),
        );

        let out = gateway.generate(&request()).await.unwrap();
        assert_eq!(out, ModelOutput::Text("ok".to_string()));
        assert_eq!(primary.calls(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_primary_falls_over() {
        let primary = Arc::new(ScriptedProvider::always_transient_failure("primary"));
        let backup = Arc::new(ScriptedProvider::always_text("backup", "rescued"));
        let gateway = ModelGateway::new(
            vec![primary.clone(), backup.clone()],
            fast_policy(),
            10_000,
            Duration::from_secs(5),
        );

        let out = gateway.generate(&request()).await.unwrap();
        assert_eq!(out, ModelOutput::Text("rescued".to_string()));
        // 主提供商被试满 attempt_limit 次
        assert_eq!(primary.calls(), 3);
        assert_eq!(backup.calls(), 1);
    }

    #[tokio::test]
    async fn test_permanent_error_skips_retry() {
        let primary = Arc::new(ScriptedProvider::new(
            "primary",
            vec![ScriptedStep::Fail(ProviderError::Auth("bad key".into()))],
        ));
        let backup = Arc::new(ScriptedProvider::always_text("backup", "rescued"));
        let gateway = ModelGateway::new(
            vec![primary.clone(), backup],
            fast_policy(),
            10_000,
            Duration::from_secs(5),
        );

        let out = gateway.generate(&request()).await.unwrap();
        assert_eq!(out, ModelOutput::Text("rescued".to_string()));
        // 永久错误不重试同一提供商
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_exhausted_is_error() {
        let a = Arc::new(ScriptedProvider::always_transient_failure("a"));
        let b = Arc::new(ScriptedProvider::always_transient_failure("b"));
        let gateway = ModelGateway::new(
            vec![a.clone(), b.clone()],
            fast_policy(),
            10_000,
            Duration::from_secs(5),
        );

        let err = gateway.generate(&request()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::AllProvidersExhausted(_)));
        assert_eq!(a.calls(), 3);
        assert_eq!(b.calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_gateway_errors() {
        let gateway = ModelGateway::new(
            Vec::new(),
            fast_policy(),
            10_000,
            Duration::from_secs(5),
        );
        assert!(gateway.generate(&request()).await.is_err());
    }
}
