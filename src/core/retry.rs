//! 重试/退避策略（Failure Policy）
//!
//! 纯决策函数：给定尝试次数、错误分类与提供商位置，返回 RetrySameProvider / AdvanceProvider / GiveUp。
//! 延迟按指数增长、封顶，并叠加随机抖动避免并发会话的重试风暴。
//! 无状态，Model Gateway 与工具实现均可共用。

use std::time::Duration;

use rand::Rng;

use crate::config::RetrySection;

/// 策略给出的下一步动作
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyAction {
    /// 延迟后重试当前提供商
    RetrySameProvider(Duration),
    /// 切换到偏好列表中的下一个提供商，尝试计数清零
    AdvanceProvider,
    /// 已无提供商可试，终止
    GiveUp,
}

/// 重试策略：同一提供商的尝试上限与退避参数
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 同一提供商的最大尝试次数（含首次）
    pub attempt_limit: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempt_limit: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            attempt_limit: attempt_limit.max(1),
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(cfg: &RetrySection) -> Self {
        Self::new(
            cfg.attempt_limit,
            Duration::from_millis(cfg.base_delay_ms),
            Duration::from_millis(cfg.max_delay_ms),
        )
    }

    /// 决定下一步动作。
    ///
    /// - 瞬时错误且未达 attempt_limit：延迟后重试同一提供商
    /// - 永久错误或尝试耗尽：还有后备提供商则 AdvanceProvider，否则 GiveUp
    pub fn next_action(
        &self,
        attempt: u32,
        transient: bool,
        provider_index: usize,
        provider_count: usize,
    ) -> PolicyAction {
        if transient && attempt < self.attempt_limit {
            return PolicyAction::RetrySameProvider(self.delay_for(attempt));
        }
        if provider_index + 1 < provider_count {
            PolicyAction::AdvanceProvider
        } else {
            PolicyAction::GiveUp
        }
    }

    /// 第 attempt 次失败后的退避延迟：base * 2^(attempt-1)，封顶 max_delay，抖动系数 [0.5, 1.5)
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let raw = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.max_delay);
        let jitter: f64 = rand::thread_rng().gen_range(0.5..1.5);
        Duration::from_millis((raw.as_millis() as f64 * jitter) as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200), Duration::from_secs(5))
    }
}
