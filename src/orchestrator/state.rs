//! run 状态机
//!
//! 一次 run 的生命周期：AwaitingRetrieval → AwaitingGeneration →
//! { Responding | AwaitingToolResult → AwaitingGeneration … } → Responding / Failed。
//! 跳数计数由循环持有，状态只携带当步所需数据。

use serde_json::Value;

use crate::core::OrchestratorError;

/// 待执行的工具调用（模型请求的名称与绑定参数）
#[derive(Debug, Clone)]
pub struct PendingCall {
    pub tool: String,
    pub args: Value,
}

/// run 状态
#[derive(Debug)]
pub enum RunState {
    /// 等待检索上下文（best-effort，失败降级为空）
    AwaitingRetrieval,
    /// 等待模型生成（可能产生文本回复或工具调用）
    AwaitingGeneration,
    /// 等待工具执行结果
    AwaitingToolResult(PendingCall),
    /// 终态：产出回复文本
    Responding(String),
    /// 终态：run 失败
    Failed(OrchestratorError),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Responding(_) | RunState::Failed(_))
    }
}
