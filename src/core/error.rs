//! 编排错误类型
//!
//! 覆盖整条 run 的失败面：提供商耗尽、幻觉工具、会话占用、存储失败、取消。
//! 面向用户的文案统一由 user_reply 生成，内部错误细节不直接外泄。

use thiserror::Error;

/// 编排 run 过程中可能出现的错误
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// 所有提供商（含重试）均失败，run 进入 Failed
    #[error("all model providers exhausted: {0}")]
    AllProvidersExhausted(String),

    /// 模型请求了未注册的工具名（提供商幻觉），按永久性生成失败处理
    #[error("model requested unknown tool: {0}")]
    HallucinatedTool(String),

    /// 同一会话已有 run 在执行，锁等待超时
    #[error("conversation {0} is busy")]
    ConversationBusy(String),

    /// 持久化失败（已提交的 Turn 已尽力保存）
    #[error("storage error: {0}")]
    Storage(String),

    /// 调用方取消（如渠道断开）
    #[error("run cancelled")]
    Cancelled,
}

impl OrchestratorError {
    /// 面向用户的礼貌失败文案（渠道适配器直接展示；与正常回复可区分）
    pub fn user_reply(&self) -> String {
        match self {
            OrchestratorError::ConversationBusy(_) => {
                "我还在处理你上一条消息，请稍等片刻再发。".to_string()
            }
            OrchestratorError::Cancelled => "本次请求已取消。".to_string(),
            _ => "抱歉，我暂时无法处理这条消息，请稍后再试。".to_string(),
        }
    }
}
