//! run 进度事件
//!
//! 编排循环在每个关键节点向可选的事件通道发送 RunEvent，
//! 渠道适配器（CLI / Bot）据此展示进度；序列化为 tagged JSON。

use serde::Serialize;

/// run 过程中的进度事件
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// 开始检索上下文
    Retrieving { query: String },
    /// 检索完成（可能为空）
    Retrieved { passages: usize },
    /// 发起一次模型生成（hop 为已用工具跳数）
    Generating { hop: usize },
    /// 模型请求调用工具
    ToolCall { tool: String },
    /// 工具观察已写回对话
    Observation { tool: String, ok: bool },
    /// run 成功，产出回复
    Reply { text: String },
    /// run 失败
    Failed { reason: String },
}
