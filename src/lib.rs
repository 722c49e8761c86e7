//! Hearth - 家庭会话助手编排引擎
//!
//! 模块划分：
//! - **agent**: 无头助理运行时（供 CLI / Bot 等渠道调用）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 编排错误与重试/退避策略
//! - **llm**: 提供商抽象、token 预算、OpenAI 兼容后端与多提供商网关
//! - **memory**: 对话模型、工作记忆、持久化与会话锁
//! - **observability**: 日志初始化
//! - **orchestrator**: run 状态机、进度事件与编排循环
//! - **retrieval**: 检索增强（best-effort）
//! - **tools**: 工具注册表、调度器与内建工具

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod orchestrator;
pub mod retrieval;
pub mod tools;

pub use agent::Assistant;
