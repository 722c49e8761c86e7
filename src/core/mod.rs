//! 核心层：编排错误与共享重试策略

pub mod error;
pub mod retry;

pub use error::OrchestratorError;
pub use retry::{PolicyAction, RetryPolicy};
