//! LLM 层：提供商抽象、token 预算、OpenAI 兼容后端与多提供商网关

pub mod budget;
pub mod gateway;
pub mod mock;
pub mod openai;
pub mod traits;

pub use budget::{fit_to_budget, TokenEstimator};
pub use gateway::ModelGateway;
pub use openai::OpenAiProvider;
pub use traits::{
    parse_model_output, ChatMessage, ChatRole, ModelOutput, ModelProvider, ModelRequest,
    ProviderError,
};
