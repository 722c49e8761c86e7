//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HEARTH__*` 覆盖（双下划线表示嵌套，如 `HEARTH__RETRY__ATTEMPT_LIMIT=5`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub retrieval: RetrievalSection,
    #[serde(default)]
    pub orchestrator: OrchestratorSection,
    #[serde(default)]
    pub tools: ToolsSection,
}

/// [app] 段：应用名、持久化目录、对话轮数上限
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 对话持久化目录；未设置时用内存存储
    pub data_dir: Option<PathBuf>,
    /// 对话历史保留轮数（短期记忆）
    #[serde(default = "default_max_context_turns")]
    pub max_context_turns: usize,
}

fn default_max_context_turns() -> usize {
    20
}

/// [llm] 段：提供商优先级列表与请求预算
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 按优先级排列的提供商（首个为 primary，其余为 fallback）
    pub providers: Vec<ProviderEntry>,
    /// 单次请求的 prompt token 预算，超出时从最旧的非 system 消息截断
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,
    /// 单次请求超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            providers: vec![ProviderEntry::default()],
            token_budget: default_token_budget(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_token_budget() -> usize {
    8000
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// 单个 LLM 提供商条目（OpenAI 兼容端点）
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderEntry {
    pub name: String,
    /// 未设置时使用官方 OpenAI 端点
    pub base_url: Option<String>,
    pub model: String,
    /// 读取 API Key 的环境变量名
    pub api_key_env: Option<String>,
}

impl Default for ProviderEntry {
    fn default() -> Self {
        Self {
            name: "deepseek".to_string(),
            base_url: Some("https://api.deepseek.com".to_string()),
            model: "deepseek-chat".to_string(),
            api_key_env: Some("DEEPSEEK_API_KEY".to_string()),
        }
    }
}

/// [retry] 段：重试/退避策略（Failure Policy）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    /// 同一提供商的最大尝试次数（含首次）
    #[serde(default = "default_attempt_limit")]
    pub attempt_limit: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            attempt_limit: default_attempt_limit(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_attempt_limit() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    5000
}

/// [retrieval] 段：默认返回的段落数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalSection {
    #[serde(default = "default_k")]
    pub default_k: usize,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            default_k: default_k(),
        }
    }
}

fn default_k() -> usize {
    5
}

/// [orchestrator] 段：工具跳数上限与会话锁等待
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorSection {
    /// 单次 run 内最多的工具调用跳数，防止死循环
    #[serde(default = "default_max_tool_hops")]
    pub max_tool_hops: usize,
    /// 同一会话锁的最长等待（秒），超时返回 ConversationBusy
    #[serde(default = "default_lock_wait_secs")]
    pub lock_wait_secs: u64,
    /// 覆盖默认 system prompt
    pub system_prompt: Option<String>,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            max_tool_hops: default_max_tool_hops(),
            lock_wait_secs: default_lock_wait_secs(),
            system_prompt: None,
        }
    }
}

fn default_max_tool_hops() -> usize {
    8
}

fn default_lock_wait_secs() -> u64 {
    30
}

/// [tools] 段：单次工具调用超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSection::default(),
            llm: LlmSection::default(),
            retry: RetrySection::default(),
            retrieval: RetrievalSection::default(),
            orchestrator: OrchestratorSection::default(),
            tools: ToolsSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 HEARTH__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HEARTH__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HEARTH")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_one_provider() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.providers.len(), 1);
        assert_eq!(cfg.llm.providers[0].name, "deepseek");
    }

    #[test]
    fn test_default_limits() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.retry.attempt_limit, 3);
        assert_eq!(cfg.orchestrator.max_tool_hops, 8);
        assert_eq!(cfg.retrieval.default_k, 5);
    }
}
