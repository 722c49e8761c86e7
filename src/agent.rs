//! 无头助理运行时
//!
//! 供渠道适配器（CLI / Bot / HTTP）调用的无界面入口：
//! Assistant::from_config 把配置装配成网关 / 检索 / 工具 / 存储 / 锁，
//! handle_incoming_message 对单条用户消息跑一次编排 run 并返回回复。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::core::{OrchestratorError, RetryPolicy};
use crate::llm::{ModelGateway, ModelProvider, OpenAiProvider};
use crate::memory::{ConversationLocks, ConversationStore, JsonFileStore, MemoryStore};
use crate::orchestrator::{Orchestrator, RunEvent};
use crate::retrieval::{KeywordIndex, Retriever};
use crate::tools::{ClockTool, EchoTool, ToolDispatcher, ToolRegistry};

/// 装配完成的助理：编排器 + 可写入的知识索引，可多会话共享
pub struct Assistant {
    orchestrator: Orchestrator,
    index: KeywordIndex,
}

impl Assistant {
    /// 从配置装配：提供商按配置顺序（首个为 primary）、内建工具（echo / clock）、
    /// data_dir 存在时用文件存储否则用内存存储
    pub fn from_config(cfg: &AppConfig) -> Self {
        let providers: Vec<Arc<dyn ModelProvider>> = cfg
            .llm
            .providers
            .iter()
            .map(|entry| Arc::new(OpenAiProvider::from_entry(entry)) as Arc<dyn ModelProvider>)
            .collect();

        let gateway = ModelGateway::new(
            providers,
            RetryPolicy::from_config(&cfg.retry),
            cfg.llm.token_budget,
            Duration::from_secs(cfg.llm.request_timeout_secs),
        );

        let index = KeywordIndex::new();
        let retriever = Retriever::new(Arc::new(index.clone()), cfg.retrieval.default_k);

        let mut registry = ToolRegistry::new();
        // 内建工具名固定且互不相同，注册不会冲突
        let _ = registry.register(EchoTool);
        let _ = registry.register(ClockTool);
        let dispatcher = ToolDispatcher::new(registry, cfg.tools.tool_timeout_secs);

        let store: Arc<dyn ConversationStore> = match &cfg.app.data_dir {
            Some(dir) => Arc::new(JsonFileStore::new(dir)),
            None => Arc::new(MemoryStore::new()),
        };

        let locks = ConversationLocks::new(Duration::from_secs(cfg.orchestrator.lock_wait_secs));

        let mut orchestrator = Orchestrator::new(gateway, retriever, dispatcher, store, locks)
            .with_limits(cfg.orchestrator.max_tool_hops, cfg.app.max_context_turns);
        if let Some(prompt) = &cfg.orchestrator.system_prompt {
            orchestrator = orchestrator.with_system_prompt(prompt.clone());
        }

        Self {
            orchestrator,
            index,
        }
    }

    /// 向知识索引写入一条笔记（供检索增强使用）
    pub fn add_note(&self, source: impl Into<String>, text: impl Into<String>) {
        self.index.add(source, text);
    }

    /// 处理单条用户消息，返回回复文本；错误由调用方经 user_reply 转为展示文案
    pub async fn handle_incoming_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<String, OrchestratorError> {
        self.orchestrator.handle_message(conversation_id, text).await
    }

    /// 完整入口：带进度事件与取消令牌（供流式渠道使用）
    pub async fn handle_incoming_message_with(
        &self,
        conversation_id: &str,
        text: &str,
        events: Option<&UnboundedSender<RunEvent>>,
        cancel: &CancellationToken,
    ) -> Result<String, OrchestratorError> {
        self.orchestrator.run(conversation_id, text, events, cancel).await
    }

    /// 回复或礼貌致歉：渠道适配器的便捷封装，永远有话可说
    pub async fn reply_or_apology(&self, conversation_id: &str, text: &str) -> String {
        match self.handle_incoming_message(conversation_id, text).await {
            Ok(reply) => reply,
            Err(err) => err.user_reply(),
        }
    }
}
