//! 编排循环
//!
//! 每条用户消息驱动一次 run：取会话锁 → 追加用户 Turn → 检索上下文 →
//! 生成（可能经过若干次工具调用）→ 终态时持久化并回复/报错。
//! 工具跳数有上限；模型请求未注册工具名时立即终止（不执行任何猜测的工具）。
//! 取消在每个状态转移前检查，已追加的 Turn 尽力保存。

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::OrchestratorError;
use crate::llm::{ChatMessage, ModelGateway, ModelOutput, ModelRequest};
use crate::memory::{Conversation, ConversationLocks, ConversationStore, Role, Turn, WorkingItem};
use crate::orchestrator::{PendingCall, RunEvent, RunState};
use crate::retrieval::Retriever;
use crate::tools::{tool_call_schema_json, ToolDispatcher, ToolError, ToolInvocation};

/// 默认 system prompt（可由配置覆盖）
pub const DEFAULT_SYSTEM_PROMPT: &str = "你是一个家庭助理，为家庭成员解答问题、查询信息、安排事务。\
回答简洁、友好；不确定时明确说不知道，不要编造。";

/// 跳数耗尽时的强制回复
const HOPS_EXHAUSTED_REPLY: &str = "抱歉，这个任务在限定步骤内没有完成，请换个方式描述或稍后再试。";

/// 编排器：把网关、检索、工具与存储串成 run 循环
pub struct Orchestrator {
    gateway: ModelGateway,
    retriever: Retriever,
    dispatcher: ToolDispatcher,
    store: Arc<dyn ConversationStore>,
    locks: ConversationLocks,
    system_prompt: String,
    max_tool_hops: usize,
    max_context_turns: usize,
}

impl Orchestrator {
    pub fn new(
        gateway: ModelGateway,
        retriever: Retriever,
        dispatcher: ToolDispatcher,
        store: Arc<dyn ConversationStore>,
        locks: ConversationLocks,
    ) -> Self {
        Self {
            gateway,
            retriever,
            dispatcher,
            store,
            locks,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tool_hops: 8,
            max_context_turns: 20,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_limits(mut self, max_tool_hops: usize, max_context_turns: usize) -> Self {
        self.max_tool_hops = max_tool_hops;
        self.max_context_turns = max_context_turns.max(1);
        self
    }

    /// 处理一条用户消息（无事件流、不可取消的便捷入口）
    pub async fn handle_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<String, OrchestratorError> {
        self.run(conversation_id, text, None, &CancellationToken::new())
            .await
    }

    /// 完整入口：可选事件通道 + 取消令牌。
    ///
    /// 同一会话的 run 串行（锁超时返回 ConversationBusy）；成功时持久化后返回回复文本，
    /// 失败时尽力持久化已追加的 Turn 再返回错误（user_reply 供渠道展示）。
    pub async fn run(
        &self,
        conversation_id: &str,
        text: &str,
        events: Option<&UnboundedSender<RunEvent>>,
        cancel: &CancellationToken,
    ) -> Result<String, OrchestratorError> {
        let _guard = self.locks.acquire(conversation_id).await?;

        let run_id = Uuid::new_v4();
        info!(%run_id, conversation_id, "run 开始");

        let mut conversation = self
            .store
            .load(conversation_id)
            .await
            .map_err(|e| OrchestratorError::Storage(e.to_string()))?
            .unwrap_or_else(|| Conversation::new(conversation_id));

        conversation.push_turn(Turn::user(text));

        let mut state = RunState::AwaitingRetrieval;
        let mut hops = 0usize;

        loop {
            if cancel.is_cancelled() && !state.is_terminal() {
                state = RunState::Failed(OrchestratorError::Cancelled);
            }

            state = match state {
                RunState::AwaitingRetrieval => {
                    emit(events, RunEvent::Retrieving { query: text.to_string() });
                    let result = self.retriever.retrieve(text, None).await;
                    emit(events, RunEvent::Retrieved { passages: result.passages.len() });
                    conversation.working.push(WorkingItem::Retrieval(result));
                    RunState::AwaitingGeneration
                }

                RunState::AwaitingGeneration => {
                    emit(events, RunEvent::Generating { hop: hops });
                    let request = self.build_request(&conversation);
                    match self.gateway.generate(&request).await {
                        Ok(ModelOutput::Text(reply)) => RunState::Responding(reply),
                        Ok(ModelOutput::ToolCall { tool, args }) => {
                            hops += 1;
                            if hops > self.max_tool_hops {
                                warn!(%run_id, hops, "工具跳数耗尽，强制收束");
                                RunState::Responding(HOPS_EXHAUSTED_REPLY.to_string())
                            } else if !self.dispatcher.registry().contains(&tool) {
                                RunState::Failed(OrchestratorError::HallucinatedTool(tool))
                            } else {
                                emit(events, RunEvent::ToolCall { tool: tool.clone() });
                                RunState::AwaitingToolResult(PendingCall { tool, args })
                            }
                        }
                        Err(err) => RunState::Failed(err),
                    }
                }

                RunState::AwaitingToolResult(call) => {
                    match self.dispatcher.dispatch(&call.tool, call.args.clone()).await {
                        Ok(invocation) => {
                            emit(
                                events,
                                RunEvent::Observation {
                                    tool: invocation.tool.clone(),
                                    ok: invocation.is_success(),
                                },
                            );
                            conversation
                                .working
                                .push(WorkingItem::ToolResult(invocation.clone()));
                            conversation.push_turn(Turn::tool(invocation));
                            RunState::AwaitingGeneration
                        }
                        Err(ToolError::Unknown(name)) => {
                            RunState::Failed(OrchestratorError::HallucinatedTool(name))
                        }
                        // 参数校验失败：写回失败观察，让模型修正参数重试
                        Err(err) => {
                            let invocation =
                                ToolInvocation::failure(&call.tool, call.args, err.to_string());
                            emit(
                                events,
                                RunEvent::Observation {
                                    tool: call.tool.clone(),
                                    ok: false,
                                },
                            );
                            conversation
                                .working
                                .push(WorkingItem::ToolResult(invocation.clone()));
                            conversation.push_turn(Turn::tool(invocation));
                            RunState::AwaitingGeneration
                        }
                    }
                }

                RunState::Responding(reply) => {
                    conversation.push_turn(Turn::assistant(reply.as_str()));
                    self.store
                        .save(&conversation)
                        .await
                        .map_err(|e| OrchestratorError::Storage(e.to_string()))?;
                    emit(events, RunEvent::Reply { text: reply.clone() });
                    info!(%run_id, conversation_id, turns = conversation.len(), hops, "run 完成");
                    return Ok(reply);
                }

                RunState::Failed(err) => {
                    // 已追加的 Turn 尽力保存；保存失败只记日志，不覆盖原始错误
                    if let Err(save_err) = self.store.save(&conversation).await {
                        warn!(%run_id, error = %save_err, "失败 run 的快照保存失败");
                    }
                    emit(events, RunEvent::Failed { reason: err.to_string() });
                    warn!(%run_id, conversation_id, error = %err, "run 失败");
                    return Err(err);
                }
            };
        }
    }

    /// 组装一次生成请求：system（基础 prompt + 工作记忆段 + 工具 schema）+ 截窗历史
    fn build_request(&self, conversation: &Conversation) -> ModelRequest {
        let mut system = self.system_prompt.clone();

        let working = conversation.working.to_prompt_section();
        if !working.is_empty() {
            system.push_str("\n\n");
            system.push_str(&working);
        }

        let specs = self.dispatcher.registry().specs();
        if !specs.is_empty() {
            system.push_str("\n## Available tools\n");
            system.push_str(&self.dispatcher.registry().to_schema_json());
            system.push_str(
                "\n\n需要调用工具时，只输出一个符合以下 schema 的 JSON 对象，不要附加其他文字；\
否则直接输出给用户的回复文本。\n",
            );
            system.push_str(&tool_call_schema_json());
        }

        let mut messages = vec![ChatMessage::system(system)];
        let start = conversation.len().saturating_sub(self.max_context_turns);
        for turn in &conversation.turns()[start..] {
            messages.push(match turn.role {
                Role::User => ChatMessage::user(turn.content.as_str()),
                Role::Assistant => ChatMessage::assistant(turn.content.as_str()),
                Role::Tool => {
                    let label = turn
                        .invocation
                        .as_ref()
                        .map(|i| i.tool.as_str())
                        .unwrap_or("tool");
                    ChatMessage::tool(format!("[{}] {}", label, turn.content))
                }
            });
        }

        ModelRequest {
            messages,
            tools: specs,
        }
    }
}

fn emit(events: Option<&UnboundedSender<RunEvent>>, event: RunEvent) {
    if let Some(tx) = events {
        // 接收端掉线不影响 run 本身
        let _ = tx.send(event);
    }
}
