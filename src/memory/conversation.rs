//! 对话模型：Turn 与 Conversation
//!
//! Turn 一经追加不可修改；Conversation 仅暴露追加与只读访问，
//! 持久化快照只含 Turn 序列，run 级 WorkingMemory 不随快照保存。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::WorkingMemory;
use crate::tools::ToolInvocation;

/// 消息角色（与 LLM API 一致，外加 Tool 观察）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// 单条 Turn：角色、内容、时间戳，工具 Turn 附带产生它的 ToolInvocation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation: Option<ToolInvocation>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            invocation: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            invocation: None,
        }
    }

    pub fn tool(invocation: ToolInvocation) -> Self {
        Self {
            role: Role::Tool,
            content: invocation.observation(),
            timestamp: Utc::now(),
            invocation: Some(invocation),
        }
    }
}

/// 一条会话：稳定标识、追加式 Turn 历史、run 级工作记忆
#[derive(Clone, Debug)]
pub struct Conversation {
    id: String,
    turns: Vec<Turn>,
    pub working: WorkingMemory,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            turns: Vec::new(),
            working: WorkingMemory::new(),
        }
    }

    /// 从持久化快照恢复；工作记忆总是空的
    pub fn from_turns(id: impl Into<String>, turns: Vec<Turn>) -> Self {
        Self {
            id: id.into(),
            turns,
            working: WorkingMemory::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// 追加一条 Turn（唯一的写路径；历史不可改写）
    pub fn push_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// 最近一条用户消息的文本（作为检索 query）
    pub fn last_user_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
