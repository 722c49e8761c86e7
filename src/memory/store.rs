//! 对话持久化
//!
//! ConversationStore 为外部关系存储协作方的 seam：load / save。
//! 快照只含 Turn 序列，load 后工作记忆恒为空。
//! JsonFileStore 每会话一个 JSON 文件；MemoryStore 供测试与无持久化运行。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::memory::{Conversation, Turn};

/// 存储错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// 对话存储 seam：按会话标识读写 Turn 快照
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// 加载会话；不存在时返回 None
    async fn load(&self, id: &str) -> Result<Option<Conversation>, StoreError>;

    /// 保存会话快照（只含 Turn，不含工作记忆）
    async fn save(&self, conversation: &Conversation) -> Result<(), StoreError>;
}

/// 内存存储：快照经 JSON 往返，与文件实现保持同等语义
#[derive(Default)]
pub struct MemoryStore {
    snapshots: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn load(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        let snapshots = self.snapshots.read().await;
        let Some(raw) = snapshots.get(id) else {
            return Ok(None);
        };
        let turns: Vec<Turn> = serde_json::from_str(raw)?;
        Ok(Some(Conversation::from_turns(id, turns)))
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), StoreError> {
        let raw = serde_json::to_string(conversation.turns())?;
        self.snapshots
            .write()
            .await
            .insert(conversation.id().to_string(), raw);
        Ok(())
    }
}

/// 文件存储：root/{会话标识}.json，父目录不存在时自动创建
#[derive(Debug)]
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        // 会话标识可能含路径分隔符，做一次保守替换
        let safe: String = id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(format!("{}.json", safe))
    }
}

#[async_trait]
impl ConversationStore for JsonFileStore {
    async fn load(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        let data = tokio::fs::read_to_string(&path).await?;
        let turns: Vec<Turn> = serde_json::from_str(&data)?;
        Ok(Some(Conversation::from_turns(id, turns)))
    }

    async fn save(&self, conversation: &Conversation) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let data = serde_json::to_string_pretty(conversation.turns())?;
        tokio::fs::write(self.path_for(conversation.id()), data).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Role, WorkingItem};
    use crate::retrieval::RetrievalResult;

    fn sample_conversation() -> Conversation {
        let mut conv = Conversation::new("family-1");
        conv.push_turn(Turn::user("What's for dinner?"));
        conv.push_turn(Turn::tool(crate::tools::ToolInvocation::success(
            "echo",
            serde_json::json!({"text": "pasta"}),
            "pasta",
        )));
        conv.push_turn(Turn::assistant("Pasta tonight."));
        conv.working
            .push(WorkingItem::Retrieval(RetrievalResult::empty("dinner")));
        conv
    }

    #[tokio::test]
    async fn test_memory_store_round_trip_discards_working_memory() {
        let store = MemoryStore::new();
        let conv = sample_conversation();
        store.save(&conv).await.unwrap();

        let loaded = store.load("family-1").await.unwrap().unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.turns()[0].role, Role::User);
        assert_eq!(loaded.turns()[1].role, Role::Tool);
        assert!(loaded.turns()[1].invocation.is_some());
        assert_eq!(loaded.turns()[2].content, "Pasta tonight.");
        // 工作记忆不随快照保存
        assert!(loaded.working.is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_missing_returns_none() {
        let store = MemoryStore::new();
        assert!(store.load("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_json_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let conv = sample_conversation();
        store.save(&conv).await.unwrap();

        let loaded = store.load("family-1").await.unwrap().unwrap();
        assert_eq!(loaded.len(), 3);
        assert!(loaded.working.is_empty());

        let ordering: Vec<Role> = loaded.turns().iter().map(|t| t.role).collect();
        assert_eq!(ordering, vec![Role::User, Role::Tool, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_json_file_store_sanitizes_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let mut conv = Conversation::new("tg://user/42");
        conv.push_turn(Turn::user("hi"));
        store.save(&conv).await.unwrap();
        assert!(store.load("tg://user/42").await.unwrap().is_some());
    }
}
