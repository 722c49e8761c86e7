//! 记忆层：对话模型、run 级工作记忆、持久化与会话锁

pub mod conversation;
pub mod locks;
pub mod store;
pub mod working;

pub use conversation::{Conversation, Role, Turn};
pub use locks::ConversationLocks;
pub use store::{ConversationStore, JsonFileStore, MemoryStore, StoreError};
pub use working::{WorkingItem, WorkingMemory};
