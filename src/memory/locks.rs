//! 会话级互斥锁
//!
//! 同一会话同时只允许一个 run；不同会话的 run 并发执行。
//! 锁按会话标识惰性创建，获取有上限等待，超时返回 ConversationBusy 而不是无限阻塞。
//! run 在任意挂起点被取消时，守卫随作用域释放，锁不会泄漏。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;

use crate::core::OrchestratorError;

/// 会话锁注册表
pub struct ConversationLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    max_wait: Duration,
}

impl ConversationLocks {
    pub fn new(max_wait: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            max_wait,
        }
    }

    /// 获取指定会话的锁；等待超过 max_wait 返回 ConversationBusy
    pub async fn acquire(&self, id: &str) -> Result<OwnedMutexGuard<()>, OrchestratorError> {
        let lock = {
            let mut locks = self.locks.lock().unwrap();
            locks
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };

        tokio::time::timeout(self.max_wait, lock.lock_owned())
            .await
            .map_err(|_| OrchestratorError::ConversationBusy(id.to_string()))
    }
}

impl Default for ConversationLocks {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}
