//! Token 预算控制
//!
//! 请求发送前按提供商的 token 预算裁剪消息：从最旧的非 system 消息开始丢弃，
//! system 指令与最后一条用户消息永不丢弃。估算用字符数启发式，无需真实分词。

use crate::llm::{ChatMessage, ChatRole};

/// Token 估算器（简单的字符计数近似）
pub struct TokenEstimator;

impl TokenEstimator {
    /// 估算文本的 token 数量：英文约 4 字符/token，非 ASCII 约 1.5 字符/token
    pub fn estimate(text: &str) -> usize {
        let mut ascii_chars = 0usize;
        let mut non_ascii_chars = 0usize;

        for c in text.chars() {
            if c.is_ascii() {
                ascii_chars += 1;
            } else {
                non_ascii_chars += 1;
            }
        }

        let tokens = ascii_chars / 4 + (non_ascii_chars as f64 / 1.5).ceil() as usize;
        tokens.max(1)
    }

    pub fn estimate_messages(messages: &[ChatMessage]) -> usize {
        messages.iter().map(|m| Self::estimate(&m.content)).sum()
    }
}

/// 将消息序列裁剪到预算内。
///
/// 保护集：所有 system 消息与最后一条 User 消息；
/// 其余消息从最旧开始丢弃，直到估算值不超过预算（或只剩保护集）。
pub fn fit_to_budget(messages: Vec<ChatMessage>, budget: usize) -> Vec<ChatMessage> {
    if TokenEstimator::estimate_messages(&messages) <= budget {
        return messages;
    }

    let last_user_idx = messages
        .iter()
        .rposition(|m| m.role == ChatRole::User);

    let mut kept: Vec<(usize, ChatMessage)> = messages.into_iter().enumerate().collect();
    loop {
        let total: usize = kept
            .iter()
            .map(|(_, m)| TokenEstimator::estimate(&m.content))
            .sum();
        if total <= budget {
            break;
        }
        // 找最旧的可丢弃消息
        let droppable = kept.iter().position(|(idx, m)| {
            m.role != ChatRole::System && Some(*idx) != last_user_idx
        });
        match droppable {
            Some(pos) => {
                kept.remove(pos);
            }
            None => break, // 只剩保护集，照发
        }
    }

    kept.into_iter().map(|(_, m)| m).collect()
}
