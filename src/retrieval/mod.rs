//! 检索层：外部向量检索协作方的薄接口
//!
//! PassageSearch 为协作方 seam；Retriever 负责排序、按来源去重与降级：
//! 协作方不可用时返回空结果而不是让 run 失败（检索是 best-effort，生成必须继续）。
//! 默认实现 KeywordIndex 为进程内关键词重叠检索，供无真实向量库时与测试使用。

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 单条检索段落：文本、来源标识、相关度分数 [0,1]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub source: String,
    pub score: f32,
}

/// 一次检索的结果：查询与相关度降序的段落列表；仅在当前 run 内有效，不持久化
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub query: String,
    pub passages: Vec<Passage>,
}

impl RetrievalResult {
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            passages: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

/// 检索协作方错误（对编排层不可见：Retriever 统一降级为空结果）
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("search backend unavailable: {0}")]
    Unavailable(String),
}

/// 检索协作方 seam：search(query, k) 返回段落列表
#[async_trait]
pub trait PassageSearch: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, SearchError>;
}

/// 检索适配器：封装协作方，保证排序/去重/降级语义
pub struct Retriever {
    backend: Arc<dyn PassageSearch>,
    default_k: usize,
}

impl Retriever {
    pub fn new(backend: Arc<dyn PassageSearch>, default_k: usize) -> Self {
        Self {
            backend,
            default_k: default_k.max(1),
        }
    }

    /// 检索最相关的 k 条段落（k 为 None 时用默认值）。
    /// 返回值保证相关度降序、按来源去重；协作方失败时记一条 warn 并返回空结果。
    pub async fn retrieve(&self, query: &str, k: Option<usize>) -> RetrievalResult {
        let k = k.unwrap_or(self.default_k).max(1);
        let passages = match self.backend.search(query, k).await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "retrieval unavailable, proceeding without context");
                return RetrievalResult::empty(query);
            }
        };

        let mut sorted = passages;
        sorted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let mut seen = HashSet::new();
        let deduped: Vec<Passage> = sorted
            .into_iter()
            .filter(|p| seen.insert(p.source.clone()))
            .take(k)
            .collect();

        RetrievalResult {
            query: query.to_string(),
            passages: deduped,
        }
    }
}

/// 将文本切分为小写词集合，用于简单相似度（词重叠比例）
fn tokenize_lower(s: &str) -> HashSet<String> {
    s.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| w.len() > 1)
        .collect()
}

/// 进程内关键词检索：按查询词与条目词的重叠比例打分（归一化到 [0,1]）
#[derive(Clone, Default)]
pub struct KeywordIndex {
    entries: Arc<std::sync::RwLock<Vec<(String, String, HashSet<String>)>>>,
}

impl KeywordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 存入一段文本及其来源标识
    pub fn add(&self, source: impl Into<String>, text: impl Into<String>) {
        let text = text.into();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        let tokens = tokenize_lower(trimmed);
        self.entries
            .write()
            .unwrap()
            .push((source.into(), trimmed.to_string(), tokens));
    }
}

#[async_trait]
impl PassageSearch for KeywordIndex {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, SearchError> {
        let query_tokens = tokenize_lower(query);
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }
        let entries = self.entries.read().unwrap();
        let mut scored: Vec<Passage> = entries
            .iter()
            .map(|(source, text, tokens)| {
                let overlap = query_tokens.intersection(tokens).count();
                Passage {
                    text: text.clone(),
                    source: source.clone(),
                    score: overlap as f32 / query_tokens.len() as f32,
                }
            })
            .filter(|p| p.score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}
