//! 工作记忆：单次 run 内的中间产物
//!
//! 携带检索上下文与工具结果穿过编排各步，拼入 system prompt；
//! run 结束即丢弃，只有 Turn 进入持久化。已知载荷用类型化变体而非无类型 map。

use crate::retrieval::RetrievalResult;
use crate::tools::ToolInvocation;

/// 工作记忆条目：检索结果 / 工具结果 / 草稿
#[derive(Debug, Clone)]
pub enum WorkingItem {
    Retrieval(RetrievalResult),
    ToolResult(ToolInvocation),
    Draft(String),
}

/// run 级工作记忆：条目按写入顺序保存
#[derive(Debug, Clone, Default)]
pub struct WorkingMemory {
    items: Vec<WorkingItem>,
}

impl WorkingMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: WorkingItem) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[WorkingItem] {
        &self.items
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 构建拼入 system prompt 的片段（Retrieved Context / Tool Results）
    pub fn to_prompt_section(&self) -> String {
        let mut context = String::new();
        let mut tools = String::new();

        for item in &self.items {
            match item {
                WorkingItem::Retrieval(result) => {
                    for p in &result.passages {
                        context.push_str(&format!("- [{} {:.2}] {}\n", p.source, p.score, p.text));
                    }
                }
                WorkingItem::ToolResult(inv) => {
                    tools.push_str(&format!("- {}: {}\n", inv.tool, inv.observation()));
                }
                WorkingItem::Draft(text) => {
                    tools.push_str(&format!("- draft: {}\n", text));
                }
            }
        }

        let mut s = String::new();
        if !context.is_empty() {
            s.push_str("## Retrieved Context\n");
            s.push_str(&context);
            s.push('\n');
        }
        if !tools.is_empty() {
            s.push_str("## Tool Results\n");
            s.push_str(&tools);
            s.push('\n');
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::Passage;

    #[test]
    fn test_prompt_section_renders_passages_and_tools() {
        let mut wm = WorkingMemory::new();
        wm.push(WorkingItem::Retrieval(RetrievalResult {
            query: "q".to_string(),
            passages: vec![Passage {
                text: "Paris facts".to_string(),
                source: "notes".to_string(),
                score: 0.8,
            }],
        }));
        wm.push(WorkingItem::ToolResult(ToolInvocation::success(
            "clock",
            serde_json::json!({}),
            "2026-08-25",
        )));

        let section = wm.to_prompt_section();
        assert!(section.contains("Retrieved Context"));
        assert!(section.contains("Paris facts"));
        assert!(section.contains("Tool Results"));
        assert!(section.contains("clock"));
    }

    #[test]
    fn test_empty_working_memory_renders_nothing() {
        assert!(WorkingMemory::new().to_prompt_section().is_empty());
    }
}
