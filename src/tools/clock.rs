//! Clock 工具：当前日期与时间
//!
//! 家庭助手的日程类问题（"今天几号"、"现在几点"）无需走模型知识，直接读系统时钟。

use async_trait::async_trait;
use chrono::Local;
use serde_json::Value;

use crate::tools::Tool;

/// Clock 工具：返回本地当前时间，可选 format（strftime）
pub struct ClockTool;

#[async_trait]
impl Tool for ClockTool {
    fn name(&self) -> &str {
        "clock"
    }

    fn description(&self) -> &str {
        "Current local date and time. Args: {\"format\": \"%Y-%m-%d %H:%M\"} (optional)"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": { "format": { "type": "string" } },
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let format = args
            .get("format")
            .and_then(|v| v.as_str())
            .unwrap_or("%Y-%m-%d %H:%M:%S %Z");
        Ok(Local::now().format(format).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clock_returns_formatted_time() {
        let out = ClockTool
            .execute(serde_json::json!({"format": "%Y"}))
            .await
            .unwrap();
        assert_eq!(out.len(), 4);
        assert!(out.chars().all(|c| c.is_ascii_digit()));
    }
}
