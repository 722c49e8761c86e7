//! Hearth - 家庭会话助手编排引擎
//!
//! 入口：初始化日志、加载配置、装配助理，并运行一个最小的 stdin REPL。
//! 真正的渠道适配器（Bot / HTTP）在进程外，复用同一个 Assistant 入口。

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use hearth::config::load_config;
use hearth::Assistant;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hearth::observability::init();

    let cfg = load_config(None).context("Failed to load config")?;
    let assistant = Assistant::from_config(&cfg);

    let conversation_id = format!("repl-{}", uuid::Uuid::new_v4());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    stdout.write_all("hearth 已就绪，输入消息（Ctrl-D 退出）\n> ".as_bytes()).await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.is_empty() {
            stdout.write_all(b"> ").await?;
            stdout.flush().await?;
            continue;
        }

        let reply = assistant.reply_or_apology(&conversation_id, text).await;
        stdout
            .write_all(format!("{}\n> ", reply).as_bytes())
            .await?;
        stdout.flush().await?;
    }

    Ok(())
}
