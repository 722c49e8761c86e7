//! 编排层：run 状态机、进度事件与主循环

pub mod events;
pub mod loop_;
pub mod state;

pub use events::RunEvent;
pub use loop_::{Orchestrator, DEFAULT_SYSTEM_PROMPT};
pub use state::{PendingCall, RunState};
