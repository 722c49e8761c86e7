pub mod clock;
pub mod dispatcher;
pub mod echo;
pub mod registry;
pub mod schema;

pub use clock::ClockTool;
pub use dispatcher::ToolDispatcher;
pub use echo::EchoTool;
pub use registry::{Tool, ToolError, ToolInvocation, ToolRegistry, ToolSpec};
pub use schema::tool_call_schema_json;
