//! Tool capabilities and the registry that dispatches them.

pub mod forecast;
pub mod memory_tool;
pub mod registry;
pub mod report;
pub mod search;
pub mod subagent_tool;
pub mod think;

pub use forecast::{
    ForecastClient, GetForecastDataTool, GetForecastPointsTool, GetForecastsTool,
    UpdateForecastTool,
};
pub use memory_tool::{MemoryManagerTool, SharedMemoryTool};
pub use registry::{parse_params, Tool, ToolRegistry, ToolResult, DEFAULT_TOOL_TIMEOUT};
pub use report::ReportResultsTool;
pub use search::WebSearchTool;
pub use subagent_tool::SubagentManagerTool;
pub use think::ThinkTool;
