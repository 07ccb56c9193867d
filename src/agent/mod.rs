//! Tool-using reasoning loop.

mod executor;
pub mod parser;
mod tool;

pub use executor::{AgentExecutor, AgentRun, AgentStep, DEFAULT_MAX_ITERATIONS};
pub use parser::{AgentAction, AgentOutput};
pub use tool::{FunctionTool, RetrieverTool, Tool, ToolError};
