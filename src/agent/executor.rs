use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::parser::{self, AgentAction, AgentOutput};
use super::tool::{Tool, ToolError};
use crate::external::{LlmError, LLM};

pub const DEFAULT_MAX_ITERATIONS: usize = 5;

const REACT_PREFIX: &str = "Answer the following question as best you can. You have access to the following tools:";

const REACT_FORMAT: &str = "Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question

Begin!";

/// One tool invocation and what came back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStep {
    pub action: AgentAction,
    pub observation: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRun {
    pub answer: String,
    pub steps: Vec<AgentStep>,
    /// True when the loop ran out of iterations before a final answer
    pub hit_limit: bool,
}

/// Bounded reason/act/observe loop over a set of tools
pub struct AgentExecutor {
    llm: Arc<dyn LLM>,
    tools: Vec<Arc<dyn Tool>>,
    max_iterations: usize,
}

impl AgentExecutor {
    pub fn new(llm: Arc<dyn LLM>) -> Self {
        Self {
            llm,
            tools: Vec::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Register a tool. A tool with the same name is replaced in place.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(index) => self.tools[index] = tool,
            None => self.tools.push(tool),
        }
        self
    }

    pub fn with_tools(self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        tools.into_iter().fold(self, |executor, tool| executor.with_tool(tool))
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Run the loop and return only the answer
    pub async fn execute(&self, goal: &str) -> Result<String, LlmError> {
        Ok(self.run(goal).await?.answer)
    }

    /// Run the loop to a final answer or until the iteration limit.
    ///
    /// LLM failures abort the run. Tool failures, including requests for a
    /// tool that is not registered, become observations for the next step.
    #[instrument(skip(self, goal), fields(max_iterations = self.max_iterations, tools = self.tools.len()))]
    pub async fn run(&self, goal: &str) -> Result<AgentRun, LlmError> {
        let mut steps: Vec<AgentStep> = Vec::new();

        for iteration in 1..=self.max_iterations {
            let prompt = self.build_prompt(goal, &steps);
            let output = self.llm.generate(&prompt).await?;
            debug!(iteration, output_len = output.len(), "reasoning step complete");

            match parser::parse(&output) {
                AgentOutput::Finish { answer } => {
                    info!(iteration, "agent finished");
                    return Ok(AgentRun {
                        answer,
                        steps,
                        hit_limit: false,
                    });
                }
                AgentOutput::Action(action) => {
                    let observation = self.invoke_tool(&action).await;
                    debug!(iteration, tool = %action.tool, observation_len = observation.len(), "tool observed");
                    steps.push(AgentStep {
                        action,
                        observation,
                    });
                }
            }
        }

        warn!(iterations = self.max_iterations, "agent hit iteration limit");
        Ok(AgentRun {
            answer: exhausted_answer(self.max_iterations, &steps),
            steps,
            hit_limit: true,
        })
    }

    fn find_tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .or_else(|| self.tools.iter().find(|t| t.name().eq_ignore_ascii_case(name)))
    }

    async fn invoke_tool(&self, action: &AgentAction) -> String {
        let result = match self.find_tool(&action.tool) {
            Some(tool) => {
                info!(tool = %action.tool, "invoking tool");
                tool.call(&action.input).await
            }
            None => Err(ToolError::UnknownTool {
                name: action.tool.clone(),
                available: self.tool_names(),
            }),
        };

        match result {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = %action.tool, error = %e, "tool call failed");
                e.to_string()
            }
        }
    }

    fn build_prompt(&self, goal: &str, steps: &[AgentStep]) -> String {
        let catalog = if self.tools.is_empty() {
            "(no tools available)".to_string()
        } else {
            self.tools
                .iter()
                .map(|t| format!("{}: {}", t.name(), t.description()))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let format = REACT_FORMAT.replace("{tool_names}", &self.tool_names().join(", "));

        let mut prompt = format!(
            "{}\n\n{}\n\n{}\n\nQuestion: {}\nThought:",
            REACT_PREFIX, catalog, format, goal
        );
        for step in steps {
            prompt.push_str(&format!(
                " {}\nObservation: {}\nThought:",
                without_thought_label(&step.action.log),
                step.observation
            ));
        }
        prompt
    }
}

/// The prompt already ends with `Thought:`, so drop the model's own label
fn without_thought_label(log: &str) -> &str {
    let log = log.trim_start();
    match log.get(..8) {
        Some(label) if label.eq_ignore_ascii_case("thought:") => log[8..].trim_start(),
        _ => log,
    }
}

fn exhausted_answer(max_iterations: usize, steps: &[AgentStep]) -> String {
    match steps.last() {
        Some(step) => format!(
            "Agent stopped after {} iterations without a final answer. Last observation: {}",
            max_iterations, step.observation
        ),
        None => format!(
            "Agent stopped after {} iterations without a final answer.",
            max_iterations
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tool::FunctionTool;
    use crate::external::GenerationParams;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays canned completions and records every prompt it receives
    struct ScriptedLlm {
        replies: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LLM for ScriptedLlm {
        fn provider(&self) -> &'static str {
            "scripted"
        }

        fn default_params(&self) -> GenerationParams {
            GenerationParams::new("scripted")
        }

        async fn complete(&self, prompt: &str, _params: &GenerationParams) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.replies.lock().unwrap().pop().unwrap_or_default())
        }
    }

    fn echo_tool(name: &str) -> Arc<dyn Tool> {
        Arc::new(FunctionTool::new(name, "Echoes input", |input: String| async move {
            Ok(format!("echoed {}", input))
        }))
    }

    #[tokio::test]
    async fn test_scratchpad_carries_observation() {
        let llm = Arc::new(ScriptedLlm::new(&[
            "Thought: use echo\nAction: echo\nAction Input: ping",
            "Final Answer: got it",
        ]));
        let executor = AgentExecutor::new(llm.clone()).with_tool(echo_tool("echo"));

        let run = executor.run("say ping").await.unwrap();
        assert_eq!(run.answer, "got it");
        assert!(!run.hit_limit);
        assert_eq!(run.steps.len(), 1);
        assert_eq!(run.steps[0].observation, "echoed ping");

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("echo: Echoes input"));
        assert!(prompts[0].ends_with("Question: say ping\nThought:"));
        assert!(prompts[1].ends_with(
            "Thought: use echo\nAction: echo\nAction Input: ping\nObservation: echoed ping\nThought:"
        ));
        assert!(!prompts[1].contains("Thought: Thought:"));
    }

    #[test]
    fn test_without_thought_label() {
        assert_eq!(without_thought_label("Thought: use echo\nAction: echo"), "use echo\nAction: echo");
        assert_eq!(without_thought_label("  THOUGHT:x"), "x");
        assert_eq!(without_thought_label("Action: echo"), "Action: echo");
        assert_eq!(without_thought_label("Thou"), "Thou");
    }

    #[test]
    fn test_duplicate_tool_replaced_in_place() {
        let llm = Arc::new(ScriptedLlm::new(&[]));
        let executor = AgentExecutor::new(llm)
            .with_tool(echo_tool("a"))
            .with_tool(echo_tool("b"))
            .with_tool(echo_tool("a"));
        assert_eq!(executor.tool_names(), ["a", "b"]);
        assert_eq!(executor.max_iterations(), DEFAULT_MAX_ITERATIONS);
    }

    #[tokio::test]
    async fn test_tool_name_matching_falls_back_to_case_insensitive() {
        let llm = Arc::new(ScriptedLlm::new(&["Action: ECHO Input: x", "Final Answer: ok"]));
        let executor = AgentExecutor::new(llm).with_tool(echo_tool("echo"));
        let run = executor.run("goal").await.unwrap();
        assert_eq!(run.steps[0].observation, "echoed x");
    }

    #[test]
    fn test_exhausted_answer() {
        assert_eq!(
            exhausted_answer(2, &[]),
            "Agent stopped after 2 iterations without a final answer."
        );
    }
}
