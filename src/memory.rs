//! Conversational memory threaded through repeated chain invocations.
//!
//! [`ConversationBufferMemory`] keeps every turn by default. A [`TrimPolicy`]
//! can bound the buffer by turn count or by an approximate token budget.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::tokens::TokenCalculator;

/// Accumulates conversation history across chain invocations.
///
/// Implementations shared between concurrent chains must serialise `load`
/// and `save` internally.
#[async_trait]
pub trait Memory: Send + Sync {
    /// Render the accumulated history as one text block
    async fn load(&self) -> String;

    /// Append one turn
    async fn save(&self, input: &str, output: &str);

    /// Forget every turn
    async fn clear(&self);
}

/// One human/AI exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub input: String,
    pub output: String,
}

/// Strategy applied to the buffer after every save
pub trait TrimPolicy: Send + Sync + fmt::Debug {
    fn trim(&self, turns: &mut VecDeque<Turn>);
}

/// Never evicts
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepAll;

impl TrimPolicy for KeepAll {
    fn trim(&self, _turns: &mut VecDeque<Turn>) {}
}

/// Keeps the most recent `n` turns
#[derive(Debug, Clone, Copy)]
pub struct MaxTurns(pub usize);

impl TrimPolicy for MaxTurns {
    fn trim(&self, turns: &mut VecDeque<Turn>) {
        while turns.len() > self.0 {
            turns.pop_front();
        }
    }
}

/// Drops the oldest turns until the estimated token count of the remaining
/// ones fits the budget. The newest turn is always kept.
#[derive(Debug, Clone, Copy)]
pub struct MaxTokens(pub usize);

impl TrimPolicy for MaxTokens {
    fn trim(&self, turns: &mut VecDeque<Turn>) {
        let cost = |turn: &Turn| {
            TokenCalculator::count(&turn.input) + TokenCalculator::count(&turn.output)
        };
        let mut total: usize = turns.iter().map(cost).sum();
        while total > self.0 && turns.len() > 1 {
            if let Some(dropped) = turns.pop_front() {
                total -= cost(&dropped);
            }
        }
    }
}

/// Append-only buffer rendered as alternating `Human:` / `AI:` lines
#[derive(Debug)]
pub struct ConversationBufferMemory {
    turns: Mutex<VecDeque<Turn>>,
    policy: Box<dyn TrimPolicy>,
    human_prefix: String,
    ai_prefix: String,
}

impl Default for ConversationBufferMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationBufferMemory {
    pub fn new() -> Self {
        Self {
            turns: Mutex::new(VecDeque::new()),
            policy: Box::new(KeepAll),
            human_prefix: "Human".to_string(),
            ai_prefix: "AI".to_string(),
        }
    }

    /// Bound the buffer with a trimming strategy
    pub fn with_policy(mut self, policy: impl TrimPolicy + 'static) -> Self {
        self.policy = Box::new(policy);
        self
    }

    /// Override the `Human` / `AI` labels used when rendering
    pub fn with_prefixes(mut self, human: impl Into<String>, ai: impl Into<String>) -> Self {
        self.human_prefix = human.into();
        self.ai_prefix = ai.into();
        self
    }

    /// Snapshot of the stored turns, oldest first
    pub async fn turns(&self) -> Vec<Turn> {
        self.turns.lock().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.turns.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.turns.lock().await.is_empty()
    }

    fn render(&self, turns: &VecDeque<Turn>) -> String {
        turns
            .iter()
            .map(|turn| {
                format!(
                    "{}: {}\n{}: {}",
                    self.human_prefix, turn.input, self.ai_prefix, turn.output
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl Memory for ConversationBufferMemory {
    async fn load(&self) -> String {
        let turns = self.turns.lock().await;
        self.render(&turns)
    }

    async fn save(&self, input: &str, output: &str) {
        let mut turns = self.turns.lock().await;
        turns.push_back(Turn {
            input: input.to_string(),
            output: output.to_string(),
        });
        self.policy.trim(&mut turns);
        debug!(turns = turns.len(), "conversation turn saved");
    }

    async fn clear(&self) {
        self.turns.lock().await.clear();
    }
}
