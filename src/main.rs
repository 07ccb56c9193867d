use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

use mini_langchain::{
    agent::{AgentExecutor, RetrieverTool, Tool},
    external::{embeddings_from_config, from_config},
    loader::loader_for,
    Config, ConversationBufferMemory, InMemoryVectorStore, LLMChain, PromptTemplate,
    TokenCalculator, VectorStore, LLM,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// API key for the configured provider (defaults to the provider's env var)
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a single prompt to the configured LLM
    Ask {
        prompt: String,
    },
    /// Multi-turn conversation with buffer memory
    Chat,
    /// Answer a question grounded in local documents
    Rag {
        /// File or directory to index
        #[arg(short, long)]
        source: PathBuf,

        #[arg(short, long)]
        query: String,

        /// Number of passages to retrieve
        #[arg(short, default_value_t = 3)]
        k: usize,
    },
    /// Let the agent work towards a goal, optionally with document retrieval
    Agent {
        goal: String,

        /// File or directory exposed through a retriever tool
        #[arg(short, long)]
        source: Option<PathBuf>,
    },
}

const RAG_TEMPLATE: &str = "Use the following context to answer the question. \
If the context does not contain the answer, say so.

Context:
{context}

Question: {question}

Answer:";

const CHAT_TEMPLATE: &str = "The following is a conversation between a human and a helpful AI.

{history}
Human: {input}
AI:";

fn init_tracing(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn index_source(config: &Config, source: &Path) -> Result<Arc<InMemoryVectorStore>> {
    let embeddings = embeddings_from_config(&config.embedding, &config.ollama)?;
    let documents = loader_for(source)?.load().await?;
    if documents.is_empty() {
        return Err(anyhow!("No documents found in {}", source.display()));
    }

    let store = Arc::new(InMemoryVectorStore::new(embeddings));
    store.add_documents(&documents).await?;
    info!(documents = documents.len(), "source indexed");
    Ok(store)
}

async fn chat(llm: Arc<dyn LLM>) -> Result<()> {
    let prompt = PromptTemplate::new(CHAT_TEMPLATE, ["history", "input"]);
    let chain = LLMChain::new(prompt, llm).with_memory(Arc::new(ConversationBufferMemory::new()));
    let mut buffer = String::new();

    println!("Chatting with memory. Press Enter on an empty line to quit.");
    loop {
        print!("> ");
        io::stdout().flush()?;

        buffer.clear();
        io::stdin().read_line(&mut buffer)?;
        let input = buffer.trim();
        if input.is_empty() {
            break;
        }

        let values = HashMap::from([("input".to_string(), input.to_string())]);
        match chain.invoke(values).await {
            Ok(reply) => println!("{}", reply),
            Err(e) => println!("Error: {}", e),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let config = Config::from_env()?;
    init_tracing(&config.log_level);

    let llm = from_config(&config.llm, &config.ollama, args.api_key)?;

    match args.command {
        Command::Ask { prompt } => {
            info!(tokens = TokenCalculator::count(&prompt), "sending prompt");
            println!("{}", llm.generate(&prompt).await?);
        }
        Command::Chat => chat(llm).await?,
        Command::Rag { source, query, k } => {
            let store = index_source(&config, &source).await?;
            let hits = store.similarity_search_with_score(&query, k).await?;
            let context = hits
                .iter()
                .map(|hit| hit.document.page_content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");

            let prompt = PromptTemplate::new(RAG_TEMPLATE, ["context", "question"]);
            let values = HashMap::from([
                ("context".to_string(), context),
                ("question".to_string(), query),
            ]);
            let answer = LLMChain::new(prompt, llm).invoke(values).await?;

            println!("{}", answer);
            println!("\nSources:");
            for hit in &hits {
                println!(
                    "  [{:.3}] {}",
                    hit.score,
                    hit.document.source().unwrap_or("<unknown>")
                );
            }
        }
        Command::Agent { goal, source } => {
            let mut executor =
                AgentExecutor::new(llm).with_max_iterations(config.agent.max_iterations);
            if let Some(source) = source {
                let store = index_source(&config, &source).await?;
                let retriever: Arc<dyn Tool> = Arc::new(RetrieverTool::new(store, 3));
                executor = executor.with_tool(retriever);
            }

            let run = executor.run(&goal).await?;
            for (i, step) in run.steps.iter().enumerate() {
                println!("Step {}: {}({})", i + 1, step.action.tool, step.action.input);
                println!("  -> {}", step.observation);
            }
            println!("{}", run.answer);
        }
    }

    Ok(())
}
