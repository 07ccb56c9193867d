use async_trait::async_trait;
use mini_langchain::{
    ChainError, ConversationBufferMemory, GenerationParams, InMemoryCache, LLMChain, LlmError,
    Memory, PromptError, PromptTemplate, LLM,
};
use mockall::mock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

mock! {
    pub Llm {}

    #[async_trait]
    impl LLM for Llm {
        fn provider(&self) -> &'static str;
        fn default_params(&self) -> GenerationParams;
        async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, LlmError>;
    }
}

fn mock_llm() -> MockLlm {
    let mut llm = MockLlm::new();
    llm.expect_provider().return_const("mock");
    llm.expect_default_params()
        .returning(|| GenerationParams::new("mock-model"));
    llm
}

/// Mock that answers "Reply N" and records every prompt it sees
fn recording_llm(prompts: Arc<Mutex<Vec<String>>>) -> MockLlm {
    let mut llm = mock_llm();
    let mut calls = 0;
    llm.expect_complete().returning(move |prompt, _| {
        calls += 1;
        prompts.lock().unwrap().push(prompt.to_string());
        Ok(format!("Reply {}", calls))
    });
    llm
}

fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[tokio::test]
async fn test_chain_formats_and_completes() {
    let mut llm = mock_llm();
    llm.expect_complete()
        .withf(|prompt, _| prompt.to_string() == "Hello World")
        .times(1)
        .returning(|_, _| Ok("Hi!".to_string()));

    let chain = LLMChain::new(PromptTemplate::new("Hello {name}", ["name"]), Arc::new(llm));
    let output = chain.invoke(values(&[("name", "World")])).await.unwrap();
    assert_eq!(output, "Hi!");
}

#[tokio::test]
async fn test_chain_with_memory_threads_history() {
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let memory = Arc::new(ConversationBufferMemory::new());
    let chain = LLMChain::new(
        PromptTemplate::new("History: {history} Input: {input}", ["history", "input"]),
        Arc::new(recording_llm(prompts.clone())),
    )
    .with_memory(memory.clone());

    let first = chain.invoke(values(&[("input", "Hi 1")])).await.unwrap();
    let second = chain.invoke(values(&[("input", "Hi 2")])).await.unwrap();
    assert_eq!(first, "Reply 1");
    assert_eq!(second, "Reply 2");

    {
        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts[0], "History:  Input: Hi 1");
        assert!(prompts[1].contains("Human: Hi 1"));
        assert!(prompts[1].contains("AI: Reply 1"));
    }

    assert_eq!(
        memory.load().await,
        "Human: Hi 1\nAI: Reply 1\nHuman: Hi 2\nAI: Reply 2"
    );
}

#[tokio::test]
async fn test_chain_without_memory_is_stateless() {
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let chain = LLMChain::new(
        PromptTemplate::new("Hello {name}", ["name"]),
        Arc::new(recording_llm(prompts.clone())),
    );

    let a = chain.invoke(values(&[("name", "Ann")])).await.unwrap();
    let b = chain.invoke(values(&[("name", "Bob")])).await.unwrap();
    assert_ne!(a, b);

    let prompts = prompts.lock().unwrap();
    assert_eq!(*prompts, ["Hello Ann", "Hello Bob"]);
}

#[tokio::test]
async fn test_memory_overrides_caller_history() {
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let memory = Arc::new(ConversationBufferMemory::new());
    memory.save("earlier", "answer").await;

    let chain = LLMChain::new(
        PromptTemplate::new("{history}|{input}", ["history", "input"]),
        Arc::new(recording_llm(prompts.clone())),
    )
    .with_memory(memory.clone());

    chain
        .invoke(values(&[("input", "now"), ("history", "forged")]))
        .await
        .unwrap();

    assert_eq!(
        prompts.lock().unwrap()[0],
        "Human: earlier\nAI: answer|now"
    );
    let turns = memory.turns().await;
    assert_eq!(turns.last().unwrap().input, "now");
}

#[tokio::test]
async fn test_missing_variable_skips_llm() {
    let mut llm = mock_llm();
    llm.expect_complete().never();
    let memory = Arc::new(ConversationBufferMemory::new());

    let chain = LLMChain::new(PromptTemplate::new("Hello {name}", ["name"]), Arc::new(llm))
        .with_memory(memory.clone());
    let err = chain.invoke(values(&[("nom", "x")])).await.unwrap_err();

    assert_eq!(
        err,
        ChainError::Prompt(PromptError::MissingVariable("name".to_string()))
    );
    assert!(memory.is_empty().await);
}

#[tokio::test]
async fn test_llm_error_propagates_and_memory_untouched() {
    let mut llm = mock_llm();
    llm.expect_complete()
        .times(1)
        .returning(|_, _| Err(LlmError::auth("mock", "bad key")));
    let memory = Arc::new(ConversationBufferMemory::new());

    let chain = LLMChain::new(PromptTemplate::new("{input}", ["input"]), Arc::new(llm))
        .with_memory(memory.clone());
    let err = chain.invoke(values(&[("input", "hi")])).await.unwrap_err();

    match err {
        ChainError::Llm(LlmError::AuthenticationFailure { provider, message }) => {
            assert_eq!(provider, "mock");
            assert_eq!(message, "bad key");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(memory.is_empty().await);
}

#[tokio::test]
async fn test_chain_params_are_passed_through() {
    let mut llm = mock_llm();
    llm.expect_complete()
        .withf(|_, params| params.temperature == Some(0.1) && params.model == "override")
        .times(1)
        .returning(|_, _| Ok("ok".to_string()));

    let chain = LLMChain::new(PromptTemplate::new("{q}", ["q"]), Arc::new(llm))
        .with_params(GenerationParams::new("override").with_temperature(0.1));
    assert_eq!(chain.invoke(values(&[("q", "?")])).await.unwrap(), "ok");
}

#[tokio::test]
async fn test_cache_hit_skips_llm_but_updates_memory() {
    let mut llm = mock_llm();
    llm.expect_complete()
        .times(1)
        .returning(|_, _| Ok("cached answer".to_string()));
    let cache = Arc::new(InMemoryCache::new());
    let memory = Arc::new(ConversationBufferMemory::new());

    let chain = LLMChain::new(PromptTemplate::new("Q: {input}", ["input"]), Arc::new(llm))
        .with_cache(cache.clone());
    let with_memory = chain.clone().with_memory(memory.clone());

    assert_eq!(chain.invoke(values(&[("input", "same")])).await.unwrap(), "cached answer");
    assert_eq!(
        with_memory.invoke(values(&[("input", "same")])).await.unwrap(),
        "cached answer"
    );
    assert_eq!(cache.len().await, 1);
    assert_eq!(memory.len().await, 1);
}

#[tokio::test]
async fn test_concurrent_invocations_share_memory_safely() {
    let mut llm = mock_llm();
    llm.expect_complete()
        .returning(|prompt, _| Ok(format!("echo {}", prompt)));
    let memory = Arc::new(ConversationBufferMemory::new());
    let chain = LLMChain::new(PromptTemplate::new("{input}", ["input"]), Arc::new(llm))
        .with_memory(memory.clone());

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let chain = chain.clone();
            tokio::spawn(async move {
                let input = i.to_string();
                chain.invoke(values(&[("input", input.as_str())])).await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let turns = memory.turns().await;
    assert_eq!(turns.len(), 16);
    for turn in turns {
        assert_eq!(turn.output, format!("echo {}", turn.input));
    }
}

#[tokio::test]
async fn test_shared_cache_separates_generation_settings() {
    let mut llm = mock_llm();
    llm.expect_complete()
        .times(3)
        .returning(|_, params| Ok(format!("t={:?} s={:?}", params.temperature, params.system_prompt)));
    let llm = Arc::new(llm);
    let cache = Arc::new(InMemoryCache::new());
    let prompt = PromptTemplate::new("Q: {input}", ["input"]);

    let cold = LLMChain::new(prompt.clone(), llm.clone())
        .with_cache(cache.clone())
        .with_params(GenerationParams::default().with_temperature(0.0));
    let hot = LLMChain::new(prompt.clone(), llm.clone())
        .with_cache(cache.clone())
        .with_params(GenerationParams::default().with_temperature(0.9));
    let pirate = LLMChain::new(prompt, llm)
        .with_cache(cache.clone())
        .with_params(
            GenerationParams::default()
                .with_temperature(0.0)
                .with_system_prompt("Talk like a pirate."),
        );

    let a = cold.invoke(values(&[("input", "same")])).await.unwrap();
    let b = hot.invoke(values(&[("input", "same")])).await.unwrap();
    let c = pirate.invoke(values(&[("input", "same")])).await.unwrap();
    assert_ne!(a, b);
    assert_ne!(a, c);

    // same settings again hit the cache
    assert_eq!(cold.invoke(values(&[("input", "same")])).await.unwrap(), a);
    assert_eq!(cache.len().await, 3);
}
