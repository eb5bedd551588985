//! Integration tests for session summaries: summarize, read, edit, release

use std::collections::VecDeque;
use std::sync::Mutex;

use chat_summary_mcp::types::{ChatExchange, ChatSession};
use chat_summary_mcp::{
    LanguageModel, SessionStore, SessionSummaries, SessionSummaryAgent, SessionSummaryResourceResolver,
    SessionSummaryVariableResolver, SummaryAgentConfig, SummaryError, SummaryRequest,
};
use resource_cache::{Resource, ResourceCache};
use tokio::sync::broadcast::error::TryRecvError;

/// Answers with queued replies and records every request
struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<SummaryRequest>>,
}

impl ScriptedModel {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|reply| reply.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: SummaryRequest) -> anyhow::Result<String> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no scripted reply left"))
    }
}

async fn summaries_with(sessions: &[ChatSession], config: SummaryAgentConfig) -> SessionSummaries {
    let store = SessionStore::new();
    for session in sessions {
        store.store(session.clone()).await;
    }
    SessionSummaries::new(ResourceCache::new(), store, SessionSummaryAgent::new(config))
}

fn lexer_session() -> ChatSession {
    ChatSession::new("lexer")
        .with_title("Lexer split")
        .with_exchange(ChatExchange::new("Split the lexer into its own module", "Moved it to lexer.rs."))
        .with_exchange(ChatExchange::new("Add tests", "Added 4 tests in lexer_test.rs."))
}

#[tokio::test]
async fn test_summary_lifecycle() {
    let _ = tracing_subscriber::fmt::try_init();

    let summaries = summaries_with(&[lexer_session()], SummaryAgentConfig::default()).await;
    let resources = SessionSummaryResourceResolver::new(summaries.clone());
    let model = ScriptedModel::new(&["First summary", "Second summary"]);

    let document = summaries.summarize(&model, "lexer").await.unwrap();
    assert_eq!(document.uri, "chat-session-summary:/lexer");

    // A reader observes the re-summarized contents.
    let reader = resources.resolve(&document.uri).unwrap();
    let mut changes = reader.subscribe();
    assert_eq!(reader.read_contents().await.unwrap(), "First summary");

    summaries.summarize(&model, "lexer").await.unwrap();
    assert_eq!(changes.try_recv(), Ok(()));
    assert_eq!(reader.read_contents().await.unwrap(), "Second summary");

    // Saving through the document writes back to the session.
    summaries.save("lexer", "Edited summary".to_string()).await.unwrap();
    assert_eq!(changes.try_recv(), Ok(()));
    assert_eq!(
        summaries.sessions().get("lexer").await.unwrap().summary.as_deref(),
        Some("Edited summary")
    );

    // Releasing the pin keeps the document alive for the reader.
    assert!(summaries.release("lexer"));
    assert_eq!(resources.list().len(), 1);
    drop(reader);
    assert!(resources.list().is_empty());
    assert_eq!(changes.try_recv(), Err(TryRecvError::Closed));

    assert_eq!(model.request_count(), 2);
}

#[tokio::test]
async fn test_prompt_respects_exchange_limit() {
    let summaries = summaries_with(
        &[lexer_session()],
        SummaryAgentConfig {
            max_tokens: 128,
            max_exchanges: 1,
        },
    )
    .await;
    let model = ScriptedModel::new(&["Tests were added."]);

    summaries.summarize(&model, "lexer").await.unwrap();

    let requests = model.requests.lock().unwrap();
    assert_eq!(requests[0].max_tokens, 128);
    assert!(requests[0].prompt.contains("[1 earlier exchange(s) omitted]"));
    assert!(!requests[0].prompt.contains("Split the lexer"));
    assert!(requests[0].prompt.contains("Add tests"));
}

#[tokio::test]
async fn test_model_failure_publishes_nothing() {
    let summaries = summaries_with(&[lexer_session()], SummaryAgentConfig::default()).await;
    let model = ScriptedModel::new(&[]);

    let err = summaries.summarize(&model, "lexer").await.unwrap_err();

    assert!(matches!(err, SummaryError::Model(_)));
    assert!(summaries.documents().is_empty());
    assert_eq!(summaries.sessions().get("lexer").await.unwrap().summary, None);
}

#[tokio::test]
async fn test_variables_share_documents_with_resources() {
    let other = ChatSession::new("ci").with_exchange(ChatExchange::new("Fix CI", "Pinned the toolchain."));
    let summaries = summaries_with(&[lexer_session(), other], SummaryAgentConfig::default()).await;
    let variables = SessionSummaryVariableResolver::new(summaries.clone());
    let resources = SessionSummaryResourceResolver::new(summaries.clone());
    let model = ScriptedModel::new(&["Lexer summary", "CI summary"]);

    let resolved = variables
        .resolve_prompt(&model, "Compare #session-summary:lexer with #session-summary:ci.")
        .await
        .unwrap();

    assert_eq!(resolved.variables.len(), 2);
    assert!(resolved.prompt.ends_with("CI summary\n</session-summary>."));
    let uris: Vec<_> = resources.list().iter().map(ToString::to_string).collect();
    assert_eq!(uris, vec!["chat-session-summary:/ci", "chat-session-summary:/lexer"]);

    // An edited document is what later prompts see.
    summaries.save("ci", "CI was fixed by pinning".to_string()).await.unwrap();
    let resolved = variables.resolve_prompt(&model, "#session-summary:ci").await.unwrap();
    assert_eq!(resolved.variables[0].value, "CI was fixed by pinning");
    assert_eq!(model.request_count(), 2);
}
