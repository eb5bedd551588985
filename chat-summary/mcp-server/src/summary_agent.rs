//! Agent that asks a language model to summarize a chat session
//!
//! The session history is rendered as a plain `User:` / `AI:` transcript and
//! sent as a single user message together with a fixed system prompt.

use std::future::Future;

use indoc::{formatdoc, indoc};
use resource_cache::ResourceError;
use thiserror::Error;
use tracing::{debug, info};

use crate::constants::{DEFAULT_MAX_EXCHANGES, DEFAULT_MAX_SUMMARY_TOKENS};
use crate::types::{ChatExchange, ChatSession};

const SYSTEM_PROMPT: &str = indoc! {"
    You are a chat agent that summarizes AI chat sessions between a user and a
    coding assistant inside an IDE.

    Write a concise summary in Markdown that another agent can use to continue
    the work. Cover:
    - the user's goals and the decisions that were made
    - what was completed, including files and symbols that were touched
    - open questions and the next steps that were agreed on

    Only state facts present in the transcript. Keep file paths, symbol names and
    error messages verbatim. Reply with the summary only.
"};

const NO_RESPONSE_PLACEHOLDER: &str = "(no response yet)";

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("unknown chat session `{0}`")]
    UnknownSession(String),

    #[error("`{0}` cannot be used as a chat session id")]
    InvalidSessionId(String),

    #[error("chat session `{0}` has no exchanges to summarize")]
    EmptySession(String),

    #[error("the language model returned an empty summary")]
    EmptyResponse,

    #[error("language model request failed: {0:#}")]
    Model(anyhow::Error),

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// A one-shot completion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRequest {
    pub system_prompt: String,
    pub prompt: String,
    pub max_tokens: u32,
}

/// A language model able to answer a single prompt
pub trait LanguageModel: Send + Sync {
    fn complete(&self, request: SummaryRequest) -> impl Future<Output = anyhow::Result<String>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryAgentConfig {
    /// Upper bound on the summary length, in model tokens
    pub max_tokens: u32,

    /// Only the most recent exchanges are sent to the model. At least one always is.
    pub max_exchanges: usize,
}

impl Default for SummaryAgentConfig {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_SUMMARY_TOKENS,
            max_exchanges: DEFAULT_MAX_EXCHANGES,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionSummaryAgent {
    config: SummaryAgentConfig,
}

impl SessionSummaryAgent {
    pub fn new(config: SummaryAgentConfig) -> Self {
        Self {
            config: SummaryAgentConfig {
                max_exchanges: config.max_exchanges.max(1),
                ..config
            },
        }
    }

    pub fn config(&self) -> &SummaryAgentConfig {
        &self.config
    }

    pub fn build_request(&self, session: &ChatSession) -> Result<SummaryRequest, SummaryError> {
        if session.exchanges.is_empty() {
            return Err(SummaryError::EmptySession(session.id.clone()));
        }

        let transcript = render_transcript(&session.exchanges, self.config.max_exchanges);
        let prompt = formatdoc! {"
            Summarize the chat session \"{name}\".

            <transcript>
            {transcript}</transcript>
            ",
            name = session.display_name(),
        };

        Ok(SummaryRequest {
            system_prompt: SYSTEM_PROMPT.to_string(),
            prompt,
            max_tokens: self.config.max_tokens,
        })
    }

    /// Summarize `session` with `model`. Empty sessions never reach the model.
    pub async fn summarize<M: LanguageModel>(
        &self,
        model: &M,
        session: &ChatSession,
    ) -> Result<String, SummaryError> {
        let request = self.build_request(session)?;
        debug!(
            "Requesting summary of session `{id}` ({count} exchanges, max {max} tokens)",
            id = session.id,
            count = session.exchanges.len(),
            max = request.max_tokens,
        );

        let reply = model.complete(request).await.map_err(SummaryError::Model)?;
        let summary = reply.trim();
        if summary.is_empty() {
            return Err(SummaryError::EmptyResponse);
        }

        info!("Summarized session `{}` ({} chars)", session.id, summary.len());
        Ok(summary.to_string())
    }
}

/// Render the last `max_exchanges` exchanges as a `User:` / `AI:` transcript
pub fn render_transcript(exchanges: &[ChatExchange], max_exchanges: usize) -> String {
    let skipped = exchanges.len().saturating_sub(max_exchanges);
    let mut transcript = String::new();

    if skipped > 0 {
        transcript.push_str(&format!("[{skipped} earlier exchange(s) omitted]\n\n"));
    }

    for exchange in &exchanges[skipped..] {
        transcript.push_str("User:\n");
        transcript.push_str(exchange.request.trim());
        transcript.push_str("\n\nAI:\n");
        match exchange.response.as_deref().map(str::trim) {
            Some(response) if !response.is_empty() => transcript.push_str(response),
            _ => transcript.push_str(NO_RESPONSE_PLACEHOLDER),
        }
        transcript.push_str("\n\n");
    }

    transcript
}
