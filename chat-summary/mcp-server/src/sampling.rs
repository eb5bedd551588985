//! Language model backed by MCP sampling
//!
//! The server owns no model credentials: summaries are produced by asking the
//! connected client to run the completion (`sampling/createMessage`).

use anyhow::{Context, bail};
use rmcp::RoleServer;
use rmcp::model::{Content, ContextInclusion, CreateMessageRequestParam, Role, SamplingMessage};
use rmcp::service::Peer;
use tracing::debug;

use crate::summary_agent::{LanguageModel, SummaryRequest};

pub struct SamplingModel {
    peer: Peer<RoleServer>,
}

impl SamplingModel {
    pub fn new(peer: Peer<RoleServer>) -> Self {
        Self { peer }
    }
}

impl LanguageModel for SamplingModel {
    async fn complete(&self, request: SummaryRequest) -> anyhow::Result<String> {
        let result = self
            .peer
            .create_message(CreateMessageRequestParam {
                messages: vec![SamplingMessage {
                    role: Role::User,
                    content: Content::text(request.prompt),
                }],
                model_preferences: None,
                system_prompt: Some(request.system_prompt),
                include_context: Some(ContextInclusion::None),
                temperature: None,
                max_tokens: request.max_tokens,
                stop_sequences: None,
                metadata: None,
            })
            .await
            .context("sampling request to the MCP client failed")?;

        debug!("Sampling completed by model `{}`", result.model);

        let Some(text) = result.message.content.as_text() else {
            bail!("the MCP client returned a non-text sampling result");
        };
        Ok(text.text.clone())
    }
}
