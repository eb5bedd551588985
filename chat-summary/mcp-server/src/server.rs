//! Chat Summary MCP Server implementation using the official rmcp SDK
//!
//! Tools record chat sessions and summarize them through MCP sampling; the
//! resulting summaries are listed and read as `chat-session-summary:` resources.

use indoc::indoc;
use resource_cache::{Resource as _, ResourceError};
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::*,
    service::RequestContext,
    tool, tool_handler, tool_router,
};
use serde_json::json;
use tracing::{debug, info};

use crate::constants::SUMMARY_MIME_TYPE;
use crate::resource_resolver::{ResolveError, SessionSummaryResourceResolver};
use crate::sampling::SamplingModel;
use crate::session_store::SessionStore;
use crate::summaries::SessionSummaries;
use crate::summary_agent::{LanguageModel, SessionSummaryAgent, SummaryAgentConfig, SummaryError};
use crate::types::{
    AppendExchangeParams, CompleteVariableParams, ResolveVariablesParams, SessionParams, StoreSessionParams,
    UpdateSummaryParams,
};
use crate::variable::SessionSummaryVariableResolver;

/// Chat Summary MCP Server
#[derive(Clone)]
pub struct SummaryServer {
    summaries: SessionSummaries,
    variables: SessionSummaryVariableResolver,
    resources: SessionSummaryResourceResolver,
    tool_router: ToolRouter<SummaryServer>,
}

fn summary_error(e: SummaryError) -> McpError {
    let data = Some(json!({"error": e.to_string()}));
    match &e {
        SummaryError::UnknownSession(_) | SummaryError::InvalidSessionId(_) | SummaryError::EmptySession(_) => {
            McpError::invalid_params(e.to_string(), data)
        }
        SummaryError::Resource(ResourceError::UnknownIdentifier(id)) => {
            McpError::resource_not_found(format!("Resource not found: {id}"), data)
        }
        _ => McpError::internal_error("Summarization failed", data),
    }
}

fn resolve_error(e: ResolveError) -> McpError {
    match &e {
        ResolveError::NotFound(id) => McpError::resource_not_found(format!("Resource not found: {id}"), None),
        ResolveError::InvalidUri(_) | ResolveError::UnsupportedScheme { .. } => {
            McpError::invalid_params(e.to_string(), None)
        }
    }
}

/// Size reported for a resource; `None` when it does not fit the protocol's `u32`
fn resource_size(len: usize) -> Option<u32> {
    u32::try_from(len).ok()
}

fn json_content(value: impl serde::Serialize) -> Result<CallToolResult, McpError> {
    let content = Content::json(value).map_err(|e| {
        McpError::internal_error(
            "Serialization failed",
            Some(json!({"error": format!("Failed to serialize tool result: {}", e)})),
        )
    })?;
    Ok(CallToolResult::success(vec![content]))
}

#[tool_router]
impl SummaryServer {
    pub fn new(config: SummaryAgentConfig) -> Self {
        Self::with_summaries(SessionSummaries::new(
            resource_cache::ResourceCache::new(),
            SessionStore::new(),
            SessionSummaryAgent::new(config),
        ))
    }

    pub fn with_summaries(summaries: SessionSummaries) -> Self {
        info!("Chat summary server initialized");
        Self {
            variables: SessionSummaryVariableResolver::new(summaries.clone()),
            resources: SessionSummaryResourceResolver::new(summaries.clone()),
            summaries,
            tool_router: Self::tool_router(),
        }
    }

    pub fn summaries(&self) -> &SessionSummaries {
        &self.summaries
    }

    #[tool(description = "Record a chat session (id, title and request/response exchanges) so it can be summarized. Replaces any session with the same id; an empty id is assigned a fresh one.")]
    async fn store_session(
        &self,
        Parameters(params): Parameters<StoreSessionParams>,
    ) -> Result<CallToolResult, McpError> {
        let exchanges = params.session.exchanges.len();
        let session_id = self.summaries.sessions().store(params.session).await;
        info!("Stored chat session `{session_id}` with {exchanges} exchanges");
        json_content(json!({"sessionId": session_id, "exchangeCount": exchanges}))
    }

    #[tool(description = "Append one request/response exchange to a recorded chat session.")]
    async fn append_exchange(
        &self,
        Parameters(params): Parameters<AppendExchangeParams>,
    ) -> Result<CallToolResult, McpError> {
        let count = self
            .summaries
            .sessions()
            .append_exchange(&params.session_id, params.exchange)
            .await
            .map_err(|e| McpError::invalid_params(e.to_string(), None))?;
        debug!("Session `{}` now has {count} exchanges", params.session_id);
        json_content(json!({"sessionId": params.session_id, "exchangeCount": count}))
    }

    #[tool(
        description = "\
            Summarize a recorded chat session using the client's language model.\n\
            The summary is published as the resource `chat-session-summary:/<sessionId>`\n\
            and stays available until `release_session_summary` is called.\
        "
    )]
    async fn summarize_session(
        &self,
        Parameters(params): Parameters<SessionParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let model = SamplingModel::new(context.peer.clone());
        self.summarize_with(&model, &params.session_id).await
    }

    pub async fn summarize_with<M: LanguageModel>(
        &self,
        model: &M,
        session_id: &str,
    ) -> Result<CallToolResult, McpError> {
        let document = self
            .summaries
            .summarize(model, session_id)
            .await
            .map_err(summary_error)?;
        json_content(document)
    }

    #[tool(description = "Expand every `#session-summary:<sessionId>` reference in a chat prompt into the summary of that session.")]
    async fn resolve_summary_variables(
        &self,
        Parameters(params): Parameters<ResolveVariablesParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let model = SamplingModel::new(context.peer.clone());
        self.resolve_variables_with(&model, &params.prompt).await
    }

    pub async fn resolve_variables_with<M: LanguageModel>(
        &self,
        model: &M,
        prompt: &str,
    ) -> Result<CallToolResult, McpError> {
        let resolved = self
            .variables
            .resolve_prompt(model, prompt)
            .await
            .map_err(summary_error)?;
        json_content(resolved)
    }

    #[tool(description = "Suggest session ids for a `#session-summary:` reference, given the text typed so far.")]
    async fn complete_summary_variable(
        &self,
        Parameters(params): Parameters<CompleteVariableParams>,
    ) -> Result<CallToolResult, McpError> {
        json_content(self.variables.complete_argument(&params.prefix).await)
    }

    #[tool(description = "Replace the text of a published session summary. The edit is also recorded on the session.")]
    async fn update_session_summary(
        &self,
        Parameters(params): Parameters<UpdateSummaryParams>,
    ) -> Result<CallToolResult, McpError> {
        let document = self
            .summaries
            .save(&params.session_id, params.summary)
            .await
            .map_err(summary_error)?;
        info!("Saved edited summary for session `{}`", params.session_id);
        json_content(document)
    }

    #[tool(description = "Release a published session summary. The resource disappears once no reader holds it.")]
    async fn release_session_summary(
        &self,
        Parameters(params): Parameters<SessionParams>,
    ) -> Result<CallToolResult, McpError> {
        let message = if self.summaries.release(&params.session_id) {
            format!("Released summary of session `{}`", params.session_id)
        } else {
            format!("No summary of session `{}` was published", params.session_id)
        };
        Ok(CallToolResult::success(vec![Content::text(message)]))
    }

    /// Resource listing for every live summary document
    pub async fn summary_resources(&self) -> Vec<Resource> {
        let mut resources = Vec::new();

        for id in self.resources.list() {
            // Released between listing and resolving.
            let Ok(handle) = self.resources.resolve(id.as_str()) else {
                continue;
            };
            let size = handle
                .read_contents()
                .await
                .ok()
                .and_then(|text| resource_size(text.len()));

            let mut raw = RawResource::new(id.as_str(), self.resources.label(&id).await);
            raw.description = Some("Summary of an IDE chat session".to_string());
            raw.mime_type = Some(SUMMARY_MIME_TYPE.to_string());
            raw.size = size;
            resources.push(raw.no_annotation());
        }

        resources
    }

    pub async fn read_summary(&self, uri: &str) -> Result<ReadResourceResult, McpError> {
        let handle = self.resources.resolve(uri).map_err(resolve_error)?;
        let text = handle.read_contents().await.map_err(|e| {
            McpError::internal_error(
                "Failed to read summary",
                Some(json!({"error": e.to_string()})),
            )
        })?;

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, handle.id().as_str())],
        })
    }
}

#[tool_handler]
impl ServerHandler for SummaryServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().enable_resources().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                indoc! {"
                    This server summarizes IDE chat sessions. Record sessions with 'store_session'
                    and 'append_exchange', then call 'summarize_session' to publish a summary as the
                    resource chat-session-summary:/<sessionId>. Use 'resolve_summary_variables' to
                    expand #session-summary:<sessionId> references in a prompt,
                    'complete_summary_variable' to suggest session ids, 'update_session_summary' to
                    save an edited summary and 'release_session_summary' when it is no longer needed.
                "}
                .to_string(),
            ),
        }
    }

    async fn initialize(
        &self,
        _request: InitializeRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<InitializeResult, McpError> {
        info!("MCP client connected and initialized");
        Ok(self.get_info())
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: self.summary_resources().await,
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        self.read_summary(&request.uri).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary_agent::SummaryRequest;
    use crate::types::{ChatExchange, ChatSession};

    struct FixedModel(&'static str);

    impl LanguageModel for FixedModel {
        async fn complete(&self, _request: SummaryRequest) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn result_json(result: &CallToolResult) -> serde_json::Value {
        let text = &result.content[0].as_text().unwrap().text;
        serde_json::from_str(text).unwrap()
    }

    async fn server_with_session() -> SummaryServer {
        let server = SummaryServer::new(SummaryAgentConfig::default());
        let session = ChatSession::new("s1")
            .with_title("Lexer split")
            .with_exchange(ChatExchange::new("Split the lexer", "Done."));
        server
            .store_session(Parameters(StoreSessionParams { session }))
            .await
            .unwrap();
        server
    }

    #[test]
    fn test_resource_size_does_not_truncate() {
        assert_eq!(resource_size(20), Some(20));
        assert_eq!(resource_size(u32::MAX as usize), Some(u32::MAX));
        #[cfg(target_pointer_width = "64")]
        assert_eq!(resource_size(u32::MAX as usize + 1), None);
    }

    #[test]
    fn test_server_info() {
        let info = SummaryServer::new(SummaryAgentConfig::default()).get_info();
        assert!(info.capabilities.tools.is_some());
        assert!(info.capabilities.resources.is_some());
        assert!(info.instructions.unwrap().contains("summarize_session"));
    }

    #[tokio::test]
    async fn test_store_and_append() {
        let server = server_with_session().await;

        let result = server
            .append_exchange(Parameters(AppendExchangeParams {
                session_id: "s1".to_string(),
                exchange: ChatExchange::pending("Now add tests"),
            }))
            .await
            .unwrap();
        assert_eq!(result_json(&result)["exchangeCount"], 2);

        let err = server
            .append_exchange(Parameters(AppendExchangeParams {
                session_id: "missing".to_string(),
                exchange: ChatExchange::pending("hello"),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_summarize_then_list_and_read() {
        let server = server_with_session().await;

        let result = server
            .summarize_with(&FixedModel("The lexer was split."), "s1")
            .await
            .unwrap();
        assert_eq!(result_json(&result)["uri"], "chat-session-summary:/s1");

        let resources = server.summary_resources().await;
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].raw.uri, "chat-session-summary:/s1");
        assert_eq!(resources[0].raw.name, "Summary of Lexer split");
        assert_eq!(resources[0].raw.mime_type.as_deref(), Some("text/markdown"));
        assert_eq!(resources[0].raw.size, Some(20));

        let read = server.read_summary("chat-session-summary:/s1").await.unwrap();
        match &read.contents[0] {
            ResourceContents::TextResourceContents { uri, text, .. } => {
                assert_eq!(uri, "chat-session-summary:/s1");
                assert_eq!(text, "The lexer was split.");
            }
            other => panic!("expected text contents, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let server = server_with_session().await;

        let err = server
            .summarize_with(&FixedModel("unused"), "nope")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);

        let err = server.read_summary("chat-session-summary:/s1").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RESOURCE_NOT_FOUND);

        let err = server.read_summary("file:///etc/hosts").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);

        let err = server
            .update_session_summary(Parameters(UpdateSummaryParams {
                session_id: "s1".to_string(),
                summary: "edited".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::RESOURCE_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_and_release() {
        let server = server_with_session().await;
        server
            .summarize_with(&FixedModel("The lexer was split."), "s1")
            .await
            .unwrap();

        let result = server
            .update_session_summary(Parameters(UpdateSummaryParams {
                session_id: "s1".to_string(),
                summary: "Edited summary".to_string(),
            }))
            .await
            .unwrap();
        assert_eq!(result_json(&result)["summary"], "Edited summary");

        let params = || {
            Parameters(SessionParams {
                session_id: "s1".to_string(),
            })
        };
        let released = server.release_session_summary(params()).await.unwrap();
        assert!(released.content[0].as_text().unwrap().text.starts_with("Released"));
        assert!(server.summary_resources().await.is_empty());

        let again = server.release_session_summary(params()).await.unwrap();
        assert!(again.content[0].as_text().unwrap().text.starts_with("No summary"));
    }

    #[tokio::test]
    async fn test_resolve_and_complete_variables() {
        let server = server_with_session().await;

        let result = server
            .resolve_variables_with(&FixedModel("The lexer was split."), "Use #session-summary:s1")
            .await
            .unwrap();
        let resolved = result_json(&result);
        assert_eq!(
            resolved["prompt"],
            "Use <session-summary id=\"s1\">\nThe lexer was split.\n</session-summary>"
        );
        assert_eq!(resolved["variables"][0]["contentsUri"], "chat-session-summary:/s1");

        let result = server
            .complete_summary_variable(Parameters(CompleteVariableParams {
                prefix: "s".to_string(),
            }))
            .await
            .unwrap();
        assert_eq!(result_json(&result)[0]["insertText"], "#session-summary:s1");
    }
}
