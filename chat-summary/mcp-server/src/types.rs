//! Shared types for the chat summary MCP server
//!
//! Field names follow the IDE's camelCase JSON so sessions can be forwarded
//! from the chat view unchanged.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One request sent to the chat agent and the response it produced, if any
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatExchange {
    /// Text of the user's request
    pub request: String,

    /// Text of the agent's response; absent while the response is still streaming
    #[serde(default)]
    pub response: Option<String>,
}

impl ChatExchange {
    pub fn new(request: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            response: Some(response.into()),
        }
    }

    pub fn pending(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            response: None,
        }
    }
}

/// A chat session as tracked by the IDE
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    /// Session identifier; an empty id is replaced with a fresh UUID when stored
    #[serde(default)]
    pub id: String,

    /// Human-readable session title
    #[serde(default)]
    pub title: Option<String>,

    /// Request/response history, oldest first
    #[serde(default)]
    pub exchanges: Vec<ChatExchange>,

    /// Last summary produced or saved for this session
    #[serde(default)]
    pub summary: Option<String>,
}

impl ChatSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            exchanges: Vec::new(),
            summary: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_exchange(mut self, exchange: ChatExchange) -> Self {
        self.exchanges.push(exchange);
        self
    }

    /// Title if set, otherwise the id
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

/// A published summary document
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDocument {
    /// Resource URI the summary can be read from
    pub uri: String,

    pub session_id: String,

    pub summary: String,
}

/// Parameters for the store_session tool
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct StoreSessionParams {
    /// The session to record; replaces any session with the same id
    pub session: ChatSession,
}

/// Parameters for the append_exchange tool
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppendExchangeParams {
    pub session_id: String,

    pub exchange: ChatExchange,
}

/// Parameters for tools that address one session
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionParams {
    pub session_id: String,
}

/// Parameters for the update_session_summary tool
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSummaryParams {
    pub session_id: String,

    /// Replacement summary text
    pub summary: String,
}

/// Parameters for the resolve_summary_variables tool
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ResolveVariablesParams {
    /// Chat prompt that may contain `#session-summary:<session-id>` references
    pub prompt: String,
}

/// Parameters for the complete_summary_variable tool
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct CompleteVariableParams {
    /// Partial session id typed after `#session-summary:`
    #[serde(default)]
    pub prefix: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_deserializes_from_ide_json() {
        let session: ChatSession = serde_json::from_value(json!({
            "id": "s1",
            "title": "Refactor parser",
            "exchanges": [
                {"request": "Split the lexer", "response": "Done."},
                {"request": "Now add tests"}
            ]
        }))
        .unwrap();

        assert_eq!(session.display_name(), "Refactor parser");
        assert_eq!(session.exchanges[1], ChatExchange::pending("Now add tests"));
        assert_eq!(session.summary, None);
    }

    #[test]
    fn test_summary_document_is_camel_case() {
        let document = SummaryDocument {
            uri: "chat-session-summary:/s1".to_string(),
            session_id: "s1".to_string(),
            summary: "text".to_string(),
        };
        let value = serde_json::to_value(document).unwrap();
        assert_eq!(value["sessionId"], "s1");
    }
}
