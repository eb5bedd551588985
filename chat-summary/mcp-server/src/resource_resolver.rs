//! Resolves `chat-session-summary:` URIs to live summary documents

use resource_cache::{ReferenceHandle, ResourceError, ResourceId};
use thiserror::Error;
use tracing::debug;

use crate::constants::SUMMARY_SCHEME;
use crate::summaries::SessionSummaries;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    InvalidUri(#[from] ResourceError),

    #[error("`{uri}` uses the `{scheme}` scheme, expected `chat-session-summary`")]
    UnsupportedScheme { scheme: String, uri: ResourceId },

    #[error("no summary document is open at `{0}`")]
    NotFound(ResourceId),
}

#[derive(Clone)]
pub struct SessionSummaryResourceResolver {
    summaries: SessionSummaries,
}

impl SessionSummaryResourceResolver {
    pub fn new(summaries: SessionSummaries) -> Self {
        Self { summaries }
    }

    /// Take a counted reference to the document at `uri`. The reference is
    /// released when the returned handle is dropped.
    pub fn resolve(&self, uri: &str) -> Result<ReferenceHandle, ResolveError> {
        let id = ResourceId::parse(uri)?;
        if id.scheme() != SUMMARY_SCHEME {
            return Err(ResolveError::UnsupportedScheme {
                scheme: id.scheme().to_string(),
                uri: id,
            });
        }

        let handle = self
            .summaries
            .cache()
            .try_acquire(&id)
            .ok_or_else(|| ResolveError::NotFound(id.clone()))?;
        debug!("Resolved summary document {id}");
        Ok(handle)
    }

    /// Live summary documents
    pub fn list(&self) -> Vec<ResourceId> {
        self.summaries.documents()
    }

    /// Display label for a summary document
    pub async fn label(&self, id: &ResourceId) -> String {
        let Some(session_id) = SessionSummaries::session_id_of(id) else {
            return id.to_string();
        };
        let name = match self.summaries.sessions().get(&session_id).await {
            Some(session) => session.display_name().to_string(),
            None => session_id,
        };
        format!("Summary of {name}")
    }
}
