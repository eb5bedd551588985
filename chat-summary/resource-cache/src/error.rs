use std::sync::Arc;

use thiserror::Error;

use crate::ResourceId;

#[derive(Debug, Error)]
pub enum ResourceError {
    /// `register` was called for an identifier that already has a live entry.
    #[error("resource `{0}` is already registered")]
    DuplicateRegistration(ResourceId),

    /// `acquire` or `update` was called for an identifier with no live entry.
    #[error("no resource is registered for `{0}`")]
    UnknownIdentifier(ResourceId),

    #[error("invalid resource identifier `{input}`: {reason}")]
    InvalidIdentifier { input: String, reason: &'static str },

    /// The asynchronous initial contents failed to resolve. Shared by every
    /// reader that awaited the same seed.
    #[error("failed to resolve contents of `{id}`: {cause:#}")]
    Contents {
        id: ResourceId,
        cause: Arc<anyhow::Error>,
    },

    /// The configured save callback failed; the payload was left unchanged.
    #[error("failed to save `{id}`: {cause:#}")]
    Save { id: ResourceId, cause: anyhow::Error },
}
