//! Session summary documents
//!
//! Summaries are published into the shared [`ResourceCache`] under
//! `chat-session-summary:/<session-id>`. The service pins one reference per
//! document so a summary stays readable until it is explicitly released;
//! readers take their own references on top of that.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use resource_cache::{
    ReferenceHandle, Resource, ResourceCache, ResourceId, ResourceInit, SaveCallback, UpdateOptions,
    save_callback,
};
use tracing::{debug, info, warn};

use crate::constants::SUMMARY_SCHEME;
use crate::session_store::SessionStore;
use crate::summary_agent::{LanguageModel, SessionSummaryAgent, SummaryError};
use crate::types::SummaryDocument;

#[derive(Clone)]
pub struct SessionSummaries {
    cache: ResourceCache,
    sessions: SessionStore,
    agent: Arc<SessionSummaryAgent>,
    /// Session id to the reference that keeps its document alive
    pinned: Arc<Mutex<HashMap<String, ReferenceHandle>>>,
}

impl SessionSummaries {
    pub fn new(cache: ResourceCache, sessions: SessionStore, agent: SessionSummaryAgent) -> Self {
        Self {
            cache,
            sessions,
            agent: Arc::new(agent),
            pinned: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn agent(&self) -> &SessionSummaryAgent {
        &self.agent
    }

    fn pinned(&self) -> MutexGuard<'_, HashMap<String, ReferenceHandle>> {
        self.pinned.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// URI of the summary document for `session_id`
    pub fn document_uri(session_id: &str) -> Result<ResourceId, SummaryError> {
        let uri = ResourceId::from_segments(SUMMARY_SCHEME, &[session_id])
            .map_err(|_| SummaryError::InvalidSessionId(session_id.to_string()))?;
        // Ids such as `.` or `..` do not survive normalization.
        if uri.file_name().as_deref() != Some(session_id) {
            return Err(SummaryError::InvalidSessionId(session_id.to_string()));
        }
        Ok(uri)
    }

    /// Session id addressed by a summary document URI
    pub fn session_id_of(uri: &ResourceId) -> Option<String> {
        if uri.scheme() != SUMMARY_SCHEME {
            return None;
        }
        uri.file_name()
    }

    /// Summarize a stored session and publish the result
    pub async fn summarize<M: LanguageModel>(
        &self,
        model: &M,
        session_id: &str,
    ) -> Result<SummaryDocument, SummaryError> {
        let uri = Self::document_uri(session_id)?;
        let session = self
            .sessions
            .get(session_id)
            .await
            .ok_or_else(|| SummaryError::UnknownSession(session_id.to_string()))?;

        let summary = self.agent.summarize(model, &session).await?;

        if let Err(e) = self.sessions.set_summary(session_id, summary.clone()).await {
            warn!("Could not record summary on session `{session_id}`: {e}");
        }
        self.publish(&uri, session_id, &summary)?;

        Ok(SummaryDocument {
            uri: uri.to_string(),
            session_id: session_id.to_string(),
            summary,
        })
    }

    /// Create or update the document and make sure it is pinned
    fn publish(&self, uri: &ResourceId, session_id: &str, summary: &str) -> Result<(), SummaryError> {
        let mut pinned = self.pinned();

        if let Some(handle) = pinned.get(session_id) {
            handle.update(UpdateOptions::contents(summary));
            debug!("Updated pinned summary document {uri}");
            return Ok(());
        }

        let handle = match self.cache.try_acquire(uri) {
            Some(handle) => {
                handle.update(UpdateOptions::contents(summary));
                handle
            }
            None => self.cache.register(
                uri.clone(),
                ResourceInit::new()
                    .contents(summary)
                    .on_save(self.write_back(session_id)),
            )?,
        };
        pinned.insert(session_id.to_string(), handle);
        info!("Published summary document {uri}");
        Ok(())
    }

    /// Save callback that records edited summaries on the session
    fn write_back(&self, session_id: &str) -> SaveCallback {
        let sessions = self.sessions.clone();
        let session_id = session_id.to_string();
        save_callback(move |contents| {
            let sessions = sessions.clone();
            let session_id = session_id.clone();
            async move { sessions.set_summary(&session_id, contents).await }
        })
    }

    /// Current text of a live summary document
    pub async fn current(&self, session_id: &str) -> Result<Option<String>, SummaryError> {
        let uri = Self::document_uri(session_id)?;
        let Some(handle) = self.cache.try_acquire(&uri) else {
            return Ok(None);
        };
        Ok(Some(handle.read_contents().await?))
    }

    /// Save edited summary text through the document, which records it on the session
    pub async fn save(&self, session_id: &str, summary: String) -> Result<SummaryDocument, SummaryError> {
        let uri = Self::document_uri(session_id)?;
        let handle = self.cache.acquire(&uri)?;
        handle.save_contents(summary).await?;

        Ok(SummaryDocument {
            uri: uri.to_string(),
            session_id: session_id.to_string(),
            summary: handle.read_contents().await?,
        })
    }

    /// Drop the pinned reference. Returns `false` if the document was not pinned.
    pub fn release(&self, session_id: &str) -> bool {
        let handle = self.pinned().remove(session_id);
        match handle {
            Some(handle) => {
                handle.dispose();
                info!("Released summary document for session `{session_id}`");
                true
            }
            None => false,
        }
    }

    /// Live summary documents, sorted
    pub fn documents(&self) -> Vec<ResourceId> {
        self.cache
            .ids()
            .into_iter()
            .filter(|id| id.scheme() == SUMMARY_SCHEME)
            .collect()
    }

    /// Release every pinned document and tear down the cache
    pub fn shutdown(&self) {
        let pinned: Vec<_> = self.pinned().drain().map(|(_, handle)| handle).collect();
        drop(pinned);
        self.cache.dispose();
    }
}
