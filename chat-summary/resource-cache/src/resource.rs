//! Mutable, observable in-memory documents.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::broadcast;
use tracing::debug;

use crate::{ResourceError, ResourceId};

/// Number of unread change events a slow observer may fall behind by before
/// it starts seeing `RecvError::Lagged`.
const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Future returned by a save callback.
pub type SaveFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Invoked by [`Resource::save_contents`] with the contents being saved.
pub type SaveCallback = Arc<dyn Fn(String) -> SaveFuture + Send + Sync>;

type SharedContents = Shared<BoxFuture<'static, Result<String, Arc<anyhow::Error>>>>;

/// Wrap an async closure as a [`SaveCallback`].
pub fn save_callback<F, Fut>(callback: F) -> SaveCallback
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |contents| callback(contents).boxed())
}

#[derive(Clone)]
enum Contents {
    Ready(String),
    Pending(SharedContents),
}

/// Options used when a resource is first registered.
#[derive(Clone, Default)]
pub struct ResourceInit {
    contents: Option<Contents>,
    autosaveable: Option<bool>,
    initially_dirty: bool,
    read_only: Option<bool>,
    on_save: Option<SaveCallback>,
}

impl ResourceInit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(mut self, contents: impl Into<String>) -> Self {
        self.contents = Some(Contents::Ready(contents.into()));
        self
    }

    /// Seed the resource with contents that are still being computed. The
    /// future runs when the contents are first read.
    pub fn pending_contents<F>(mut self, contents: F) -> Self
    where
        F: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        let contents = contents.map(|result| result.map_err(Arc::new)).boxed().shared();
        self.contents = Some(Contents::Pending(contents));
        self
    }

    /// Defaults to `true`.
    pub fn autosaveable(mut self, autosaveable: bool) -> Self {
        self.autosaveable = Some(autosaveable);
        self
    }

    pub fn initially_dirty(mut self, initially_dirty: bool) -> Self {
        self.initially_dirty = initially_dirty;
        self
    }

    /// Defaults to `true` unless a save callback is configured.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = Some(read_only);
        self
    }

    pub fn on_save(mut self, on_save: SaveCallback) -> Self {
        self.on_save = Some(on_save);
        self
    }
}

/// A partial patch applied by `update`; `None` fields are left unchanged.
#[derive(Clone, Default)]
pub struct UpdateOptions {
    pub contents: Option<String>,
    pub on_save: Option<SaveCallback>,
}

impl UpdateOptions {
    pub fn contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Some(contents.into()),
            on_save: None,
        }
    }

    pub fn on_save(mut self, on_save: SaveCallback) -> Self {
        self.on_save = Some(on_save);
        self
    }
}

/// The contract shared by an owned [`MutableResource`] and a counted
/// [`ReferenceHandle`](crate::ReferenceHandle).
pub trait Resource {
    fn id(&self) -> &ResourceId;

    fn is_read_only(&self) -> bool;

    fn is_initially_dirty(&self) -> bool;

    fn is_autosaveable(&self) -> bool;

    /// Current contents, resolving a pending seed first.
    fn read_contents(&self) -> impl Future<Output = Result<String, ResourceError>> + Send;

    /// Run the save callback, then replace the contents. A resource without a
    /// save callback ignores the call.
    fn save_contents(&self, contents: String) -> impl Future<Output = Result<(), ResourceError>> + Send;

    fn update(&self, options: UpdateOptions);

    /// Receive one `()` per distinct contents replacement. The channel closes
    /// when the resource is disposed.
    fn subscribe(&self) -> broadcast::Receiver<()>;

    fn dispose(&self);
}

struct HolderState {
    contents: Contents,
    on_save: Option<SaveCallback>,
    /// `None` once disposed.
    changed: Option<broadcast::Sender<()>>,
}

impl HolderState {
    /// Replace the payload, notifying observers if it differs from the old one.
    fn replace(&mut self, contents: String) -> bool {
        let changed = match &self.contents {
            Contents::Ready(current) => *current != contents,
            Contents::Pending(_) => true,
        };
        if changed {
            self.contents = Contents::Ready(contents);
            if let Some(changed) = &self.changed {
                // No receivers is fine.
                let _ = changed.send(());
            }
        }
        changed
    }
}

/// An in-memory document with change notification.
pub struct MutableResource {
    id: ResourceId,
    read_only: bool,
    initially_dirty: bool,
    autosaveable: bool,
    state: Mutex<HolderState>,
}

impl MutableResource {
    pub fn new(id: ResourceId, init: ResourceInit) -> Self {
        let (changed, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            id,
            read_only: init.read_only.unwrap_or(init.on_save.is_none()),
            initially_dirty: init.initially_dirty,
            autosaveable: init.autosaveable.unwrap_or(true),
            state: Mutex::new(HolderState {
                contents: init.contents.unwrap_or_else(|| Contents::Ready(String::new())),
                on_save: init.on_save,
                changed: Some(changed),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HolderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().changed.is_none()
    }

    pub fn has_save_callback(&self) -> bool {
        self.lock().on_save.is_some()
    }

    pub fn update(&self, options: UpdateOptions) {
        let mut state = self.lock();
        if state.changed.is_none() {
            debug!(id = %self.id, "ignoring update of disposed resource");
            return;
        }
        if let Some(on_save) = options.on_save {
            state.on_save = Some(on_save);
        }
        if let Some(contents) = options.contents {
            if state.replace(contents) {
                debug!(id = %self.id, "resource contents changed");
            }
        }
    }

    pub async fn read_contents(&self) -> Result<String, ResourceError> {
        let pending = match &self.lock().contents {
            Contents::Ready(contents) => return Ok(contents.clone()),
            Contents::Pending(pending) => pending.clone(),
        };

        let resolved = pending.await.map_err(|cause| ResourceError::Contents {
            id: self.id.clone(),
            cause,
        })?;

        let mut state = self.lock();
        // Replaced while the seed was resolving: last write wins.
        if let Contents::Ready(current) = &state.contents {
            return Ok(current.clone());
        }
        if state.changed.is_some() {
            state.contents = Contents::Ready(resolved.clone());
        }
        Ok(resolved)
    }

    pub async fn save_contents(&self, contents: String) -> Result<(), ResourceError> {
        let Some(on_save) = self.lock().on_save.clone() else {
            debug!(id = %self.id, "resource has no save callback, ignoring save");
            return Ok(());
        };

        on_save(contents.clone())
            .await
            .map_err(|cause| ResourceError::Save {
                id: self.id.clone(),
                cause,
            })?;

        let mut state = self.lock();
        if state.changed.is_none() {
            debug!(id = %self.id, "resource disposed while saving, dropping saved contents");
            return Ok(());
        }
        state.replace(contents);
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        match &self.lock().changed {
            Some(changed) => changed.subscribe(),
            None => {
                let (closed, receiver) = broadcast::channel(1);
                drop(closed);
                receiver
            }
        }
    }

    /// Detach the change channel. Later updates and deferred saves are no-ops.
    pub fn dispose(&self) {
        if self.lock().changed.take().is_some() {
            debug!(id = %self.id, "disposed resource");
        }
    }
}

impl Resource for MutableResource {
    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn is_initially_dirty(&self) -> bool {
        self.initially_dirty
    }

    fn is_autosaveable(&self) -> bool {
        self.autosaveable
    }

    async fn read_contents(&self) -> Result<String, ResourceError> {
        MutableResource::read_contents(self).await
    }

    async fn save_contents(&self, contents: String) -> Result<(), ResourceError> {
        MutableResource::save_contents(self, contents).await
    }

    fn update(&self, options: UpdateOptions) {
        MutableResource::update(self, options)
    }

    fn subscribe(&self) -> broadcast::Receiver<()> {
        MutableResource::subscribe(self)
    }

    fn dispose(&self) {
        MutableResource::dispose(self)
    }
}

impl fmt::Debug for MutableResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutableResource")
            .field("id", &self.id)
            .field("read_only", &self.read_only)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}
