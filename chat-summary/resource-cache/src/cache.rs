//! The registry of shared resources.
//!
//! Each identifier maps to at most one live [`MutableResource`], wrapped in a
//! [`RefCounted`] table entry. Callers hold [`ReferenceHandle`]s; the entry is
//! torn down when the last handle is disposed (or dropped).
//!
//! All registry operations take the registry lock for their whole
//! check-then-act sequence and never hold it across an await point.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::broadcast;
use tracing::debug;

use crate::refcount::{EntryKey, RefCounted, Release};
use crate::resource::{MutableResource, Resource, ResourceInit, UpdateOptions};
use crate::{ResourceError, ResourceId};

#[derive(Default)]
struct Registry {
    entries: HashMap<ResourceId, RefCounted<Arc<MutableResource>>>,
    key_counter: u64,
}

impl Registry {
    fn release(&mut self, id: &ResourceId, key: EntryKey) {
        let release = match self.entries.get_mut(id) {
            Some(entry) if entry.key() == key => entry.release(),
            _ => {
                debug!(%id, "ignoring release of a stale reference");
                return;
            }
        };

        match release {
            Release::Remaining(count) => debug!(%id, count, "released resource reference"),
            Release::Last => {
                if let Some(entry) = self.entries.remove(id) {
                    entry.into_value().dispose();
                }
                debug!(%id, "last reference released, removed resource");
            }
        }
    }

    fn dispose_all(&mut self) {
        for (_, entry) in self.entries.drain() {
            entry.into_value().dispose();
        }
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.dispose_all();
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared, reference-counted resources addressed by [`ResourceId`].
///
/// Cloning the cache shares the same registry. The registry is torn down when
/// [`ResourceCache::dispose`] is called or the last clone is dropped.
#[derive(Clone, Default)]
pub struct ResourceCache {
    registry: Arc<Mutex<Registry>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resource for `id`, holding one reference through the returned handle.
    pub fn register(&self, id: ResourceId, init: ResourceInit) -> Result<ReferenceHandle, ResourceError> {
        let mut registry = lock(&self.registry);
        if registry.entries.contains_key(&id) {
            return Err(ResourceError::DuplicateRegistration(id));
        }

        let key = EntryKey::next(&mut registry.key_counter);
        let holder = Arc::new(MutableResource::new(id.clone(), init));
        registry
            .entries
            .insert(id.clone(), RefCounted::new(holder.clone(), key));
        debug!(%id, "registered resource");

        Ok(ReferenceHandle::new(&self.registry, id, key, holder))
    }

    pub fn acquire(&self, id: &ResourceId) -> Result<ReferenceHandle, ResourceError> {
        self.try_acquire(id)
            .ok_or_else(|| ResourceError::UnknownIdentifier(id.clone()))
    }

    pub fn try_acquire(&self, id: &ResourceId) -> Option<ReferenceHandle> {
        let mut registry = lock(&self.registry);
        let entry = registry.entries.get_mut(id)?;
        let holder = entry.acquire().clone();
        debug!(%id, count = entry.count(), "acquired resource reference");
        Some(ReferenceHandle::new(&self.registry, id.clone(), entry.key(), holder))
    }

    /// Patch the live resource for `id`.
    pub fn update(&self, id: &ResourceId, options: UpdateOptions) -> Result<(), ResourceError> {
        let holder = lock(&self.registry)
            .entries
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ResourceError::UnknownIdentifier(id.clone()))?;
        holder.update(options);
        Ok(())
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        lock(&self.registry).entries.contains_key(id)
    }

    pub fn reference_count(&self, id: &ResourceId) -> Option<usize> {
        lock(&self.registry).entries.get(id).map(RefCounted::count)
    }

    /// Live identifiers, sorted.
    pub fn ids(&self) -> Vec<ResourceId> {
        let mut ids: Vec<_> = lock(&self.registry).entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        lock(&self.registry).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispose every live resource. Outstanding handles keep their (now
    /// disposed) holder and their release becomes a no-op.
    pub fn dispose(&self) {
        lock(&self.registry).dispose_all();
        debug!("disposed resource cache");
    }
}

impl fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCache")
            .field("ids", &self.ids())
            .finish()
    }
}

/// One counted reference to a cached resource.
///
/// Behaves like the [`MutableResource`] it points at. Disposing the handle, or
/// dropping it, releases the reference exactly once. A released handle can
/// still read the last contents but ignores updates and saves.
pub struct ReferenceHandle {
    registry: Weak<Mutex<Registry>>,
    id: ResourceId,
    key: EntryKey,
    holder: Arc<MutableResource>,
    released: AtomicBool,
}

impl ReferenceHandle {
    fn new(registry: &Arc<Mutex<Registry>>, id: ResourceId, key: EntryKey, holder: Arc<MutableResource>) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            id,
            key,
            holder,
            released: AtomicBool::new(false),
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).release(&self.id, self.key);
        }
    }
}

impl Resource for ReferenceHandle {
    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn is_read_only(&self) -> bool {
        self.holder.is_read_only()
    }

    fn is_initially_dirty(&self) -> bool {
        self.holder.is_initially_dirty()
    }

    fn is_autosaveable(&self) -> bool {
        self.holder.is_autosaveable()
    }

    async fn read_contents(&self) -> Result<String, ResourceError> {
        self.holder.read_contents().await
    }

    async fn save_contents(&self, contents: String) -> Result<(), ResourceError> {
        if self.is_released() {
            debug!(id = %self.id, "ignoring save through a released reference");
            return Ok(());
        }
        self.holder.save_contents(contents).await
    }

    fn update(&self, options: UpdateOptions) {
        if self.is_released() {
            debug!(id = %self.id, "ignoring update through a released reference");
            return;
        }
        self.holder.update(options)
    }

    fn subscribe(&self) -> broadcast::Receiver<()> {
        self.holder.subscribe()
    }

    fn dispose(&self) {
        self.release()
    }
}

impl Drop for ReferenceHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ReferenceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceHandle")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("released", &self.is_released())
            .finish()
    }
}
