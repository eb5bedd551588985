//! Reference-counted in-memory documents.
//!
//! A [`ResourceCache`] maps normalized [`ResourceId`]s to mutable, observable
//! text documents. Consumers share a document through [`ReferenceHandle`]s:
//! `register` creates it with one reference, `acquire` adds one, and the
//! document is disposed and removed when the last handle is released.

mod cache;
mod error;
mod id;
mod refcount;
mod resource;

pub use cache::{ReferenceHandle, ResourceCache};
pub use error::ResourceError;
pub use id::ResourceId;
pub use refcount::{EntryKey, RefCounted, Release};
pub use resource::{
    MutableResource, Resource, ResourceInit, SaveCallback, SaveFuture, UpdateOptions, save_callback,
};
