//! Contexts and their scope caches.
//!
//! A [`Context`] is a scope handle: Scoped services resolved against it are
//! created once and reused until the context is destroyed. The handle
//! itself only carries an identity and a free-form "extras" bag.
//!
//! The [`ContextRegistry`] owns the per-context caches. A cache is created
//! when its context is registered and freed as a whole on destroy, so no
//! instance outlives the scope that produced it.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::descriptor::{DescriptorId, Instance};
use crate::error::{Result, TenureError};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context#{}", self.0)
    }
}

type Extras = HashMap<String, Arc<dyn Any + Send + Sync>>;

/// A scope handle.
///
/// Cloning a context clones the handle, not the scope: clones compare
/// equal and share the same extras and cache.
///
/// Contexts are created by
/// [`ServiceProvider::create`](crate::provider::ServiceProvider::create)
/// and must be destroyed with
/// [`ServiceProvider::destroy`](crate::provider::ServiceProvider::destroy).
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    id: ContextId,
    extras: Mutex<Extras>,
}

impl Context {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id: ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)),
                extras: Mutex::new(HashMap::new()),
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    /// Attaches caller data to this context. Last write wins.
    pub fn set_extra<V: Any + Send + Sync>(&self, key: impl Into<String>, value: V) {
        self.inner.extras.lock().insert(key.into(), Arc::new(value));
    }

    /// Returns the value stored under `key`, if it has type `V`.
    pub fn get_extra<V: Any + Send + Sync>(&self, key: &str) -> Option<Arc<V>> {
        let value = self.inner.extras.lock().get(key).cloned()?;
        value.downcast::<V>().ok()
    }

    /// Removes `key`; returns whether it was present.
    pub fn remove_extra(&self, key: &str) -> bool {
        self.inner.extras.lock().remove(key).is_some()
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Context {}

impl Hash for Context {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id())
            .field("extras", &self.inner.extras.lock().len())
            .finish()
    }
}

/// Instances produced within one context, keyed by descriptor.
#[derive(Default)]
struct ScopeCache {
    instances: Mutex<HashMap<DescriptorId, Instance>>,
}

/// Table of live contexts and their caches.
#[derive(Default)]
pub(crate) struct ContextRegistry {
    caches: DashMap<ContextId, Arc<ScopeCache>>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `context` with an empty cache.
    pub fn register(&self, context: &Context) {
        debug!(context = %context.id(), "Registered context");
        self.caches.insert(context.id(), Arc::new(ScopeCache::default()));
    }

    /// Drops the cache of `context`. Returns `false` if it was not registered.
    pub fn unregister(&self, context: &Context) -> bool {
        let removed = self.caches.remove(&context.id()).is_some();
        if removed {
            debug!(context = %context.id(), "Destroyed context");
        }
        removed
    }

    pub fn contains(&self, context: &Context) -> bool {
        self.caches.contains_key(&context.id())
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    /// Returns the instance cached for `descriptor` in `context`, running
    /// `create` on a miss.
    ///
    /// No lock is held while `create` runs, so it may resolve further
    /// services against the same context. If a nested call filled the slot
    /// first, the earlier instance wins.
    pub fn get_or_create(
        &self,
        context: &Context,
        descriptor: DescriptorId,
        create: impl FnOnce() -> Result<Instance>,
    ) -> Result<Instance> {
        let cache = self
            .caches
            .get(&context.id())
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| {
                TenureError::invalid_operation(format!(
                    "Context {} is not registered, use create() to register the context.",
                    context.id()
                ))
            })?;

        if let Some(instance) = cache.instances.lock().get(&descriptor) {
            trace!(context = %context.id(), descriptor = %descriptor, "Scope cache hit");
            return Ok(Arc::clone(instance));
        }

        let created = create()?;
        let mut instances = cache.instances.lock();
        Ok(Arc::clone(instances.entry(descriptor).or_insert(created)))
    }

    /// Forgets every cached instance of `descriptor`, in every context.
    pub fn evict(&self, descriptor: DescriptorId) {
        for entry in self.caches.iter() {
            entry.value().instances.lock().remove(&descriptor);
        }
    }
}

impl fmt::Debug for ContextRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextRegistry")
            .field("contexts", &self.caches.len())
            .finish()
    }
}
