//! Storage for service descriptors.
//!
//! The [`Registry`] maps each service key to its ordered descriptor list
//! and keeps the pending-validation table: Singletons whose dependencies
//! were not registered yet when the Singleton was added.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::descriptor::ServiceDescriptor;
use crate::key::ServiceKey;

/// Missing dependency -> Singletons waiting for it.
pub(crate) type Pending = HashMap<ServiceKey, Vec<ServiceKey>>;

/// Service key -> descriptors in registration order.
///
/// A list is never empty: removing the last descriptor removes the entry.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    services: HashMap<ServiceKey, Vec<Arc<ServiceDescriptor>>>,
    pending: Pending,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `descriptor` to its service's list.
    pub fn push(&mut self, descriptor: Arc<ServiceDescriptor>) {
        debug!(
            service = %descriptor.service(),
            lifetime = %descriptor.lifetime(),
            implementation = descriptor.implementation_name(),
            "Registered service"
        );

        self.services
            .entry(descriptor.service().clone())
            .or_default()
            .push(descriptor);
    }

    /// Drops the most recent descriptor of `key`.
    pub fn pop(&mut self, key: &ServiceKey) -> Option<Arc<ServiceDescriptor>> {
        let list = self.services.get_mut(key)?;
        let popped = list.pop();
        if list.is_empty() {
            self.services.remove(key);
        }
        popped
    }

    /// Puts a whole entry back, e.g. after a failed replace.
    pub fn restore(&mut self, key: ServiceKey, descriptors: Vec<Arc<ServiceDescriptor>>) {
        if !descriptors.is_empty() {
            self.services.insert(key, descriptors);
        }
    }

    /// Removes the whole entry of `key`.
    pub fn remove(&mut self, key: &ServiceKey) -> Option<Vec<Arc<ServiceDescriptor>>> {
        let removed = self.services.remove(key);
        if removed.is_some() {
            debug!(service = %key, "Removed service");
        }
        removed
    }

    pub fn get(&self, key: &ServiceKey) -> Option<&[Arc<ServiceDescriptor>]> {
        self.services.get(key).map(Vec::as_slice)
    }

    /// The descriptor a single-value resolution uses.
    pub fn last(&self, key: &ServiceKey) -> Option<&Arc<ServiceDescriptor>> {
        self.services.get(key).and_then(|list| list.last())
    }

    pub fn first(&self, key: &ServiceKey) -> Option<&Arc<ServiceDescriptor>> {
        self.services.get(key).and_then(|list| list.first())
    }

    #[inline]
    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.services.contains_key(key)
    }

    /// Number of registered service keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ServiceKey> {
        self.services.keys()
    }

    /// Services whose most recent descriptor depends on `dependency`.
    pub fn dependents_of(&self, dependency: &ServiceKey) -> Vec<ServiceKey> {
        self.services
            .iter()
            .filter(|(_, list)| {
                list.last().is_some_and(|descriptor| {
                    descriptor
                        .dependencies()
                        .iter()
                        .any(|d| d.effective_key() == dependency)
                })
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Records that `dependent` waits for `dependency` to be registered.
    pub fn defer(&mut self, dependency: &ServiceKey, dependent: &ServiceKey) {
        let waiting = self.pending.entry(dependency.clone()).or_default();
        if !waiting.contains(dependent) {
            trace!(dependency = %dependency, dependent = %dependent, "Deferred singleton validation");
            waiting.push(dependent.clone());
        }
    }

    /// Takes every dependent waiting for `dependency`.
    pub fn take_pending(&mut self, dependency: &ServiceKey) -> Vec<ServiceKey> {
        self.pending.remove(dependency).unwrap_or_default()
    }

    /// Dependents currently waiting for `dependency`.
    #[cfg(test)]
    pub fn pending_for(&self, dependency: &ServiceKey) -> &[ServiceKey] {
        self.pending.get(dependency).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn snapshot_pending(&self) -> Pending {
        self.pending.clone()
    }

    pub fn restore_pending(&mut self, pending: Pending) {
        self.pending = pending;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor;
    use crate::descriptor::Instance;
    use crate::lifetime::Lifetime;

    struct Database;
    struct Cache;

    fn descriptor_for(key: ServiceKey, lifetime: Lifetime) -> Arc<ServiceDescriptor> {
        let builder = descriptor::builder(|_| Ok(Arc::new(Arc::new(0u8)) as Instance));
        Arc::new(ServiceDescriptor::new(key, lifetime, "test", Vec::new(), builder))
    }

    #[test]
    fn push_keeps_order_and_last_wins() {
        let mut registry = Registry::new();
        let key = ServiceKey::of::<Database>();
        let first = descriptor_for(key.clone(), Lifetime::Singleton);
        let second = descriptor_for(key.clone(), Lifetime::Transient);
        registry.push(first.clone());
        registry.push(second.clone());

        assert_eq!(registry.get(&key).map(<[_]>::len), Some(2));
        assert_eq!(registry.first(&key).map(|d| d.id()), Some(first.id()));
        assert_eq!(registry.last(&key).map(|d| d.id()), Some(second.id()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn pop_removes_empty_entry() {
        let mut registry = Registry::new();
        let key = ServiceKey::of::<Database>();
        registry.push(descriptor_for(key.clone(), Lifetime::Scoped));
        assert!(registry.pop(&key).is_some());
        assert!(!registry.contains(&key));
        assert!(registry.pop(&key).is_none());
    }

    #[test]
    fn remove_and_restore() {
        let mut registry = Registry::new();
        let key = ServiceKey::of::<Database>();
        registry.push(descriptor_for(key.clone(), Lifetime::Scoped));

        let removed = registry.remove(&key).unwrap();
        assert!(!registry.contains(&key));
        assert!(registry.remove(&key).is_none());

        registry.restore(key.clone(), removed);
        assert!(registry.contains(&key));
    }

    #[test]
    fn dependents_of_uses_last_descriptor() {
        use crate::injectable::Dependency;

        let mut registry = Registry::new();
        let builder = descriptor::builder(|_| Ok(Arc::new(Arc::new(0u8)) as Instance));
        registry.push(Arc::new(ServiceDescriptor::new(
            ServiceKey::of::<Cache>(),
            Lifetime::Singleton,
            "test",
            vec![Dependency::of::<Database>()],
            builder,
        )));

        assert_eq!(
            registry.dependents_of(&ServiceKey::of::<Database>()),
            vec![ServiceKey::of::<Cache>()]
        );

        registry.push(descriptor_for(ServiceKey::of::<Cache>(), Lifetime::Singleton));
        assert!(registry.dependents_of(&ServiceKey::of::<Database>()).is_empty());
    }

    #[test]
    fn pending_keeps_every_dependent() {
        let mut registry = Registry::new();
        let missing = ServiceKey::of::<Database>();
        let a = ServiceKey::of::<Cache>();
        let b = ServiceKey::of::<Lifetime>();

        registry.defer(&missing, &a);
        registry.defer(&missing, &b);
        registry.defer(&missing, &a);
        assert_eq!(registry.pending_for(&missing), &[a.clone(), b.clone()]);

        let snapshot = registry.snapshot_pending();
        assert_eq!(registry.take_pending(&missing), vec![a, b]);
        assert!(registry.pending_for(&missing).is_empty());

        registry.restore_pending(snapshot);
        assert_eq!(registry.pending_for(&missing).len(), 2);
    }
}
