//! Service descriptors.
//!
//! A [`ServiceDescriptor`] is the immutable record a registration produces:
//! which service it binds, with which lifetime, what the implementation
//! depends on, and how to build an instance. Replacing a registration swaps
//! the descriptor out of the registry; a descriptor is never mutated.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::error::{Result, TenureError};
use crate::injectable::Dependency;
use crate::key::ServiceKey;
use crate::lifetime::Lifetime;
use crate::provider::Activation;

/// A type-erased resolved value. Always holds an `Arc<S>` for the
/// descriptor's service type `S`.
pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

/// Builds one instance, uncached.
pub(crate) type Builder = Arc<dyn Fn(&Activation<'_>) -> Result<Instance> + Send + Sync>;

pub(crate) fn builder<F>(build: F) -> Builder
where
    F: Fn(&Activation<'_>) -> Result<Instance> + Send + Sync + 'static,
{
    Arc::new(build)
}

static NEXT_DESCRIPTOR_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a descriptor. Keys the scope caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorId(u64);

impl DescriptorId {
    pub(crate) fn next() -> Self {
        Self(NEXT_DESCRIPTOR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DescriptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An immutable (lifetime, resolver) binding for one service.
pub struct ServiceDescriptor {
    id: DescriptorId,
    service: ServiceKey,
    lifetime: Lifetime,
    implementation: &'static str,
    dependencies: Vec<Dependency>,
    builder: Builder,
}

impl ServiceDescriptor {
    pub(crate) fn new(
        service: ServiceKey,
        lifetime: Lifetime,
        implementation: &'static str,
        dependencies: Vec<Dependency>,
        builder: Builder,
    ) -> Self {
        Self {
            id: DescriptorId::next(),
            service,
            lifetime,
            implementation,
            dependencies,
            builder,
        }
    }

    #[inline]
    pub fn id(&self) -> DescriptorId {
        self.id
    }

    #[inline]
    pub fn service(&self) -> &ServiceKey {
        &self.service
    }

    #[inline]
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Type name of the implementation, or `"factory"` for factories.
    #[inline]
    pub fn implementation_name(&self) -> &'static str {
        self.implementation
    }

    /// Constructor dependencies in parameter order. Empty for factories.
    #[inline]
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Produces an instance under this descriptor's caching policy.
    ///
    /// Singleton and Scoped instances go through the scope cache of the
    /// activation's context; Transient instances are built every time.
    pub(crate) fn resolve(&self, activation: &Activation<'_>) -> Result<Instance> {
        if !self.lifetime.is_cached() {
            trace!(service = %self.service, "Building transient instance");
            return (self.builder)(activation);
        }

        let context = activation.context().ok_or_else(|| {
            TenureError::argument(
                format!("{} service {} requires a context", self.lifetime, self.service),
                "context",
            )
        })?;

        activation
            .contexts()
            .get_or_create(context, self.id, || (self.builder)(activation))
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("id", &self.id)
            .field("service", &self.service)
            .field("lifetime", &self.lifetime)
            .field("implementation", &self.implementation)
            .field("dependencies", &self.dependencies.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Mailer;

    #[test]
    fn ids_are_unique_and_ordered() {
        let a = DescriptorId::next();
        let b = DescriptorId::next();
        assert!(a < b);
        assert_ne!(a, b);
    }

    #[test]
    fn debug_shows_binding() {
        let descriptor = ServiceDescriptor::new(
            ServiceKey::of::<Mailer>(),
            Lifetime::Scoped,
            "factory",
            Vec::new(),
            builder(|_| Ok(Arc::new(Arc::new(Mailer)) as Instance)),
        );
        let rendered = format!("{descriptor:?}");
        assert!(rendered.contains("Mailer"));
        assert!(rendered.contains("Scoped"));
        assert_eq!(descriptor.implementation_name(), "factory");
        assert!(descriptor.dependencies().is_empty());
    }
}
