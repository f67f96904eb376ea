//! The service collection: registration and registration-time validation.
//!
//! A [`ServiceCollection`] owns everything the container knows: the
//! registry of descriptors, the pending-validation table, the table of
//! live contexts and the reserved singleton context. Cloning it clones a
//! handle; every clone and every [`ServiceProvider`] built from it share
//! the same state.
//!
//! # Registration modes
//! - `add_*` fails with [`TenureError::ServiceExist`] if the service is
//!   already registered.
//! - `try_add_*` is `add_*` that quietly keeps the first registration.
//! - `append_*` adds another implementation to a multi-binding.
//! - `replace_*` swaps out every existing registration; fails with
//!   [`TenureError::ServiceNotFound`] if there is none.
//!
//! A registration that fails validation leaves the collection exactly as
//! it was before the call.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tenure_support::rendering::suggest_similar;
use tracing::debug;

use crate::context::{Context, ContextRegistry};
use crate::descriptor::ServiceDescriptor;
use crate::error::{Result, ServiceExistError, ServiceNotFoundError, TenureError};
use crate::injectable::Implementation;
use crate::key::{IntoServiceType, ServiceKey, ServiceType};
use crate::lifetime::Lifetime;
use crate::options::ContainerOptions;
use crate::provider::ServiceProvider;
use crate::registry::Registry;
use crate::validation::{GraphValidator, validate_singleton};

static ROOT: Lazy<ServiceCollection> = Lazy::new(ServiceCollection::new);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Add,
    Append,
    Replace,
}

/// Registry of services and owner of their contexts.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use tenure_container::prelude::*;
///
/// trait Clock: Send + Sync {
///     fn now(&self) -> u64;
/// }
///
/// struct FixedClock;
///
/// impl Clock for FixedClock {
///     fn now(&self) -> u64 {
///         1_700_000_000
///     }
/// }
///
/// impl Injectable for FixedClock {
///     fn construct(_: &mut Arguments) -> Result<Self> {
///         Ok(FixedClock)
///     }
/// }
///
/// tenure_container::implements!(FixedClock => dyn Clock);
///
/// let services = ServiceCollection::new();
/// services.add_singleton(service::<dyn Clock>(), Implementation::of::<FixedClock>())?;
///
/// let clock = services.get_required_service(service::<dyn Clock>(), None)?;
/// assert_eq!(clock.now(), 1_700_000_000);
/// # Ok::<(), TenureError>(())
/// ```
#[derive(Clone)]
pub struct ServiceCollection {
    inner: Arc<CollectionInner>,
}

struct CollectionInner {
    registry: RwLock<Registry>,
    contexts: ContextRegistry,
    singleton_context: Context,
    options: ContainerOptions,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::with_options(ContainerOptions::default())
    }

    pub fn with_options(options: ContainerOptions) -> Self {
        let contexts = ContextRegistry::new();
        let singleton_context = Context::new();
        contexts.register(&singleton_context);

        debug!(?options, "Created service collection");

        Self {
            inner: Arc::new(CollectionInner {
                registry: RwLock::new(Registry::new()),
                contexts,
                singleton_context,
                options,
            }),
        }
    }

    /// The process-wide default collection, built on first use.
    ///
    /// It is an ordinary collection. Code that should stay testable takes a
    /// `&ServiceCollection` instead of reaching for the root.
    pub fn root() -> &'static ServiceCollection {
        &ROOT
    }

    #[inline]
    pub fn options(&self) -> &ContainerOptions {
        &self.inner.options
    }

    // ============================================================
    // Registration
    // ============================================================

    /// Registers `implementation` for `service`.
    ///
    /// # Errors
    /// - [`TenureError::Argument`] if `service` is not a valid service type,
    ///   or a token is asked to construct itself
    /// - [`TenureError::ServiceExist`] if `service` is already registered
    /// - [`TenureError::LifestyleMismatch`] if a Singleton would depend on a
    ///   shorter-lived service, checked now or when the dependency arrives
    pub fn add_service<T: IntoServiceType>(
        &self,
        service: T,
        implementation: Implementation<T::Service>,
        lifetime: Lifetime,
    ) -> Result<()> {
        self.register(service.into_service_type(), implementation, lifetime, Mode::Add)
    }

    /// Like [`add_service`](Self::add_service), but an existing registration
    /// is kept. Returns whether the new one was added.
    pub fn try_add_service<T: IntoServiceType>(
        &self,
        service: T,
        implementation: Implementation<T::Service>,
        lifetime: Lifetime,
    ) -> Result<bool> {
        match self.add_service(service, implementation, lifetime) {
            Ok(()) => Ok(true),
            Err(TenureError::ServiceExist(existing)) => {
                debug!(service = %existing.key, "Kept existing registration");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Adds one more implementation of `service`.
    pub fn append_service<T: IntoServiceType>(
        &self,
        service: T,
        implementation: Implementation<T::Service>,
        lifetime: Lifetime,
    ) -> Result<()> {
        self.register(service.into_service_type(), implementation, lifetime, Mode::Append)
    }

    /// Replaces every registration of `service` with `implementation`.
    pub fn replace_service<T: IntoServiceType>(
        &self,
        service: T,
        implementation: Implementation<T::Service>,
        lifetime: Lifetime,
    ) -> Result<()> {
        self.register(service.into_service_type(), implementation, lifetime, Mode::Replace)
    }

    // ── Singleton ──

    pub fn add_singleton<T: IntoServiceType>(
        &self,
        service: T,
        implementation: Implementation<T::Service>,
    ) -> Result<()> {
        self.add_service(service, implementation, Lifetime::Singleton)
    }

    pub fn try_add_singleton<T: IntoServiceType>(
        &self,
        service: T,
        implementation: Implementation<T::Service>,
    ) -> Result<bool> {
        self.try_add_service(service, implementation, Lifetime::Singleton)
    }

    pub fn append_singleton<T: IntoServiceType>(
        &self,
        service: T,
        implementation: Implementation<T::Service>,
    ) -> Result<()> {
        self.append_service(service, implementation, Lifetime::Singleton)
    }

    pub fn replace_singleton<T: IntoServiceType>(
        &self,
        service: T,
        implementation: Implementation<T::Service>,
    ) -> Result<()> {
        self.replace_service(service, implementation, Lifetime::Singleton)
    }

    // ── Scoped ──

    pub fn add_scoped<T: IntoServiceType>(
        &self,
        service: T,
        implementation: Implementation<T::Service>,
    ) -> Result<()> {
        self.add_service(service, implementation, Lifetime::Scoped)
    }

    pub fn try_add_scoped<T: IntoServiceType>(
        &self,
        service: T,
        implementation: Implementation<T::Service>,
    ) -> Result<bool> {
        self.try_add_service(service, implementation, Lifetime::Scoped)
    }

    pub fn append_scoped<T: IntoServiceType>(
        &self,
        service: T,
        implementation: Implementation<T::Service>,
    ) -> Result<()> {
        self.append_service(service, implementation, Lifetime::Scoped)
    }

    pub fn replace_scoped<T: IntoServiceType>(
        &self,
        service: T,
        implementation: Implementation<T::Service>,
    ) -> Result<()> {
        self.replace_service(service, implementation, Lifetime::Scoped)
    }

    // ── Transient ──

    pub fn add_transient<T: IntoServiceType>(
        &self,
        service: T,
        implementation: Implementation<T::Service>,
    ) -> Result<()> {
        self.add_service(service, implementation, Lifetime::Transient)
    }

    pub fn try_add_transient<T: IntoServiceType>(
        &self,
        service: T,
        implementation: Implementation<T::Service>,
    ) -> Result<bool> {
        self.try_add_service(service, implementation, Lifetime::Transient)
    }

    pub fn append_transient<T: IntoServiceType>(
        &self,
        service: T,
        implementation: Implementation<T::Service>,
    ) -> Result<()> {
        self.append_service(service, implementation, Lifetime::Transient)
    }

    pub fn replace_transient<T: IntoServiceType>(
        &self,
        service: T,
        implementation: Implementation<T::Service>,
    ) -> Result<()> {
        self.replace_service(service, implementation, Lifetime::Transient)
    }

    /// Removes every registration of `service`. Returns whether there was one.
    ///
    /// Instances already cached for the removed descriptors are dropped
    /// from every live context.
    pub fn remove<T: IntoServiceType>(&self, service: T) -> bool {
        let key = service.into_service_type().into_key();
        let removed = self.inner.registry.write().remove(&key);

        match removed {
            Some(descriptors) => {
                self.evict(&descriptors);
                true
            }
            None => false,
        }
    }

    // ============================================================
    // Inspection
    // ============================================================

    /// Descriptors of `service` in registration order.
    pub fn get_service_descriptors<T: IntoServiceType>(
        &self,
        service: T,
    ) -> Result<Vec<Arc<ServiceDescriptor>>> {
        self.descriptors(service.into_service_type().key())
    }

    pub fn has_service<T: IntoServiceType>(&self, service: T) -> bool {
        self.inner
            .registry
            .read()
            .contains(service.into_service_type().key())
    }

    /// Number of registered services. A multi-binding counts once.
    pub fn len(&self) -> usize {
        self.inner.registry.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered service keys, sorted by name.
    pub fn registered_keys(&self) -> Vec<ServiceKey> {
        let mut keys: Vec<ServiceKey> = self.inner.registry.read().keys().cloned().collect();
        keys.sort_by(|a, b| a.name().cmp(b.name()));
        keys
    }

    /// Checks the whole dependency graph.
    ///
    /// Unlike registration-time validation this reports missing
    /// dependencies and cycles, and checks every implementation of a
    /// multi-binding.
    pub fn validate(&self) -> Result<()> {
        let registry = self.inner.registry.read();
        GraphValidator::new(&registry).validate()
    }

    // ============================================================
    // Resolution
    // ============================================================

    /// A provider over this collection's registry and contexts.
    pub fn build_service_provider(&self) -> ServiceProvider {
        ServiceProvider::new(self.clone())
    }

    /// See [`ServiceProvider::get_required_service`].
    pub fn get_required_service<T: IntoServiceType>(
        &self,
        service: T,
        context: Option<&Context>,
    ) -> Result<Arc<T::Service>> {
        self.build_service_provider().get_required_service(service, context)
    }

    /// See [`ServiceProvider::get_service`].
    pub fn get_service<T: IntoServiceType>(
        &self,
        service: T,
        context: Option<&Context>,
    ) -> Result<Option<Arc<T::Service>>> {
        self.build_service_provider().get_service(service, context)
    }

    /// See [`ServiceProvider::get_services`].
    pub fn get_services<T: IntoServiceType>(
        &self,
        service: T,
        context: Option<&Context>,
    ) -> Result<Vec<Arc<T::Service>>> {
        self.build_service_provider().get_services(service, context)
    }

    /// See [`ServiceProvider::create`].
    pub fn create(&self) -> Context {
        self.build_service_provider().create()
    }

    /// See [`ServiceProvider::destroy`].
    pub fn destroy(&self, context: &Context) -> Result<()> {
        self.build_service_provider().destroy(context)
    }

    /// See [`ServiceProvider::create_scope`].
    pub fn create_scope<R>(&self, scope: impl FnOnce(&Context) -> Result<R>) -> Result<R> {
        self.build_service_provider().create_scope(scope)
    }

    /// See [`ServiceProvider::create_scope_async`].
    pub async fn create_scope_async<F, Fut, R>(&self, scope: F) -> Result<R>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        self.build_service_provider().create_scope_async(scope).await
    }

    // ============================================================
    // Internals
    // ============================================================

    pub(crate) fn contexts(&self) -> &ContextRegistry {
        &self.inner.contexts
    }

    pub(crate) fn singleton_context(&self) -> &Context {
        &self.inner.singleton_context
    }

    pub(crate) fn descriptors(&self, key: &ServiceKey) -> Result<Vec<Arc<ServiceDescriptor>>> {
        let registry = self.inner.registry.read();
        registry
            .get(key)
            .map(<[_]>::to_vec)
            .ok_or_else(|| not_found(&registry, key))
    }

    pub(crate) fn last_descriptor(&self, key: &ServiceKey) -> Option<Arc<ServiceDescriptor>> {
        self.inner.registry.read().last(key).cloned()
    }

    pub(crate) fn not_found(&self, key: &ServiceKey) -> TenureError {
        not_found(&self.inner.registry.read(), key)
    }

    fn register<S: ?Sized + Send + Sync + 'static>(
        &self,
        service: ServiceType<S>,
        implementation: Implementation<S>,
        lifetime: Lifetime,
        mode: Mode,
    ) -> Result<()> {
        let key = service.into_key();

        if self.inner.options.validate_service_shape && !key.is_shape_valid() {
            return Err(TenureError::argument(
                format!("{key} is not a valid service type; wrap the value in a struct or use an InjectionToken"),
                "service_type",
            ));
        }
        if key.is_token() && implementation.is_self_bound() {
            return Err(TenureError::argument(
                format!("{key} cannot construct itself; register a type or a factory for it"),
                "implementation",
            ));
        }

        let descriptor = Arc::new(implementation.into_descriptor(key.clone(), lifetime));
        let mut registry = self.inner.registry.write();

        let replaced = match mode {
            Mode::Add => {
                if let Some(existing) = registry.first(&key) {
                    return Err(TenureError::ServiceExist(ServiceExistError {
                        lifetime: existing.lifetime(),
                        key,
                    }));
                }
                None
            }
            Mode::Append => None,
            Mode::Replace => match registry.remove(&key) {
                Some(previous) => Some(previous),
                None => return Err(not_found(&registry, &key)),
            },
        };

        let pending = registry.snapshot_pending();
        registry.push(descriptor);

        if let Err(err) = self.validate_registration(&mut registry, &key) {
            registry.pop(&key);
            if let Some(previous) = replaced {
                registry.restore(key.clone(), previous);
            }
            registry.restore_pending(pending);
            debug!(service = %key, error = %err, "Rolled back registration");
            return Err(err);
        }
        drop(registry);

        if let Some(previous) = replaced {
            self.evict(&previous);
        }
        Ok(())
    }

    /// Re-checks Singletons waiting for `key`, then `key` itself.
    ///
    /// Singletons already depending on `key` are checked again in every
    /// mode: a key that was removed and registered anew has no pending
    /// entry for them.
    fn validate_registration(&self, registry: &mut Registry, key: &ServiceKey) -> Result<()> {
        if !self.inner.options.validate_singleton_lifetime {
            return Ok(());
        }

        let mut dependents = registry.take_pending(key);
        for dependent in registry.dependents_of(key) {
            if !dependents.contains(&dependent) {
                dependents.push(dependent);
            }
        }

        for dependent in &dependents {
            validate_singleton(registry, dependent)?;
        }
        validate_singleton(registry, key)
    }

    fn evict(&self, descriptors: &[Arc<ServiceDescriptor>]) {
        for descriptor in descriptors {
            self.inner.contexts.evict(descriptor.id());
        }
    }
}

fn not_found(registry: &Registry, key: &ServiceKey) -> TenureError {
    let names: Vec<&str> = registry.keys().map(ServiceKey::name).collect();
    TenureError::ServiceNotFound(ServiceNotFoundError {
        requested: key.clone(),
        suggestions: suggest_similar(key.name(), &names, 3),
    })
}

impl Default for ServiceCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ServiceCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCollection")
            .field("registered", &self.len())
            .field("contexts", &self.inner.contexts.len())
            .finish()
    }
}
