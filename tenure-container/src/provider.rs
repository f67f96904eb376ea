//! Service resolution.
//!
//! A [`ServiceProvider`] resolves services from the registry of the
//! [`ServiceCollection`] that built it. It keeps no state of its own: the
//! registry, the scope caches and the reserved singleton context all belong
//! to the collection, so any number of providers over one collection agree.
//!
//! # Lifetimes
//! - Singleton: cached in the collection's singleton context, whatever
//!   context the caller passed.
//! - Scoped: cached per caller context. Resolving without one fails.
//! - Transient: built on every call. A caller context is passed through
//!   to its dependencies.
//!
//! ```
//! use tenure_container::prelude::*;
//!
//! let services = ServiceCollection::new();
//! let name = InjectionToken::<String>::new("REQUEST_NAME")?;
//! services.add_scoped(&name, Implementation::factory(|_| Ok(String::from("request"))))?;
//!
//! let provider = services.build_service_provider();
//! let value = provider.create_scope(|context| {
//!     provider.get_required_service(&name, Some(context))
//! })?;
//! assert_eq!(value.as_str(), "request");
//! # Ok::<(), TenureError>(())
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::collection::ServiceCollection;
use crate::context::{Context, ContextRegistry};
use crate::descriptor::{Instance, ServiceDescriptor};
use crate::error::{
    ActivationFailedError, CircularDependencyError, LifestyleMismatchError, Result, TenureError,
};
use crate::injectable::{Argument, Arguments, downcast};
use crate::key::{IntoServiceType, ServiceKey, ServiceType};
use crate::lifetime::Lifetime;

// ============================================================
// Requests
// ============================================================

/// The explicit form of a resolution: which service, one or all, and
/// against which context.
pub struct ServiceRequest<S: ?Sized> {
    service: ServiceType<S>,
    multiple: bool,
    context: Option<Context>,
}

impl<S: ?Sized + Send + Sync + 'static> ServiceRequest<S> {
    /// The most recent registration of `service`.
    pub fn single(service: impl IntoServiceType<Service = S>) -> Self {
        Self {
            service: service.into_service_type(),
            multiple: false,
            context: None,
        }
    }

    /// Every registration of `service`, in registration order.
    pub fn all(service: impl IntoServiceType<Service = S>) -> Self {
        Self {
            multiple: true,
            ..Self::single(service)
        }
    }

    pub fn in_context(mut self, context: &Context) -> Self {
        self.context = Some(context.clone());
        self
    }

    #[inline]
    pub fn service(&self) -> &ServiceType<S> {
        &self.service
    }

    #[inline]
    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    #[inline]
    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }
}

impl<S: ?Sized> Clone for ServiceRequest<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            multiple: self.multiple,
            context: self.context.clone(),
        }
    }
}

impl<S: ?Sized> fmt::Debug for ServiceRequest<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRequest")
            .field("service", self.service.key())
            .field("multiple", &self.multiple)
            .field("context", &self.context.as_ref().map(Context::id))
            .finish()
    }
}

/// Result of [`ServiceProvider::locate`].
#[derive(Debug)]
pub enum Resolved<S: ?Sized> {
    One(Arc<S>),
    Many(Vec<Arc<S>>),
}

impl<S: ?Sized> Resolved<S> {
    /// The single instance, or the last of many.
    pub fn into_one(self) -> Option<Arc<S>> {
        match self {
            Resolved::One(instance) => Some(instance),
            Resolved::Many(mut instances) => instances.pop(),
        }
    }

    pub fn into_vec(self) -> Vec<Arc<S>> {
        match self {
            Resolved::One(instance) => vec![instance],
            Resolved::Many(instances) => instances,
        }
    }
}

// ============================================================
// ServiceProvider
// ============================================================

/// Resolves services registered in a [`ServiceCollection`].
///
/// Built by [`ServiceCollection::build_service_provider`]. Cloning is cheap.
#[derive(Clone)]
pub struct ServiceProvider {
    collection: ServiceCollection,
}

impl ServiceProvider {
    pub(crate) fn new(collection: ServiceCollection) -> Self {
        Self { collection }
    }

    /// The collection this provider resolves from.
    pub fn collection(&self) -> &ServiceCollection {
        &self.collection
    }

    /// Resolves `request`: one instance or, for [`ServiceRequest::all`],
    /// every registration in order.
    pub fn locate<S: ?Sized + Send + Sync + 'static>(
        &self,
        request: ServiceRequest<S>,
    ) -> Result<Resolved<S>> {
        let context = request.context.as_ref();
        self.check_context(context)?;
        let key = request.service.key();

        if request.multiple {
            self.resolve_all(key, context, None)?
                .iter()
                .map(|instance| downcast::<S>(key.clone(), instance))
                .collect::<Result<Vec<_>>>()
                .map(Resolved::Many)
        } else {
            let instance = self.resolve_one(key, context, None)?;
            downcast::<S>(key.clone(), &instance).map(Resolved::One)
        }
    }

    /// Resolves the most recent registration of `service`.
    ///
    /// # Errors
    /// [`TenureError::ServiceNotFound`] if nothing is registered, plus any
    /// lifetime, context or construction failure.
    pub fn get_required_service<T: IntoServiceType>(
        &self,
        service: T,
        context: Option<&Context>,
    ) -> Result<Arc<T::Service>> {
        let service = service.into_service_type();
        self.check_context(context)?;
        let instance = self.resolve_one(service.key(), context, None)?;
        downcast::<T::Service>(service.into_key(), &instance)
    }

    /// Like [`get_required_service`](Self::get_required_service), but an
    /// unregistered service yields `Ok(None)`. Other failures propagate.
    pub fn get_service<T: IntoServiceType>(
        &self,
        service: T,
        context: Option<&Context>,
    ) -> Result<Option<Arc<T::Service>>> {
        absent_if_not_found(self.get_required_service(service, context))
    }

    /// Resolves every registration of `service`, in registration order.
    pub fn get_services<T: IntoServiceType>(
        &self,
        service: T,
        context: Option<&Context>,
    ) -> Result<Vec<Arc<T::Service>>> {
        let service = service.into_service_type();
        self.check_context(context)?;
        self.resolve_all(service.key(), context, None)?
            .iter()
            .map(|instance| downcast::<T::Service>(service.key().clone(), instance))
            .collect()
    }

    // ── Contexts ──

    /// Creates and registers a new context.
    pub fn create(&self) -> Context {
        let context = Context::new();
        self.collection.contexts().register(&context);
        context
    }

    /// Destroys `context`, discarding every instance cached in it.
    ///
    /// # Errors
    /// [`TenureError::InvalidOperation`] if the context was never created,
    /// was already destroyed, or is the reserved singleton context.
    pub fn destroy(&self, context: &Context) -> Result<()> {
        if context == self.collection.singleton_context() {
            return Err(TenureError::invalid_operation(
                "The singleton context cannot be destroyed.",
            ));
        }

        if self.collection.contexts().unregister(context) {
            Ok(())
        } else {
            Err(TenureError::invalid_operation(format!(
                "Cannot find context {}; it was never created or is already destroyed.",
                context.id(),
            )))
        }
    }

    /// Runs `scope` with a fresh context and destroys the context afterwards.
    ///
    /// The scope's own error wins over a failure to destroy.
    pub fn create_scope<R>(&self, scope: impl FnOnce(&Context) -> Result<R>) -> Result<R> {
        let context = self.create();
        let result = scope(&context);
        let destroyed = self.destroy(&context);
        let value = result?;
        destroyed?;
        Ok(value)
    }

    /// Async form of [`create_scope`](Self::create_scope). The context is
    /// destroyed once the future completes.
    pub async fn create_scope_async<F, Fut, R>(&self, scope: F) -> Result<R>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let context = self.create();
        let result = scope(context.clone()).await;
        let destroyed = self.destroy(&context);
        let value = result?;
        destroyed?;
        Ok(value)
    }

    // ── Internals ──

    fn check_context(&self, context: Option<&Context>) -> Result<()> {
        match context {
            Some(context) if !self.collection.contexts().contains(context) => {
                Err(TenureError::invalid_operation(format!(
                    "Context {} is not registered, use create() to register the context.",
                    context.id(),
                )))
            }
            _ => Ok(()),
        }
    }

    fn resolve_one(
        &self,
        key: &ServiceKey,
        context: Option<&Context>,
        parent: Option<&PathFrame<'_>>,
    ) -> Result<Instance> {
        let descriptors = self.collection.descriptors(key)?;
        let Some(descriptor) = descriptors.last() else {
            return Err(self.collection.not_found(key));
        };
        self.locate_descriptor(descriptor, context, parent)
    }

    fn resolve_all(
        &self,
        key: &ServiceKey,
        context: Option<&Context>,
        parent: Option<&PathFrame<'_>>,
    ) -> Result<Vec<Instance>> {
        self.collection
            .descriptors(key)?
            .iter()
            .map(|descriptor| self.locate_descriptor(descriptor, context, parent))
            .collect()
    }

    fn locate_descriptor(
        &self,
        descriptor: &ServiceDescriptor,
        context: Option<&Context>,
        parent: Option<&PathFrame<'_>>,
    ) -> Result<Instance> {
        if self.collection.options().detect_cycles {
            detect_cycle(descriptor, parent)?;
        }

        let context = match descriptor.lifetime() {
            Lifetime::Singleton => Some(self.collection.singleton_context()),
            Lifetime::Scoped => Some(context.ok_or_else(|| {
                TenureError::argument(
                    format!(
                        "Scoped service {} must be resolved with a context",
                        descriptor.service(),
                    ),
                    "context",
                )
            })?),
            Lifetime::Transient => context,
        };

        trace!(
            service = %descriptor.service(),
            lifetime = %descriptor.lifetime(),
            context = ?context.map(Context::id),
            "Resolving"
        );

        let frame = PathFrame { descriptor, parent };
        let activation = Activation {
            provider: self,
            context,
            frame: &frame,
        };
        descriptor.resolve(&activation)
    }
}

impl fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("collection", &self.collection)
            .finish()
    }
}

fn absent_if_not_found<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(TenureError::ServiceNotFound(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

/// One descriptor on the current construction path.
struct PathFrame<'a> {
    descriptor: &'a ServiceDescriptor,
    parent: Option<&'a PathFrame<'a>>,
}

fn detect_cycle(descriptor: &ServiceDescriptor, parent: Option<&PathFrame<'_>>) -> Result<()> {
    let mut path = Vec::new();
    let mut frame = parent;
    while let Some(current) = frame {
        path.push(current.descriptor);
        if current.descriptor.id() == descriptor.id() {
            path.reverse();
            let mut chain: Vec<ServiceKey> = path.iter().map(|d| d.service().clone()).collect();
            chain.push(descriptor.service().clone());

            warn!(cycle = ?chain, "Circular dependency detected");
            return Err(TenureError::CircularDependency(CircularDependencyError { chain }));
        }
        frame = current.parent;
    }
    Ok(())
}

// ============================================================
// Activation
// ============================================================

/// What a factory or constructor is built with.
///
/// Resolutions made through an activation use its context and count toward
/// cycle detection.
pub struct Activation<'a> {
    provider: &'a ServiceProvider,
    context: Option<&'a Context>,
    frame: &'a PathFrame<'a>,
}

impl<'a> Activation<'a> {
    /// The context this instance is built in. Singletons see the
    /// collection's singleton context; Transients resolved without a
    /// context see `None`.
    #[inline]
    pub fn context(&self) -> Option<&'a Context> {
        self.context
    }

    #[inline]
    pub fn provider(&self) -> &'a ServiceProvider {
        self.provider
    }

    /// The service being built.
    #[inline]
    pub fn service(&self) -> &'a ServiceKey {
        self.frame.descriptor.service()
    }

    #[inline]
    pub fn lifetime(&self) -> Lifetime {
        self.frame.descriptor.lifetime()
    }

    pub fn get_required_service<T: IntoServiceType>(&self, service: T) -> Result<Arc<T::Service>> {
        let service = service.into_service_type();
        let instance = self
            .provider
            .resolve_one(service.key(), self.context, Some(self.frame))?;
        downcast::<T::Service>(service.into_key(), &instance)
    }

    pub fn get_service<T: IntoServiceType>(&self, service: T) -> Result<Option<Arc<T::Service>>> {
        absent_if_not_found(self.get_required_service(service))
    }

    pub fn get_services<T: IntoServiceType>(&self, service: T) -> Result<Vec<Arc<T::Service>>> {
        let service = service.into_service_type();
        self.provider
            .resolve_all(service.key(), self.context, Some(self.frame))?
            .iter()
            .map(|instance| downcast::<T::Service>(service.key().clone(), instance))
            .collect()
    }

    pub(crate) fn contexts(&self) -> &'a ContextRegistry {
        self.provider.collection.contexts()
    }

    /// Resolves the constructor dependencies of the service being built.
    ///
    /// Every dependency must be registered. A Transient built without a
    /// context may not depend on a Scoped service.
    pub(crate) fn resolve_arguments(&self) -> Result<Arguments> {
        let descriptor = self.frame.descriptor;
        let collection = &self.provider.collection;
        let check_context = descriptor.lifetime() == Lifetime::Transient
            && self.context.is_none()
            && collection.options().validate_transient_lifetime;

        for dependency in descriptor.dependencies() {
            let key = dependency.effective_key();
            let Some(found) = collection.last_descriptor(key) else {
                return Err(TenureError::ActivationFailed(ActivationFailedError {
                    dependent: descriptor.service().clone(),
                    dependency: key.clone(),
                }));
            };

            if check_context && found.lifetime() == Lifetime::Scoped {
                warn!(
                    consumer = %descriptor.service(),
                    dependency = %key,
                    "Transient resolved without context depends on a scoped service"
                );
                return Err(TenureError::LifestyleMismatch(LifestyleMismatchError {
                    consumer: descriptor.service().clone(),
                    consumer_lifetime: descriptor.lifetime(),
                    dependency: key.clone(),
                    dependency_lifetime: found.lifetime(),
                    needs_context: true,
                }));
            }
        }

        let mut values = Vec::with_capacity(descriptor.dependencies().len());
        for dependency in descriptor.dependencies() {
            let key = dependency.effective_key();
            let value = if dependency.is_multiple() {
                Argument::Many {
                    key: key.clone(),
                    instances: self.provider.resolve_all(key, self.context, Some(self.frame))?,
                }
            } else {
                Argument::One {
                    key: key.clone(),
                    instance: self.provider.resolve_one(key, self.context, Some(self.frame))?,
                }
            };
            values.push(value);
        }

        debug!(
            service = %descriptor.service(),
            arguments = values.len(),
            "Resolved constructor arguments"
        );
        Ok(Arguments::new(descriptor.service().clone(), values))
    }
}

impl fmt::Debug for Activation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Activation")
            .field("service", self.service())
            .field("lifetime", &self.lifetime())
            .field("context", &self.context.map(Context::id))
            .finish()
    }
}
