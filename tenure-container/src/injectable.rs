//! Constructor metadata.
//!
//! The container does not inspect constructors. A constructible type
//! implements [`Injectable`] instead: it lists its dependencies in
//! parameter order and builds itself from the resolved [`Arguments`].
//!
//! ```
//! use std::sync::Arc;
//! use tenure_container::prelude::*;
//!
//! struct Config;
//!
//! impl Injectable for Config {
//!     fn construct(_: &mut Arguments) -> Result<Self> {
//!         Ok(Config)
//!     }
//! }
//!
//! struct Repository {
//!     config: Arc<Config>,
//! }
//!
//! impl Injectable for Repository {
//!     fn dependencies() -> Vec<Dependency> {
//!         vec![Dependency::of::<Config>()]
//!     }
//!
//!     fn construct(args: &mut Arguments) -> Result<Self> {
//!         Ok(Repository { config: args.next()? })
//!     }
//! }
//!
//! let services = ServiceCollection::new();
//! services.add_singleton(service::<Config>(), Implementation::itself())?;
//! services.add_singleton(service::<Repository>(), Implementation::itself())?;
//!
//! let repository = services.get_required_service(service::<Repository>(), None)?;
//! let config = services.get_required_service(service::<Config>(), None)?;
//! assert!(Arc::ptr_eq(&repository.config, &config));
//! # Ok::<(), TenureError>(())
//! ```

use std::any::type_name;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use crate::descriptor::{self, Instance, ServiceDescriptor};
use crate::error::{Result, TenureError};
use crate::key::{IntoServiceType, ServiceKey};
use crate::lifetime::Lifetime;
use crate::provider::Activation;

/// A type the container can construct.
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Dependencies in parameter order.
    fn dependencies() -> Vec<Dependency> {
        Vec::new()
    }

    /// Builds an instance from the resolved dependencies.
    fn construct(args: &mut Arguments) -> Result<Self>;
}

/// One constructor parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    declared: ServiceKey,
    inject: Option<ServiceKey>,
    multiple: bool,
}

impl Dependency {
    /// A parameter of type `Arc<T>`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            declared: ServiceKey::of::<T>(),
            inject: None,
            multiple: false,
        }
    }

    /// A parameter of type `Vec<Arc<T>>`: every implementation of `T`.
    pub fn all<T: ?Sized + 'static>() -> Self {
        Self {
            multiple: true,
            ..Self::of::<T>()
        }
    }

    /// A parameter declared by a service type or token.
    pub fn service(service: impl IntoServiceType) -> Self {
        Self {
            declared: service.into_service_type().into_key(),
            inject: None,
            multiple: false,
        }
    }

    /// Resolves `target` for this position instead of the declared type.
    pub fn inject(mut self, target: impl IntoServiceType) -> Self {
        self.inject = Some(target.into_service_type().into_key());
        self
    }

    /// Marks this position as expecting every implementation.
    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    #[inline]
    pub fn declared(&self) -> &ServiceKey {
        &self.declared
    }

    /// The key actually resolved: the override if any, else the declared type.
    #[inline]
    pub fn effective_key(&self) -> &ServiceKey {
        self.inject.as_ref().unwrap_or(&self.declared)
    }

    #[inline]
    pub fn is_multiple(&self) -> bool {
        self.multiple
    }
}

/// Views an `Arc<Self>` as an `Arc<S>`.
///
/// Every type implements this for itself. For trait objects use
/// [`implements!`](crate::implements).
pub trait Implements<S: ?Sized>: Send + Sync + 'static {
    fn upcast(self: Arc<Self>) -> Arc<S>;
}

impl<T: Send + Sync + 'static> Implements<T> for T {
    fn upcast(self: Arc<Self>) -> Arc<T> {
        self
    }
}

/// Declares that a type can be bound to one or more trait-object services.
///
/// ```
/// use tenure_container::implements;
///
/// trait Clock: Send + Sync {}
/// trait Source: Send + Sync {}
///
/// struct SystemClock;
/// impl Clock for SystemClock {}
/// impl Source for SystemClock {}
///
/// implements!(SystemClock => dyn Clock, dyn Source);
/// ```
#[macro_export]
macro_rules! implements {
    ($implementation:ty => $($service:ty),+ $(,)?) => {
        $(
            impl $crate::injectable::Implements<$service> for $implementation {
                fn upcast(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$service> {
                    self
                }
            }
        )+
    };
}

pub(crate) enum Argument {
    One { key: ServiceKey, instance: Instance },
    Many { key: ServiceKey, instances: Vec<Instance> },
}

/// Resolved dependencies, consumed in parameter order.
pub struct Arguments {
    owner: ServiceKey,
    position: usize,
    values: VecDeque<Argument>,
}

impl Arguments {
    pub(crate) fn new(owner: ServiceKey, values: Vec<Argument>) -> Self {
        Self {
            owner,
            position: 0,
            values: values.into(),
        }
    }

    /// Number of arguments not yet consumed.
    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    /// Takes the next single-valued argument.
    pub fn next<T: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Arc<T>> {
        match self.take()? {
            Argument::One { key, instance } => downcast::<T>(key, &instance),
            Argument::Many { .. } => Err(self.shape_error("a single value", "next_all")),
        }
    }

    /// Takes the next multi-valued argument.
    pub fn next_all<T: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Vec<Arc<T>>> {
        match self.take()? {
            Argument::Many { key, instances } => instances
                .iter()
                .map(|instance| downcast::<T>(key.clone(), instance))
                .collect(),
            Argument::One { .. } => Err(self.shape_error("every implementation", "next")),
        }
    }

    fn take(&mut self) -> Result<Argument> {
        let value = self.values.pop_front().ok_or_else(|| {
            TenureError::construction(
                self.owner.clone(),
                format!(
                    "constructor asked for argument {} but only {} dependencies were declared",
                    self.position, self.position,
                ),
            )
        })?;
        self.position += 1;
        Ok(value)
    }

    fn shape_error(&self, expected: &str, method: &str) -> TenureError {
        TenureError::construction(
            self.owner.clone(),
            format!(
                "argument {} was declared as {expected}; read it with Arguments::{method}",
                self.position - 1,
            ),
        )
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arguments")
            .field("owner", &self.owner)
            .field("position", &self.position)
            .field("remaining", &self.values.len())
            .finish()
    }
}

pub(crate) fn downcast<T: ?Sized + Send + Sync + 'static>(
    key: ServiceKey,
    instance: &Instance,
) -> Result<Arc<T>> {
    instance
        .downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or(TenureError::TypeMismatch {
            key,
            expected: type_name::<T>(),
        })
}

type Factory<S> = Arc<dyn Fn(&Activation<'_>) -> Result<Arc<S>> + Send + Sync>;

fn erase_factory<S, F>(factory: F) -> Factory<S>
where
    S: ?Sized,
    F: Fn(&Activation<'_>) -> Result<Arc<S>> + Send + Sync + 'static,
{
    Arc::new(factory)
}

struct Constructor<S: ?Sized> {
    name: &'static str,
    self_bound: bool,
    dependencies: fn() -> Vec<Dependency>,
    build: fn(&mut Arguments) -> Result<Arc<S>>,
}

enum Kind<S: ?Sized> {
    Constructor(Constructor<S>),
    Factory(Factory<S>),
}

/// How a registration produces instances of `S`.
pub struct Implementation<S: ?Sized> {
    kind: Kind<S>,
}

fn build<S: ?Sized, I: Injectable + Implements<S>>(args: &mut Arguments) -> Result<Arc<S>> {
    I::construct(args).map(|implementation| Arc::new(implementation).upcast())
}

impl<S: Injectable> Implementation<S> {
    /// The service type constructs itself.
    pub fn itself() -> Self {
        Self {
            kind: Kind::Constructor(Constructor {
                name: type_name::<S>(),
                self_bound: true,
                dependencies: S::dependencies,
                build: build::<S, S>,
            }),
        }
    }
}

impl<S: ?Sized + Send + Sync + 'static> Implementation<S> {
    /// Constructs `I` and binds it as `S`.
    pub fn of<I: Injectable + Implements<S>>() -> Self {
        Self {
            kind: Kind::Constructor(Constructor {
                name: type_name::<I>(),
                self_bound: false,
                dependencies: I::dependencies,
                build: build::<S, I>,
            }),
        }
    }

    /// Calls `factory` for every instance the lifetime asks for.
    pub fn factory<F, R>(factory: F) -> Self
    where
        F: Fn(&Activation<'_>) -> Result<R> + Send + Sync + 'static,
        R: Into<Arc<S>>,
    {
        Self {
            kind: Kind::Factory(erase_factory(move |activation| {
                factory(activation).map(Into::into)
            })),
        }
    }

    /// Type name of the implementation, or `"factory"`.
    pub fn name(&self) -> &'static str {
        match &self.kind {
            Kind::Constructor(constructor) => constructor.name,
            Kind::Factory(_) => "factory",
        }
    }

    pub(crate) fn is_self_bound(&self) -> bool {
        matches!(&self.kind, Kind::Constructor(constructor) if constructor.self_bound)
    }

    pub(crate) fn into_descriptor(self, service: ServiceKey, lifetime: Lifetime) -> ServiceDescriptor {
        let name = self.name();
        match self.kind {
            Kind::Constructor(constructor) => {
                let build = constructor.build;
                let builder = descriptor::builder(move |activation| {
                    let mut args = activation.resolve_arguments()?;
                    let service = build(&mut args)?;
                    Ok(Arc::new(service) as Instance)
                });
                ServiceDescriptor::new(service, lifetime, name, (constructor.dependencies)(), builder)
            }
            Kind::Factory(factory) => {
                let builder = descriptor::builder(move |activation| {
                    let service = factory(activation)?;
                    Ok(Arc::new(service) as Instance)
                });
                ServiceDescriptor::new(service, lifetime, name, Vec::new(), builder)
            }
        }
    }
}

impl<S: ?Sized> Clone for Implementation<S> {
    fn clone(&self) -> Self {
        let kind = match &self.kind {
            Kind::Constructor(constructor) => Kind::Constructor(Constructor {
                name: constructor.name,
                self_bound: constructor.self_bound,
                dependencies: constructor.dependencies,
                build: constructor.build,
            }),
            Kind::Factory(factory) => Kind::Factory(Arc::clone(factory)),
        };
        Self { kind }
    }
}

impl<S: ?Sized> fmt::Debug for Implementation<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Constructor(constructor) => f
                .debug_struct("Implementation")
                .field("type", &constructor.name)
                .field("self_bound", &constructor.self_bound)
                .finish(),
            Kind::Factory(_) => f.write_str("Implementation(factory)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    impl Injectable for English {
        fn construct(_: &mut Arguments) -> Result<Self> {
            Ok(English)
        }
    }

    crate::implements!(English => dyn Greeter);

    fn one<T: Send + Sync + 'static>(value: T) -> Argument {
        Argument::One {
            key: ServiceKey::of::<T>(),
            instance: Arc::new(Arc::new(value)),
        }
    }

    #[test]
    fn effective_key_prefers_override() {
        let plain = Dependency::of::<English>();
        assert_eq!(plain.effective_key(), &ServiceKey::of::<English>());
        assert!(!plain.is_multiple());

        let overridden = Dependency::of::<English>().inject(crate::key::service::<dyn Greeter>());
        assert_eq!(overridden.declared(), &ServiceKey::of::<English>());
        assert_eq!(overridden.effective_key(), &ServiceKey::of::<dyn Greeter>());
    }

    #[test]
    fn all_marks_multiple() {
        assert!(Dependency::all::<dyn Greeter>().is_multiple());
        assert!(Dependency::of::<English>().multiple().is_multiple());
    }

    #[test]
    fn arguments_in_order() {
        let mut args = Arguments::new(
            ServiceKey::of::<English>(),
            vec![one(1u32), one(String::from("two"))],
        );
        assert_eq!(*args.next::<u32>().unwrap(), 1);
        assert_eq!(args.next::<String>().unwrap().as_str(), "two");
        assert_eq!(args.remaining(), 0);
    }

    #[test]
    fn exhausted_arguments_fail() {
        let mut args = Arguments::new(ServiceKey::of::<English>(), Vec::new());
        let err = args.next::<u32>().unwrap_err();
        assert!(matches!(err, TenureError::ConstructionFailed { .. }));
    }

    #[test]
    fn wrong_type_is_type_mismatch() {
        let mut args = Arguments::new(ServiceKey::of::<English>(), vec![one(1u32)]);
        let err = args.next::<String>().unwrap_err();
        assert!(matches!(err, TenureError::TypeMismatch { .. }));
    }

    #[test]
    fn shape_mismatch_names_method() {
        let many = Argument::Many {
            key: ServiceKey::of::<u32>(),
            instances: vec![Arc::new(Arc::new(1u32))],
        };
        let mut args = Arguments::new(ServiceKey::of::<English>(), vec![many, one(2u32)]);
        let err = args.next::<u32>().unwrap_err();
        assert!(err.to_string().contains("next_all"));

        let err = args.next_all::<u32>().unwrap_err();
        assert!(err.to_string().contains("Arguments::next"));
    }

    #[test]
    fn next_all_downcasts_each() {
        let many = Argument::Many {
            key: ServiceKey::of::<u32>(),
            instances: vec![Arc::new(Arc::new(1u32)), Arc::new(Arc::new(2u32))],
        };
        let mut args = Arguments::new(ServiceKey::of::<English>(), vec![many]);
        let values: Vec<u32> = args.next_all::<u32>().unwrap().into_iter().map(|v| *v).collect();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn upcast_through_implements() {
        let greeter = <English as Implements<dyn Greeter>>::upcast(Arc::new(English));
        assert_eq!(greeter.greet(), "hello");
    }

    #[test]
    fn implementation_names() {
        assert!(Implementation::<English>::itself().name().ends_with("English"));
        assert!(Implementation::<English>::itself().is_self_bound());

        let bound = Implementation::<dyn Greeter>::of::<English>();
        assert!(bound.name().ends_with("English"));
        assert!(!bound.is_self_bound());

        let factory = Implementation::<u32>::factory(|_| Ok(42u32));
        assert_eq!(factory.name(), "factory");
        assert!(!factory.clone().is_self_bound());
    }
}
