//! Registration modules and auto-registration.
//!
//! A [`Module`] groups related registrations so an application can be
//! assembled from independent pieces:
//!
//! ```
//! use tenure_container::prelude::*;
//!
//! struct Database;
//!
//! impl Injectable for Database {
//!     fn construct(_: &mut Arguments) -> Result<Self> {
//!         Ok(Database)
//!     }
//! }
//!
//! struct StorageModule;
//!
//! impl Module for StorageModule {
//!     fn register(&self, services: &ServiceCollection) -> Result<()> {
//!         services.add_singleton(service::<Database>(), Implementation::itself())
//!     }
//! }
//!
//! let services = ServiceCollection::new();
//! services.add_module(&StorageModule)?;
//! assert!(services.has_service(service::<Database>()));
//! # Ok::<(), TenureError>(())
//! ```
//!
//! Types can also register themselves at link time with
//! [`auto_register!`](crate::auto_register); [`ServiceCollection::register_discovered`]
//! applies every such registration.

use tracing::{debug, info};

use crate::collection::ServiceCollection;
use crate::error::Result;
use crate::injectable::{Implementation, Injectable};
use crate::key::{IntoServiceType, service};
use crate::lifetime::Lifetime;

/// A group of related registrations.
pub trait Module: Send + Sync {
    fn register(&self, services: &ServiceCollection) -> Result<()>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// How [`ServiceCollection::register_injectable`] registers a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectableOptions {
    pub lifetime: Lifetime,
    /// Keep an existing registration instead of failing.
    pub try_add: bool,
}

impl InjectableOptions {
    pub fn new(lifetime: Lifetime) -> Self {
        Self {
            lifetime,
            try_add: false,
        }
    }

    pub fn try_add(mut self, enabled: bool) -> Self {
        self.try_add = enabled;
        self
    }
}

/// A registration submitted with [`auto_register!`](crate::auto_register).
pub struct AutoRegistration {
    name: &'static str,
    register: fn(&ServiceCollection) -> Result<()>,
}

impl AutoRegistration {
    pub const fn new(name: &'static str, register: fn(&ServiceCollection) -> Result<()>) -> Self {
        Self { name, register }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn apply(&self, services: &ServiceCollection) -> Result<()> {
        (self.register)(services)
    }
}

inventory::collect!(AutoRegistration);

/// Registers a type when [`ServiceCollection::register_discovered`] runs.
///
/// Existing registrations are kept, so discovery can run more than once.
///
/// ```
/// use tenure_container::prelude::*;
///
/// trait Greeter: Send + Sync {}
///
/// struct English;
/// impl Greeter for English {}
///
/// impl Injectable for English {
///     fn construct(_: &mut Arguments) -> Result<Self> {
///         Ok(English)
///     }
/// }
///
/// tenure_container::implements!(English => dyn Greeter);
/// tenure_container::auto_register!(English, Lifetime::Singleton);
/// tenure_container::auto_register!(dyn Greeter => English, Lifetime::Transient);
/// ```
#[macro_export]
macro_rules! auto_register {
    ($service:ty => $implementation:ty, $lifetime:expr $(,)?) => {
        const _: () = {
            fn register(
                services: &$crate::collection::ServiceCollection,
            ) -> $crate::error::Result<()> {
                services
                    .try_add_service(
                        $crate::key::service::<$service>(),
                        $crate::injectable::Implementation::<$service>::of::<$implementation>(),
                        $lifetime,
                    )
                    .map(|_| ())
            }

            $crate::inventory::submit! {
                $crate::module::AutoRegistration::new(
                    concat!(stringify!($service), " => ", stringify!($implementation)),
                    register,
                )
            }
        };
    };
    ($implementation:ty, $lifetime:expr $(,)?) => {
        $crate::auto_register!($implementation => $implementation, $lifetime);
    };
}

impl ServiceCollection {
    /// Lets `module` register its services.
    pub fn add_module(&self, module: &dyn Module) -> Result<()> {
        debug!(module = module.name(), "Registering module");
        module.register(self)
    }

    /// Registers `I` as itself.
    pub fn register_injectable<I: Injectable>(&self, options: InjectableOptions) -> Result<()> {
        self.register_injectable_as(service::<I>(), Implementation::itself(), options)
    }

    /// Registers `implementation` for `service` with the given options.
    pub fn register_injectable_as<T: IntoServiceType>(
        &self,
        service: T,
        implementation: Implementation<T::Service>,
        options: InjectableOptions,
    ) -> Result<()> {
        if options.try_add {
            self.try_add_service(service, implementation, options.lifetime)
                .map(|_| ())
        } else {
            self.add_service(service, implementation, options.lifetime)
        }
    }

    /// Applies every [`auto_register!`](crate::auto_register) submission.
    /// Returns how many were applied.
    pub fn register_discovered(&self) -> Result<usize> {
        let mut applied = 0;
        for registration in inventory::iter::<AutoRegistration> {
            debug!(registration = registration.name(), "Applying auto-registration");
            registration.apply(self)?;
            applied += 1;
        }

        info!(count = applied, "Applied discovered registrations");
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TenureError;
    use crate::injectable::Arguments;

    struct Mailer;

    impl Injectable for Mailer {
        fn construct(_: &mut Arguments) -> Result<Self> {
            Ok(Mailer)
        }
    }

    struct Audit;

    impl Injectable for Audit {
        fn construct(_: &mut Arguments) -> Result<Self> {
            Ok(Audit)
        }
    }

    crate::auto_register!(Audit, Lifetime::Singleton);

    struct MailModule;

    impl Module for MailModule {
        fn register(&self, services: &ServiceCollection) -> Result<()> {
            services.add_transient(service::<Mailer>(), Implementation::itself())
        }
    }

    #[test]
    fn module_registers_services() {
        let services = ServiceCollection::new();
        services.add_module(&MailModule).unwrap();
        assert!(services.has_service(service::<Mailer>()));
        assert!(MailModule.name().ends_with("MailModule"));
    }

    #[test]
    fn register_injectable_respects_try_add() {
        let services = ServiceCollection::new();
        services
            .register_injectable::<Mailer>(InjectableOptions::new(Lifetime::Scoped))
            .unwrap();

        let err = services
            .register_injectable::<Mailer>(InjectableOptions::new(Lifetime::Singleton))
            .unwrap_err();
        assert!(matches!(err, TenureError::ServiceExist(_)));

        services
            .register_injectable::<Mailer>(InjectableOptions::new(Lifetime::Singleton).try_add(true))
            .unwrap();
        let descriptors = services.get_service_descriptors(service::<Mailer>()).unwrap();
        assert_eq!(descriptors[0].lifetime(), Lifetime::Scoped);
    }

    #[test]
    fn discovered_registrations_apply_idempotently() {
        let services = ServiceCollection::new();
        let applied = services.register_discovered().unwrap();
        assert!(applied >= 1);
        assert!(services.has_service(service::<Audit>()));

        assert_eq!(services.register_discovered().unwrap(), applied);
        assert_eq!(services.get_service_descriptors(service::<Audit>()).unwrap().len(), 1);
    }
}
