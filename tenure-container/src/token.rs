//! Injection tokens.
//!
//! An [`InjectionToken<V>`] names a service that has no type of its own:
//! a port number, a connection string, one of several `Arc<str>` values.
//! Every token is a distinct identity, even when two share a name.
//!
//! ```
//! use tenure_container::prelude::*;
//!
//! let port = InjectionToken::<u16>::new("PORT")?;
//! let services = ServiceCollection::new();
//! services.add_singleton(&port, Implementation::factory(|_| Ok(8080u16)))?;
//!
//! assert_eq!(*services.get_required_service(&port, None)?, 8080);
//! # Ok::<(), TenureError>(())
//! ```

use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::collection::ServiceCollection;
use crate::error::{Result, TenureError};
use crate::injectable::Implementation;
use crate::key::{IntoServiceType, ServiceKey, ServiceType};
use crate::lifetime::Lifetime;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// A named service key whose instances are `Arc<V>`.
pub struct InjectionToken<V: ?Sized> {
    key: ServiceKey,
    _marker: PhantomData<fn() -> Arc<V>>,
}

impl<V: ?Sized + Send + Sync + 'static> InjectionToken<V> {
    /// Creates a token. Fails if `name` is blank.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TenureError::argument(
                "injection token name must not be empty",
                "name",
            ));
        }

        let ordinal = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        debug!(token = %name, ordinal, "Created injection token");

        Ok(Self {
            key: ServiceKey::token(ordinal, name),
            _marker: PhantomData,
        })
    }

    /// Creates a token and registers `implementation` for it on `services`.
    pub fn provided_in(
        name: impl Into<Cow<'static, str>>,
        services: &ServiceCollection,
        lifetime: Lifetime,
        implementation: Implementation<V>,
    ) -> Result<Self> {
        let token = Self::new(name)?;
        services.add_service(&token, implementation, lifetime)?;
        Ok(token)
    }

    /// [`provided_in`](Self::provided_in) on [`ServiceCollection::root`].
    pub fn provided_in_root(
        name: impl Into<Cow<'static, str>>,
        lifetime: Lifetime,
        implementation: Implementation<V>,
    ) -> Result<Self> {
        Self::provided_in(name, ServiceCollection::root(), lifetime, implementation)
    }
}

impl<V: ?Sized> InjectionToken<V> {
    #[inline]
    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.key.name()
    }

    pub fn service_type(&self) -> ServiceType<V> {
        ServiceType::from_key(self.key.clone())
    }
}

impl<V: ?Sized> Clone for InjectionToken<V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<V: ?Sized> PartialEq for InjectionToken<V> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<V: ?Sized> Eq for InjectionToken<V> {}

impl<V: ?Sized> fmt::Debug for InjectionToken<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InjectionToken").field(&self.key).finish()
    }
}

impl<V: ?Sized> fmt::Display for InjectionToken<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.key, f)
    }
}

impl<V: ?Sized + Send + Sync + 'static> IntoServiceType for &InjectionToken<V> {
    type Service = V;

    fn into_service_type(self) -> ServiceType<V> {
        self.service_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_name_is_argument_error() {
        for name in ["", "   "] {
            let err = InjectionToken::<u32>::new(name).unwrap_err();
            assert!(matches!(err, TenureError::Argument { parameter: "name", .. }));
        }
    }

    #[test]
    fn same_name_distinct_identity() {
        let a = InjectionToken::<u32>::new("PORT").unwrap();
        let b = InjectionToken::<u32>::new("PORT").unwrap();
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
        assert_eq!(a.name(), "PORT");
        assert!(a.key().is_token());
    }

    #[test]
    fn display_and_service_type() {
        let token = InjectionToken::<str>::new(String::from("GREETING")).unwrap();
        assert_eq!(token.to_string(), "InjectionToken(GREETING)");
        assert_eq!(token.service_type().key(), token.key());
        assert_eq!((&token).into_service_type().into_key(), *token.key());
    }

    #[test]
    fn provided_in_registers_factory() {
        let services = ServiceCollection::new();
        let token = InjectionToken::<u32>::provided_in(
            "ANSWER",
            &services,
            Lifetime::Singleton,
            Implementation::factory(|_| Ok(42u32)),
        )
        .unwrap();

        assert!(services.has_service(&token));
        assert_eq!(*services.get_required_service(&token, None).unwrap(), 42);
    }
}
