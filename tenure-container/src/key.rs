//! Service identification keys.
//!
//! [`ServiceKey`] identifies a registration in a
//! [`ServiceCollection`](crate::collection::ServiceCollection). A key is
//! either a Rust type ([`TypeId`]) or an
//! [`InjectionToken`](crate::token::InjectionToken) ordinal. Keys compare by
//! identity only: two tokens with the same name are different keys.
//!
//! [`ServiceType<S>`] is the typed form used by the registration and
//! resolution APIs: it pairs a key with the type `S` its instances have.

use std::any::{TypeId, type_name};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use tenure_support::rendering::shorten_type_name;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum KeyId {
    Type(TypeId),
    Token(u64),
}

/// Uniquely identifies a service type or token.
///
/// # Examples
/// ```
/// use tenure_container::key::ServiceKey;
///
/// struct Mailer;
///
/// let key = ServiceKey::of::<Mailer>();
/// assert!(key.name().ends_with("Mailer"));
/// assert!(!key.is_token());
/// assert_eq!(key, ServiceKey::of::<Mailer>());
/// ```
#[derive(Clone)]
pub struct ServiceKey {
    id: KeyId,
    name: Cow<'static, str>,
}

impl ServiceKey {
    /// Creates a key for type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: KeyId::Type(TypeId::of::<T>()),
            name: Cow::Borrowed(type_name::<T>()),
        }
    }

    pub(crate) fn token(ordinal: u64, name: Cow<'static, str>) -> Self {
        Self {
            id: KeyId::Token(ordinal),
            name,
        }
    }

    /// Returns the type name, or the token name for token keys.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name without module paths, for error messages.
    pub fn short_name(&self) -> String {
        shorten_type_name(&self.name)
    }

    #[inline]
    pub fn is_token(&self) -> bool {
        matches!(self.id, KeyId::Token(_))
    }

    /// Returns the [`TypeId`] behind a type key; `None` for tokens.
    #[inline]
    pub fn type_id(&self) -> Option<TypeId> {
        match self.id {
            KeyId::Type(id) => Some(id),
            KeyId::Token(_) => None,
        }
    }

    /// Returns `true` if the key may be registered as a service type.
    ///
    /// Tokens are always valid. Type keys are rejected when they name a
    /// primitive, a string, a reference, a tuple, an array, a slice or a
    /// `Vec`: none of those has a constructible identity of its own.
    ///
    /// ```
    /// use tenure_container::key::ServiceKey;
    ///
    /// struct Clock;
    ///
    /// assert!(ServiceKey::of::<Clock>().is_shape_valid());
    /// assert!(!ServiceKey::of::<bool>().is_shape_valid());
    /// assert!(!ServiceKey::of::<String>().is_shape_valid());
    /// assert!(!ServiceKey::of::<[u8; 4]>().is_shape_valid());
    /// ```
    pub fn is_shape_valid(&self) -> bool {
        let KeyId::Type(type_id) = self.id else {
            return true;
        };

        if primitive_type_ids().contains(&type_id) {
            return false;
        }

        let name = self.name.as_ref();
        !(name.starts_with('(')
            || name.starts_with('[')
            || name.starts_with('&')
            || name.starts_with('*')
            || name.starts_with("alloc::vec::Vec<"))
    }
}

fn primitive_type_ids() -> [TypeId; 21] {
    [
        TypeId::of::<bool>(),
        TypeId::of::<char>(),
        TypeId::of::<i8>(),
        TypeId::of::<i16>(),
        TypeId::of::<i32>(),
        TypeId::of::<i64>(),
        TypeId::of::<i128>(),
        TypeId::of::<isize>(),
        TypeId::of::<u8>(),
        TypeId::of::<u16>(),
        TypeId::of::<u32>(),
        TypeId::of::<u64>(),
        TypeId::of::<u128>(),
        TypeId::of::<usize>(),
        TypeId::of::<f32>(),
        TypeId::of::<f64>(),
        TypeId::of::<()>(),
        TypeId::of::<str>(),
        TypeId::of::<String>(),
        TypeId::of::<&'static str>(),
        TypeId::of::<Cow<'static, str>>(),
    ]
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceKey {}

// Identity only: the name is display data.
impl Hash for ServiceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            KeyId::Type(_) => write!(f, "ServiceKey({})", self.name),
            KeyId::Token(ordinal) => write!(f, "ServiceKey(token {:?} #{ordinal})", self.name),
        }
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            KeyId::Type(_) => write!(f, "{}", self.name),
            KeyId::Token(_) => write!(f, "InjectionToken({})", self.name),
        }
    }
}

/// A [`ServiceKey`] together with the type `S` its instances resolve to.
///
/// Resolutions of a `ServiceType<S>` yield `Arc<S>`. `S` may be unsized,
/// e.g. `dyn Clock`.
pub struct ServiceType<S: ?Sized> {
    key: ServiceKey,
    _marker: PhantomData<fn() -> Arc<S>>,
}

impl<S: ?Sized + 'static> ServiceType<S> {
    /// The service type keyed by `S` itself.
    pub fn of() -> Self {
        Self::from_key(ServiceKey::of::<S>())
    }
}

impl<S: ?Sized> ServiceType<S> {
    pub(crate) fn from_key(key: ServiceKey) -> Self {
        Self {
            key,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    pub fn into_key(self) -> ServiceKey {
        self.key
    }
}

impl<S: ?Sized> Clone for ServiceType<S> {
    fn clone(&self) -> Self {
        Self::from_key(self.key.clone())
    }
}

impl<S: ?Sized> fmt::Debug for ServiceType<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ServiceType").field(&self.key).finish()
    }
}

/// Shorthand for [`ServiceType::of`].
///
/// ```
/// use tenure_container::key::service;
///
/// trait Clock: Send + Sync {}
///
/// let clock = service::<dyn Clock>();
/// assert!(clock.key().name().contains("Clock"));
/// ```
pub fn service<S: ?Sized + 'static>() -> ServiceType<S> {
    ServiceType::of()
}

/// Anything that names a service: a [`ServiceType`] or a token reference.
///
/// The associated type fixes what resolutions yield, so registration and
/// resolution calls infer `S` from their first argument.
pub trait IntoServiceType {
    type Service: ?Sized + Send + Sync + 'static;

    fn into_service_type(self) -> ServiceType<Self::Service>;
}

impl<S: ?Sized + Send + Sync + 'static> IntoServiceType for ServiceType<S> {
    type Service = S;

    fn into_service_type(self) -> ServiceType<S> {
        self
    }
}

impl<S: ?Sized + Send + Sync + 'static> IntoServiceType for &ServiceType<S> {
    type Service = S;

    fn into_service_type(self) -> ServiceType<S> {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Mailer;
    trait Transport {}

    #[test]
    fn key_of_type() {
        let key = ServiceKey::of::<Mailer>();
        assert!(key.name().contains("Mailer"));
        assert_eq!(key.short_name(), "Mailer");
        assert!(key.type_id().is_some());
    }

    #[test]
    fn key_equality_by_type() {
        assert_eq!(ServiceKey::of::<Mailer>(), ServiceKey::of::<Mailer>());
        assert_ne!(ServiceKey::of::<Mailer>(), ServiceKey::of::<dyn Transport>());
    }

    #[test]
    fn token_keys_compare_by_ordinal() {
        let a = ServiceKey::token(1, Cow::Borrowed("PORT"));
        let b = ServiceKey::token(2, Cow::Borrowed("PORT"));
        assert_ne!(a, b);
        assert_eq!(a, ServiceKey::token(1, Cow::Borrowed("other name")));
        assert!(a.is_token());
        assert_eq!(a.type_id(), None);
    }

    #[test]
    fn key_in_hashmap() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ServiceKey::of::<Mailer>(), "mailer");
        map.insert(ServiceKey::token(7, Cow::Borrowed("T")), "token");
        assert_eq!(map.get(&ServiceKey::of::<Mailer>()), Some(&"mailer"));
        assert_eq!(map.get(&ServiceKey::token(7, Cow::Borrowed("x"))), Some(&"token"));
        assert_eq!(map.get(&ServiceKey::of::<dyn Transport>()), None);
    }

    #[test]
    fn shape_rejects_primitives_and_collections() {
        assert!(!ServiceKey::of::<u32>().is_shape_valid());
        assert!(!ServiceKey::of::<f64>().is_shape_valid());
        assert!(!ServiceKey::of::<()>().is_shape_valid());
        assert!(!ServiceKey::of::<str>().is_shape_valid());
        assert!(!ServiceKey::of::<&'static str>().is_shape_valid());
        assert!(!ServiceKey::of::<(Mailer, Mailer)>().is_shape_valid());
        assert!(!ServiceKey::of::<[Mailer]>().is_shape_valid());
        assert!(!ServiceKey::of::<Vec<Mailer>>().is_shape_valid());
    }

    #[test]
    fn shape_accepts_structs_traits_and_tokens() {
        assert!(ServiceKey::of::<Mailer>().is_shape_valid());
        assert!(ServiceKey::of::<dyn Transport>().is_shape_valid());
        assert!(ServiceKey::token(3, Cow::Borrowed("PORT")).is_shape_valid());
    }

    #[test]
    fn display_distinguishes_tokens() {
        let token = ServiceKey::token(9, Cow::Borrowed("PORT"));
        assert_eq!(token.to_string(), "InjectionToken(PORT)");
        assert!(format!("{token:?}").contains("#9"));
    }
}
