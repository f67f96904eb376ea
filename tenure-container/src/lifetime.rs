//! Service lifetimes.
//!
//! A lifetime decides how long a resolved instance is reused:
//! - [`Lifetime::Singleton`] : one instance for the whole process
//! - [`Lifetime::Scoped`] : one instance per [`Context`](crate::context::Context)
//! - [`Lifetime::Transient`] : a new instance on every resolution
//!
//! # Ordering
//! Lifetimes order by how long they live: `Singleton > Scoped > Transient`.
//! A Singleton "outlives" a Scoped, which "outlives" a Transient.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Defines the lifetime of a registered service.
///
/// # Examples
/// ```
/// use tenure_container::lifetime::Lifetime;
///
/// assert!(Lifetime::Singleton > Lifetime::Scoped);
/// assert!(Lifetime::Scoped > Lifetime::Transient);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lifetime {
    /// One instance shared by every resolution in the process.
    ///
    /// Created on first resolve and cached in the collection's reserved
    /// singleton context, whatever context the caller passes.
    Singleton,

    /// One instance per context.
    ///
    /// Created on first resolve within a context and discarded when the
    /// context is destroyed. Resolving without a context is an error.
    Scoped,

    /// New instance on every resolution. Never cached.
    Transient,
}

impl Lifetime {
    /// Returns `true` if instances of this lifetime go through a scope cache.
    #[inline]
    pub fn is_cached(&self) -> bool {
        matches!(self, Lifetime::Singleton | Lifetime::Scoped)
    }

    #[inline]
    pub fn is_singleton(&self) -> bool {
        matches!(self, Lifetime::Singleton)
    }

    /// Returns the ordering value (higher = longer lifetime).
    #[inline]
    fn ordering(&self) -> u8 {
        match self {
            Lifetime::Singleton => 2,
            Lifetime::Scoped => 1,
            Lifetime::Transient => 0,
        }
    }
}

impl PartialOrd for Lifetime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Lifetime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ordering().cmp(&other.ordering())
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Singleton => write!(f, "Singleton"),
            Lifetime::Scoped => write!(f, "Scoped"),
            Lifetime::Transient => write!(f, "Transient"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifetime_ordering() {
        assert!(Lifetime::Singleton > Lifetime::Scoped);
        assert!(Lifetime::Scoped > Lifetime::Transient);
        assert!(Lifetime::Singleton > Lifetime::Transient);
    }

    #[test]
    fn lifetime_is_cached() {
        assert!(Lifetime::Singleton.is_cached());
        assert!(Lifetime::Scoped.is_cached());
        assert!(!Lifetime::Transient.is_cached());
    }

    #[test]
    fn lifetime_display() {
        assert_eq!(Lifetime::Singleton.to_string(), "Singleton");
        assert_eq!(Lifetime::Scoped.to_string(), "Scoped");
        assert_eq!(Lifetime::Transient.to_string(), "Transient");
    }

    #[test]
    fn lifetime_serde_uses_variant_names() {
        let json = serde_json::to_string(&Lifetime::Scoped).unwrap();
        assert_eq!(json, "\"Scoped\"");
        let back: Lifetime = serde_json::from_str("\"Transient\"").unwrap();
        assert_eq!(back, Lifetime::Transient);
    }
}
