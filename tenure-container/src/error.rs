//! Error types for tenure container operations.
//!
//! Every failure names the services involved and, where it helps, a hint
//! on how to fix the registration.

use std::fmt;

use tenure_support::rendering::render_chain;

use crate::key::ServiceKey;
use crate::lifetime::Lifetime;

/// Main error type for all tenure operations.
///
/// Every variant except [`TenureError::Argument`] is a kind of invalid
/// operation; see [`TenureError::is_invalid_operation`].
#[derive(Debug, thiserror::Error)]
pub enum TenureError {
    /// The caller passed a structurally invalid value.
    #[error("{message}\n  Parameter name: {parameter}")]
    Argument {
        message: String,
        parameter: &'static str,
    },

    /// A single registration targeted a service that is already registered.
    #[error("{}", .0)]
    ServiceExist(ServiceExistError),

    /// Resolution or lookup targeted a service with no registration.
    #[error("{}", .0)]
    ServiceNotFound(ServiceNotFoundError),

    /// A lifetime compatibility rule was violated.
    #[error("{}", .0)]
    LifestyleMismatch(LifestyleMismatchError),

    /// A constructor dependency had no registration at resolution time.
    #[error("{}", .0)]
    ActivationFailed(ActivationFailedError),

    /// A construction path reached a service already being constructed.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// Context misuse: destroying or resolving against an unregistered context.
    #[error("{message}")]
    InvalidOperation { message: String },

    /// A resolved instance was not of the type the caller asked for.
    #[error("Type mismatch for {key}: expected {expected}")]
    TypeMismatch {
        key: ServiceKey,
        expected: &'static str,
    },

    /// A constructor or factory returned an error.
    #[error("Failed to construct {key}: {source}")]
    ConstructionFailed {
        key: ServiceKey,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl TenureError {
    pub fn argument(message: impl Into<String>, parameter: &'static str) -> Self {
        TenureError::Argument {
            message: message.into(),
            parameter,
        }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        TenureError::InvalidOperation {
            message: message.into(),
        }
    }

    /// Wraps any error (or message) raised while building `key`.
    pub fn construction(
        key: ServiceKey,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        TenureError::ConstructionFailed {
            key,
            source: source.into(),
        }
    }

    /// Returns `true` for every kind except [`TenureError::Argument`].
    pub fn is_invalid_operation(&self) -> bool {
        !matches!(self, TenureError::Argument { .. })
    }
}

/// Error when an `add` registration finds an existing binding.
#[derive(Debug)]
pub struct ServiceExistError {
    pub key: ServiceKey,
    /// Lifetime of the first existing registration.
    pub lifetime: Lifetime,
}

impl fmt::Display for ServiceExistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "You cannot override registered types. {} already registered as {}",
            self.key, self.lifetime,
        )?;
        write!(
            f,
            "\n  Hint: use try_add_* to keep the first registration, append_* for multi-binding, or replace_* to swap it"
        )
    }
}

/// Error when no registration exists for a service.
#[derive(Debug)]
pub struct ServiceNotFoundError {
    pub requested: ServiceKey,
    /// Registered names that look like the requested one.
    pub suggestions: Vec<String>,
}

impl fmt::Display for ServiceNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "There is no service of type {}", self.requested)?;

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        Ok(())
    }
}

/// Error when a consumer would hold a shorter-lived dependency.
///
/// A Singleton cannot consume a Scoped or Transient service, and a
/// Transient resolved without a context cannot consume a Scoped one.
#[derive(Debug)]
pub struct LifestyleMismatchError {
    pub consumer: ServiceKey,
    pub consumer_lifetime: Lifetime,
    pub dependency: ServiceKey,
    pub dependency_lifetime: Lifetime,
    /// Set when the mismatch goes away once a context is supplied.
    pub needs_context: bool,
}

impl fmt::Display for LifestyleMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cannot consume {} service {} from {} service {}",
            self.dependency_lifetime, self.dependency, self.consumer_lifetime, self.consumer,
        )?;
        if self.needs_context {
            write!(f, " without context")?;
            write!(
                f,
                "\n  Hint: resolve {} with a context created by create()",
                self.consumer.short_name(),
            )
        } else {
            write!(
                f,
                "\n  Hint: register {} as {} or resolve it from a shorter-lived service",
                self.dependency.short_name(),
                self.consumer_lifetime,
            )
        }
    }
}

/// Error when a constructor dependency has no registration.
#[derive(Debug)]
pub struct ActivationFailedError {
    /// The service being constructed.
    pub dependent: ServiceKey,
    /// The dependency that could not be found.
    pub dependency: ServiceKey,
}

impl fmt::Display for ActivationFailedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unable to resolve service for type '{}' while attempting to activate '{}'.",
            self.dependency, self.dependent,
        )
    }
}

/// Error when construction re-enters a service already on the path.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// Services from the first occurrence to the repeated one.
    /// Example: ["A", "B", "A"]
    pub chain: Vec<ServiceKey>,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = render_chain(self.chain.iter().map(ServiceKey::short_name));
        write!(f, "Circular dependency detected:\n  {path}")?;
        write!(
            f,
            "\n  Hint: break the cycle with a factory that resolves lazily"
        )
    }
}

/// Convenient Result type for tenure operations.
pub type Result<T> = std::result::Result<T, TenureError>;
