//! Lifetime and graph validation.
//!
//! Two checks live here:
//! - [`validate_singleton`] runs on every registration: a Singleton may
//!   only depend on Singletons. Dependencies that are not registered yet
//!   are deferred until they are.
//! - [`GraphValidator`] walks the whole registry on demand
//!   ([`ServiceCollection::validate`](crate::collection::ServiceCollection::validate))
//!   and reports missing dependencies, cycles and lifetime mismatches.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::descriptor::ServiceDescriptor;
use crate::error::{
    ActivationFailedError, CircularDependencyError, LifestyleMismatchError, Result, TenureError,
};
use crate::key::ServiceKey;
use crate::registry::Registry;

/// Checks that the current Singleton registration of `service` only
/// depends on Singletons.
///
/// Each dependency is checked against its *last* descriptor. A dependency
/// with no registration is recorded as pending and checked again when it
/// is registered.
pub(crate) fn validate_singleton(registry: &mut Registry, service: &ServiceKey) -> Result<()> {
    let Some(descriptor) = registry.last(service).cloned() else {
        return Ok(());
    };
    if !descriptor.lifetime().is_singleton() {
        return Ok(());
    }

    for dependency in descriptor.dependencies() {
        let key = dependency.effective_key();
        let Some(found) = registry.last(key) else {
            registry.defer(key, service);
            continue;
        };

        if found.lifetime() < descriptor.lifetime() {
            warn!(
                consumer = %service,
                dependency = %key,
                dependency_lifetime = %found.lifetime(),
                "Singleton depends on a shorter-lived service"
            );
            return Err(mismatch(&descriptor, found));
        }
    }

    Ok(())
}

fn mismatch(consumer: &ServiceDescriptor, dependency: &ServiceDescriptor) -> TenureError {
    TenureError::LifestyleMismatch(LifestyleMismatchError {
        consumer: consumer.service().clone(),
        consumer_lifetime: consumer.lifetime(),
        dependency: dependency.service().clone(),
        dependency_lifetime: dependency.lifetime(),
        needs_context: false,
    })
}

/// Depth-first walk over every registered descriptor.
///
/// Checks performed:
/// 1. **Completeness**: every dependency has a registration
/// 2. **Acyclicity**: no service depends on itself, directly or not
/// 3. **Lifetimes**: Singletons depend only on Singletons
pub(crate) struct GraphValidator<'r> {
    registry: &'r Registry,
    /// Keys on the current DFS path.
    visiting: HashSet<ServiceKey>,
    validated: HashSet<ServiceKey>,
    path: Vec<ServiceKey>,
}

impl<'r> GraphValidator<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            visiting: HashSet::new(),
            validated: HashSet::new(),
            path: Vec::new(),
        }
    }

    #[instrument(skip(self), name = "graph_validation")]
    pub fn validate(&mut self) -> Result<()> {
        let keys: Vec<ServiceKey> = self.registry.keys().cloned().collect();

        debug!(service_count = keys.len(), "Starting dependency graph validation");

        for key in keys {
            self.validate_key(&key)?;
        }

        debug!("Dependency graph validation passed");
        Ok(())
    }

    fn validate_key(&mut self, key: &ServiceKey) -> Result<()> {
        if self.validated.contains(key) {
            return Ok(());
        }

        if self.visiting.contains(key) {
            let start = self.path.iter().position(|k| k == key).unwrap_or(0);
            let mut chain = self.path[start..].to_vec();
            chain.push(key.clone());

            warn!(cycle = ?chain, "Circular dependency detected");
            return Err(TenureError::CircularDependency(CircularDependencyError { chain }));
        }

        let descriptors: Vec<Arc<ServiceDescriptor>> =
            self.registry.get(key).map(<[_]>::to_vec).unwrap_or_default();

        self.visiting.insert(key.clone());
        self.path.push(key.clone());

        for descriptor in &descriptors {
            for dependency in descriptor.dependencies() {
                let dependency_key = dependency.effective_key();
                let Some(found) = self.registry.get(dependency_key) else {
                    return Err(TenureError::ActivationFailed(ActivationFailedError {
                        dependent: key.clone(),
                        dependency: dependency_key.clone(),
                    }));
                };

                if descriptor.lifetime().is_singleton() {
                    let targets: &[Arc<ServiceDescriptor>] = if dependency.is_multiple() {
                        found
                    } else {
                        &found[found.len() - 1..]
                    };
                    let shorter = targets.iter().find(|d| d.lifetime() < descriptor.lifetime());
                    if let Some(short) = shorter {
                        warn!(
                            consumer = %key,
                            dependency = %dependency_key,
                            dependency_lifetime = %short.lifetime(),
                            "Lifetime mismatch detected"
                        );
                        return Err(mismatch(descriptor, short));
                    }
                }

                self.validate_key(dependency_key)?;
            }
        }

        self.path.pop();
        self.visiting.remove(key);
        self.validated.insert(key.clone());

        Ok(())
    }
}
