//! Container configuration.
//!
//! [`ContainerOptions`] switches the collection's checks on or off. Every
//! check is on by default. The struct is `serde`-enabled so it can live in
//! an application's config file; missing fields take their defaults.
//!
//! ```
//! use tenure_container::options::ContainerOptions;
//!
//! let options = ContainerOptions::default().detect_cycles(false);
//! assert!(options.validate_singleton_lifetime);
//! assert!(!options.detect_cycles);
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerOptions {
    /// Check at registration that Singletons only depend on Singletons.
    pub validate_singleton_lifetime: bool,
    /// Check at resolution that a Transient resolved without a context
    /// does not depend on a Scoped service.
    pub validate_transient_lifetime: bool,
    /// Reject primitive, string, tuple and array service types.
    pub validate_service_shape: bool,
    /// Fail with a cycle error instead of recursing forever.
    pub detect_cycles: bool,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            validate_singleton_lifetime: true,
            validate_transient_lifetime: true,
            validate_service_shape: true,
            detect_cycles: true,
        }
    }
}

impl ContainerOptions {
    pub fn validate_singleton_lifetime(mut self, enabled: bool) -> Self {
        self.validate_singleton_lifetime = enabled;
        self
    }

    pub fn validate_transient_lifetime(mut self, enabled: bool) -> Self {
        self.validate_transient_lifetime = enabled;
        self
    }

    pub fn validate_service_shape(mut self, enabled: bool) -> Self {
        self.validate_service_shape = enabled;
        self
    }

    pub fn detect_cycles(mut self, enabled: bool) -> Self {
        self.detect_cycles = enabled;
        self
    }
}
