//! Core container implementation for Tenure DI.
//!
//! Services are registered in a [`ServiceCollection`] with a [`Lifetime`]
//! and resolved through a [`ServiceProvider`], optionally against a
//! [`Context`] that bounds Scoped instances.

pub mod collection;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod injectable;
pub mod key;
pub mod lifetime;
pub mod module;
pub mod options;
pub mod provider;
pub mod token;

mod registry;
mod validation;

#[doc(hidden)]
pub use inventory;

pub use collection::ServiceCollection;
pub use context::{Context, ContextId};
pub use descriptor::{DescriptorId, ServiceDescriptor};
pub use error::{Result, TenureError};
pub use injectable::{Arguments, Dependency, Implementation, Implements, Injectable};
pub use key::{IntoServiceType, ServiceKey, ServiceType, service};
pub use lifetime::Lifetime;
pub use module::{AutoRegistration, InjectableOptions, Module};
pub use options::ContainerOptions;
pub use provider::{Activation, Resolved, ServiceProvider, ServiceRequest};
pub use token::InjectionToken;

pub mod prelude {
    pub use crate::collection::ServiceCollection;
    pub use crate::context::Context;
    pub use crate::error::{Result, TenureError};
    pub use crate::injectable::{Arguments, Dependency, Implementation, Implements, Injectable};
    pub use crate::key::{ServiceKey, service};
    pub use crate::lifetime::Lifetime;
    pub use crate::module::{InjectableOptions, Module};
    pub use crate::options::ContainerOptions;
    pub use crate::provider::{Activation, ServiceProvider, ServiceRequest};
    pub use crate::token::InjectionToken;
}
