//! # Tenure: lifetime-checked dependency resolution for Rust
//!
//! Register services in a [`ServiceCollection`] as Singleton, Scoped or
//! Transient, then resolve them with or without a [`Context`]. The
//! container refuses to let a short-lived service leak into a longer-lived
//! one: a Singleton may only depend on Singletons, and a Transient resolved
//! without a context may not depend on a Scoped service.
//!
//! ```
//! use std::sync::Arc;
//! use tenure::prelude::*;
//!
//! struct Counter;
//!
//! impl Injectable for Counter {
//!     fn construct(_: &mut Arguments) -> Result<Self> {
//!         Ok(Counter)
//!     }
//! }
//!
//! let services = ServiceCollection::new();
//! services.add_scoped(service::<Counter>(), Implementation::itself())?;
//!
//! let (a, b) = services.create_scope(|context| {
//!     let a = services.get_required_service(service::<Counter>(), Some(context))?;
//!     let b = services.get_required_service(service::<Counter>(), Some(context))?;
//!     Ok((a, b))
//! })?;
//! assert!(Arc::ptr_eq(&a, &b));
//! # Ok::<(), TenureError>(())
//! ```

pub use tenure_container::*;
pub use tenure_support as support;
