//! # Tenure Support
//!
//! Text helpers shared by the tenure crates.
//!
//! This crate provides:
//! - Rendering of resolution paths for cycle errors
//! - Short type names for error messages
//! - "Did you mean?" suggestions for unknown service types

pub mod rendering;
