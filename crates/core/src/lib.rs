//! `relay-core` — identifiers and validation errors shared by every relay crate.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{EventId, TenantId};
