//! Asynchronous retry with geometric backoff.
//!
//! Not tied to event dispatch: any fallible async operation can be wrapped.

pub mod executor;
pub mod policy;

pub use executor::{retry_with_backoff, spawn_with_backoff, RetryError, RetryHandle};
pub use policy::RetryPolicy;
