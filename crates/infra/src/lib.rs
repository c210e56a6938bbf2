//! Infrastructure layer: processor configuration, handler transports,
//! retry scheduling and the dispatch facade.

pub mod config;
pub mod processors;
pub mod retry;
