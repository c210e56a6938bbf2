//! HTTP API: processor management and event dispatch over axum.

pub mod app;
