//! Due events, their wire projection, and the dispatch capability handlers implement.

pub mod error;
pub mod event;
pub mod handler;
pub mod response;

pub use error::{ProcessorError, ProcessorResult};
pub use event::{Event, EventKey};
pub use handler::EventHandler;
pub use response::{EventResponse, EventStatus};
