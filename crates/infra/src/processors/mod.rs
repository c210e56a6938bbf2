//! Per-tenant event processors: configuration, handler variants, the
//! resolver cache and the dispatch facade.

pub mod config;
pub mod custom;
pub mod factory;
pub mod queue;
pub mod registry;
pub mod resolver;
pub mod webhook;

pub use config::{ProcessorConfig, ProcessorConfigStore, ProcessorKind, ProcessorRecord, ProcessorSpec};
pub use custom::{ComponentRegistry, HandlerClasses, InMemoryComponentRegistry};
pub use factory::HandlerFactory;
pub use queue::{MessagePublisher, PublishAck, PublisherFactory, QueueHandler};
pub use registry::{DispatchOutcome, ProcessorRegistry};
pub use resolver::HandlerResolver;
pub use webhook::WebhookHandler;
