use std::sync::Arc;

use reqwest::Client;
use tracing::{info, warn};

use relay_events::{EventHandler, ProcessorError, ProcessorResult};

use super::config::{ProcessorConfig, ProcessorSpec};
use super::custom::{ComponentRegistry, HandlerClasses, InMemoryComponentRegistry, as_event_handler};
use super::queue::{PublisherFactory, QueueHandler, UnavailablePublisherFactory};
use super::webhook::WebhookHandler;

/// Builds a tenant's handler from its configuration.
///
/// Holds the transports and registries every handler variant is built from;
/// one factory serves all tenants.
#[derive(Clone)]
pub struct HandlerFactory {
    publishers: Arc<dyn PublisherFactory>,
    http: Client,
    classes: HandlerClasses,
    components: Arc<dyn ComponentRegistry>,
}

impl Default for HandlerFactory {
    fn default() -> Self {
        Self::new(
            Arc::new(UnavailablePublisherFactory),
            Client::new(),
            HandlerClasses::new(),
            Arc::new(InMemoryComponentRegistry::new()),
        )
    }
}

impl HandlerFactory {
    pub fn new(
        publishers: Arc<dyn PublisherFactory>,
        http: Client,
        classes: HandlerClasses,
        components: Arc<dyn ComponentRegistry>,
    ) -> Self {
        Self {
            publishers,
            http,
            classes,
            components,
        }
    }

    pub fn with_publishers(mut self, publishers: Arc<dyn PublisherFactory>) -> Self {
        self.publishers = publishers;
        self
    }

    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_classes(mut self, classes: HandlerClasses) -> Self {
        self.classes = classes;
        self
    }

    pub fn with_components(mut self, components: Arc<dyn ComponentRegistry>) -> Self {
        self.components = components;
        self
    }

    pub fn classes(&self) -> &HandlerClasses {
        &self.classes
    }

    pub async fn build(&self, config: &ProcessorConfig) -> ProcessorResult<Arc<dyn EventHandler>> {
        let tenant = config.tenant();
        let result = match config.spec() {
            ProcessorSpec::Queue { topic, config_path } => self
                .publishers
                .create(topic, config_path)
                .await
                .map(|publisher| Arc::new(QueueHandler::new(publisher)) as Arc<dyn EventHandler>)
                .map_err(|e| ProcessorError::construction(tenant, format!("queue publisher: {e}"))),

            ProcessorSpec::Webhook { url } => Ok(Arc::new(WebhookHandler::new(
                self.http.clone(),
                url.clone(),
            )) as Arc<dyn EventHandler>),

            ProcessorSpec::CustomClass { type_name } => match self.classes.constructor(type_name) {
                Some(construct) => construct().map_err(|e| {
                    ProcessorError::construction(tenant, format!("{type_name} failed to instantiate: {e}"))
                }),
                None => Err(ProcessorError::construction(
                    tenant,
                    format!("unknown handler type: {type_name}"),
                )),
            },

            ProcessorSpec::CustomBean { bean_name } => match self.components.lookup(bean_name) {
                Some(component) => as_event_handler(&component).ok_or_else(|| {
                    ProcessorError::construction(
                        tenant,
                        format!("component '{bean_name}' is not an event handler"),
                    )
                }),
                None => Err(ProcessorError::construction(
                    tenant,
                    format!("no component registered as '{bean_name}'"),
                )),
            },
        };

        match &result {
            Ok(_) => info!(tenant = %tenant, kind = %config.kind(), "handler constructed"),
            Err(err) => warn!(tenant = %tenant, kind = %config.kind(), error = %err, "handler construction failed"),
        }
        result
    }
}
