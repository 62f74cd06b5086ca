//! Domain event delivery. Fire-and-forget: a failed publish is logged and
//! never fails the request that produced the event.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::events::DomainEvent;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent);
}

pub type DynPublisher = Arc<dyn EventPublisher>;

pub async fn publish_all(publisher: &dyn EventPublisher, events: Vec<DomainEvent>) {
    for event in &events {
        publisher.publish(event).await;
    }
}

/// Publishes events as JSON on `storefront.<aggregate>.<event>` subjects.
#[derive(Debug, Clone)]
pub struct NatsPublisher {
    client: async_nats::Client,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client) -> Self { Self { client } }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &DomainEvent) {
        let subject = event.subject();
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(%subject, error = %e, "failed to encode event");
                return;
            }
        };
        if let Err(e) = self.client.publish(subject.clone(), payload.into()).await {
            warn!(%subject, error = %e, "failed to publish event");
        }
    }
}

/// Used when no broker is configured.
#[derive(Debug, Clone, Default)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &DomainEvent) {
        debug!(subject = %event.subject(), ?event, "domain event");
    }
}
