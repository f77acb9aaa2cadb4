//! Narrow capabilities the pipeline depends on.
//!
//! The controller and loader see collaborators only through these traits;
//! the vault clients and the broker channel plug in behind them. Tests mock
//! them instead of standing up the real services.

use crate::error::WorkerError;
use amqp_broker::BrokerChannel;
use async_trait::async_trait;
use config_vault_client::{Config, ConfigVaultClient};
use schema_vault_client::{Schema, SchemaData, SchemaType, SchemaVaultClient};

/// Startup enumeration of configs for this worker's (service, provider).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn list_by_service_and_provider(
        &self,
        provider: &str,
        service: &str,
    ) -> Result<Vec<Config>, WorkerError>;
}

#[async_trait]
impl ConfigStore for ConfigVaultClient {
    async fn list_by_service_and_provider(
        &self,
        provider: &str,
        service: &str,
    ) -> Result<Vec<Config>, WorkerError> {
        Ok(ConfigVaultClient::list_by_service_and_provider(self, provider, service).await?)
    }
}

/// Per-message schema lookup and remote output validation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchemaStore: Send + Sync {
    async fn fetch(
        &self,
        provider: &str,
        service: &str,
        source: &str,
        schema_type: SchemaType,
    ) -> Result<Schema, WorkerError>;

    async fn validate(&self, data: SchemaData) -> Result<bool, WorkerError>;
}

#[async_trait]
impl SchemaStore for SchemaVaultClient {
    async fn fetch(
        &self,
        provider: &str,
        service: &str,
        source: &str,
        schema_type: SchemaType,
    ) -> Result<Schema, WorkerError> {
        Ok(self
            .get_by_schema_type(provider, service, source, schema_type)
            .await?)
    }

    async fn validate(&self, data: SchemaData) -> Result<bool, WorkerError> {
        Ok(SchemaVaultClient::validate(self, &data).await?)
    }
}

/// Outbound publishing onto the services exchange.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_event(&self, routing_key: &str, payload: &[u8]) -> Result<(), WorkerError>;
}

#[async_trait]
impl EventPublisher for BrokerChannel {
    async fn publish_event(&self, routing_key: &str, payload: &[u8]) -> Result<(), WorkerError> {
        Ok(self.publish(routing_key, payload).await?)
    }
}
