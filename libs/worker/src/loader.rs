//! Startup config loading.
//!
//! Enumerates every config registered for this worker's (service, provider)
//! and indexes them by `config_id`. A duplicate id means the vault holds
//! conflicting pipelines; failing fast beats guessing which one wins.

use crate::error::WorkerError;
use crate::ports::ConfigStore;
use config_vault_client::Config;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub struct ConfigLoader {
    store: Arc<dyn ConfigStore>,
    mapping: HashMap<String, Config>,
}

impl ConfigLoader {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self {
            store,
            mapping: HashMap::new(),
        }
    }

    /// Fetch and register every config for (service, provider).
    pub async fn fetch_for_service(
        mut self,
        service: &str,
        provider: &str,
    ) -> Result<HashMap<String, Config>, WorkerError> {
        info!(service, provider, "Fetching configurations");
        let configs = self
            .store
            .list_by_service_and_provider(provider, service)
            .await?;

        for config in configs {
            info!(
                config_id = %config.config_id,
                provider = %config.provider,
                source = %config.source,
                "Registered config"
            );
            self.register(config)?;
        }
        Ok(self.mapping)
    }

    fn register(&mut self, config: Config) -> Result<(), WorkerError> {
        if self.mapping.contains_key(&config.config_id) {
            return Err(WorkerError::DuplicateConfig(config.config_id));
        }
        self.mapping.insert(config.config_id.clone(), config);
        Ok(())
    }
}

/// Convenience wrapper: one-shot fetch for the worker's identity.
pub async fn fetch_configs(
    store: Arc<dyn ConfigStore>,
    service: &str,
    provider: &str,
) -> Result<HashMap<String, Config>, WorkerError> {
    ConfigLoader::new(store).fetch_for_service(service, provider).await
}
