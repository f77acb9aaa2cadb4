use crate::types::Config;
use core_config::discovery::{DiscoveryError, ServiceDiscovery};
use rate_limited_http::{HttpError, RateLimitedHttpClient};
use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

const CONFIGS_ENDPOINT: &str = "/config";

#[derive(Error, Debug)]
pub enum ConfigVaultError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("failed to decode config payload: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("empty response body from '{0}'")]
    EmptyBody(String),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// Rate-limited client for the Config Vault REST API.
pub struct ConfigVaultClient {
    http: RateLimitedHttpClient,
}

impl ConfigVaultClient {
    /// Build a client for the given base URL with the default rate limit.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ConfigVaultError> {
        Ok(Self {
            http: RateLimitedHttpClient::with_defaults(base_url)?,
        })
    }

    /// Build a client from the discovered vault endpoint.
    pub fn from_discovery(sd: &ServiceDiscovery) -> Result<Self, ConfigVaultError> {
        Self::new(sd.config_vault_endpoint()?)
    }

    async fn get_one(&self, path: &str) -> Result<Config, ConfigVaultError> {
        let body = self.http.request(Method::GET, path, None, None).await?;
        decode_one(path, body)
    }

    async fn get_many(&self, path: &str) -> Result<Vec<Config>, ConfigVaultError> {
        let body = self.http.request(Method::GET, path, None, None).await?;
        decode_many(path, body)
    }

    /// `POST /config`: create a new config.
    pub async fn create(&self, data: &Value) -> Result<Config, ConfigVaultError> {
        let body = self
            .http
            .request(Method::POST, CONFIGS_ENDPOINT, Some(data), None)
            .await?;
        decode_one(CONFIGS_ENDPOINT, body)
    }

    /// `PUT /config`: update an existing config.
    pub async fn update(&self, data: &Value) -> Result<Config, ConfigVaultError> {
        let body = self
            .http
            .request(Method::PUT, CONFIGS_ENDPOINT, Some(data), None)
            .await?;
        decode_one(CONFIGS_ENDPOINT, body)
    }

    /// `GET /config`: list every config.
    pub async fn list_all(&self) -> Result<Vec<Config>, ConfigVaultError> {
        self.get_many(CONFIGS_ENDPOINT).await
    }

    /// `GET /config/{id}`: fetch one config by id.
    pub async fn get_by_id(&self, config_id: &str) -> Result<Config, ConfigVaultError> {
        self.get_one(&paths::by_id(config_id)).await
    }

    /// `DELETE /config/{id}`: delete one config.
    pub async fn delete(&self, config_id: &str) -> Result<(), ConfigVaultError> {
        self.http
            .request(Method::DELETE, &paths::by_id(config_id), None, None)
            .await?;
        debug!(config_id, "Deleted config");
        Ok(())
    }

    /// `GET /config/provider/{p}/service/{s}`: the startup call.
    pub async fn list_by_service_and_provider(
        &self,
        provider: &str,
        service: &str,
    ) -> Result<Vec<Config>, ConfigVaultError> {
        self.get_many(&paths::by_service_and_provider(provider, service))
            .await
    }

    /// `GET /config/provider/{p}/source/{src}`.
    pub async fn list_by_source_and_provider(
        &self,
        provider: &str,
        source: &str,
    ) -> Result<Vec<Config>, ConfigVaultError> {
        self.get_many(&paths::by_source_and_provider(provider, source))
            .await
    }

    /// `GET /config/provider/{p}/service/{s}/active/{bool}`.
    pub async fn list_by_service_provider_and_active(
        &self,
        provider: &str,
        service: &str,
        active: bool,
    ) -> Result<Vec<Config>, ConfigVaultError> {
        self.get_many(&paths::by_service_provider_and_active(
            provider, service, active,
        ))
        .await
    }

    /// `GET /config/provider/{p}/service/{s}/source/{src}`.
    pub async fn list_by_service_source_and_provider(
        &self,
        provider: &str,
        service: &str,
        source: &str,
    ) -> Result<Vec<Config>, ConfigVaultError> {
        self.get_many(&paths::by_service_source_and_provider(
            provider, service, source,
        ))
        .await
    }

    /// `GET /config/provider/{p}/dependencies/service/{s}/source/{src}`.
    pub async fn list_by_provider_and_dependencies(
        &self,
        provider: &str,
        service: &str,
        source: &str,
    ) -> Result<Vec<Config>, ConfigVaultError> {
        self.get_many(&paths::by_provider_and_dependencies(
            provider, service, source,
        ))
        .await
    }
}

fn decode_one(path: &str, body: Option<Value>) -> Result<Config, ConfigVaultError> {
    let body = body.ok_or_else(|| ConfigVaultError::EmptyBody(path.to_string()))?;
    serde_json::from_value(body).map_err(ConfigVaultError::Decode)
}

fn decode_many(path: &str, body: Option<Value>) -> Result<Vec<Config>, ConfigVaultError> {
    let body = body.ok_or_else(|| ConfigVaultError::EmptyBody(path.to_string()))?;
    serde_json::from_value(body).map_err(ConfigVaultError::Decode)
}

mod paths {
    pub fn by_id(config_id: &str) -> String {
        format!("{}/{config_id}", super::CONFIGS_ENDPOINT)
    }

    pub fn by_service_and_provider(provider: &str, service: &str) -> String {
        format!(
            "{}/provider/{provider}/service/{service}",
            super::CONFIGS_ENDPOINT
        )
    }

    pub fn by_source_and_provider(provider: &str, source: &str) -> String {
        format!(
            "{}/provider/{provider}/source/{source}",
            super::CONFIGS_ENDPOINT
        )
    }

    pub fn by_service_provider_and_active(provider: &str, service: &str, active: bool) -> String {
        format!(
            "{}/provider/{provider}/service/{service}/active/{active}",
            super::CONFIGS_ENDPOINT
        )
    }

    pub fn by_service_source_and_provider(provider: &str, service: &str, source: &str) -> String {
        format!(
            "{}/provider/{provider}/service/{service}/source/{source}",
            super::CONFIGS_ENDPOINT
        )
    }

    pub fn by_provider_and_dependencies(provider: &str, service: &str, source: &str) -> String {
        format!(
            "{}/provider/{provider}/dependencies/service/{service}/source/{source}",
            super::CONFIGS_ENDPOINT
        )
    }
}
