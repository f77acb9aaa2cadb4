use crate::types::{Schema, SchemaData, SchemaType};
use core_config::discovery::{DiscoveryError, ServiceDiscovery};
use rate_limited_http::{HttpError, RateLimitedHttpClient};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

const SCHEMAS_ENDPOINT: &str = "/schema";

#[derive(Error, Debug)]
pub enum SchemaVaultError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("failed to decode schema payload: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("empty response body from '{0}'")]
    EmptyBody(String),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

#[derive(Deserialize)]
struct ValidationResponse {
    #[serde(default)]
    valid: bool,
}

/// Rate-limited client for the Schema Vault REST API.
pub struct SchemaVaultClient {
    http: RateLimitedHttpClient,
}

impl SchemaVaultClient {
    /// Build a client for the given base URL with the default rate limit.
    pub fn new(base_url: impl Into<String>) -> Result<Self, SchemaVaultError> {
        Ok(Self {
            http: RateLimitedHttpClient::with_defaults(base_url)?,
        })
    }

    /// Build a client from the discovered vault endpoint.
    pub fn from_discovery(sd: &ServiceDiscovery) -> Result<Self, SchemaVaultError> {
        Self::new(sd.schema_vault_endpoint()?)
    }

    async fn get_one(&self, path: &str) -> Result<Schema, SchemaVaultError> {
        let body = self.http.request(Method::GET, path, None, None).await?;
        decode_one(path, body)
    }

    async fn get_many(&self, path: &str) -> Result<Vec<Schema>, SchemaVaultError> {
        let body = self.http.request(Method::GET, path, None, None).await?;
        decode_many(path, body)
    }

    /// `POST /schema`: create a new schema.
    pub async fn create(&self, data: &Value) -> Result<Schema, SchemaVaultError> {
        let body = self
            .http
            .request(Method::POST, SCHEMAS_ENDPOINT, Some(data), None)
            .await?;
        decode_one(SCHEMAS_ENDPOINT, body)
    }

    /// `PUT /schema`: update an existing schema.
    pub async fn update(&self, data: &Value) -> Result<Schema, SchemaVaultError> {
        let body = self
            .http
            .request(Method::PUT, SCHEMAS_ENDPOINT, Some(data), None)
            .await?;
        decode_one(SCHEMAS_ENDPOINT, body)
    }

    /// `GET /schema`: list every schema.
    pub async fn list_all(&self) -> Result<Vec<Schema>, SchemaVaultError> {
        self.get_many(SCHEMAS_ENDPOINT).await
    }

    /// `GET /schema/{id}`: fetch one schema by id.
    pub async fn get_by_id(&self, schema_id: &str) -> Result<Schema, SchemaVaultError> {
        self.get_one(&paths::by_id(schema_id)).await
    }

    /// `DELETE /schema/{id}`: delete one schema.
    pub async fn delete(&self, schema_id: &str) -> Result<(), SchemaVaultError> {
        self.http
            .request(Method::DELETE, &paths::by_id(schema_id), None, None)
            .await?;
        debug!(schema_id, "Deleted schema");
        Ok(())
    }

    /// `GET /schema/provider/{p}/service/{s}`.
    pub async fn list_by_service_and_provider(
        &self,
        provider: &str,
        service: &str,
    ) -> Result<Vec<Schema>, SchemaVaultError> {
        self.get_many(&paths::by_service_and_provider(provider, service))
            .await
    }

    /// `GET /schema/provider/{p}/source/{src}`.
    pub async fn list_by_source_and_provider(
        &self,
        provider: &str,
        source: &str,
    ) -> Result<Vec<Schema>, SchemaVaultError> {
        self.get_many(&paths::by_source_and_provider(provider, source))
            .await
    }

    /// `GET /schema/provider/{p}/service/{s}/source/{src}`.
    pub async fn list_by_service_source_and_provider(
        &self,
        provider: &str,
        service: &str,
        source: &str,
    ) -> Result<Vec<Schema>, SchemaVaultError> {
        self.get_many(&paths::by_service_source_and_provider(
            provider, service, source,
        ))
        .await
    }

    /// `GET /schema/provider/{p}/service/{s}/source/{src}/schema-type/{t}`:
    /// the per-message lookup.
    pub async fn get_by_schema_type(
        &self,
        provider: &str,
        service: &str,
        source: &str,
        schema_type: SchemaType,
    ) -> Result<Schema, SchemaVaultError> {
        self.get_one(&paths::by_schema_type(provider, service, source, schema_type))
            .await
    }

    /// `POST /schema/validate`: remote validation of a payload against the
    /// registered schema. Returns the vault's verdict.
    pub async fn validate(&self, data: &SchemaData) -> Result<bool, SchemaVaultError> {
        let path = paths::validate();
        let payload = serde_json::to_value(data).map_err(SchemaVaultError::Decode)?;
        let body = self
            .http
            .request(Method::POST, &path, Some(&payload), None)
            .await?;
        let body = body.ok_or_else(|| SchemaVaultError::EmptyBody(path))?;
        let response: ValidationResponse =
            serde_json::from_value(body).map_err(SchemaVaultError::Decode)?;
        Ok(response.valid)
    }
}

fn decode_one(path: &str, body: Option<Value>) -> Result<Schema, SchemaVaultError> {
    let body = body.ok_or_else(|| SchemaVaultError::EmptyBody(path.to_string()))?;
    serde_json::from_value(body).map_err(SchemaVaultError::Decode)
}

fn decode_many(path: &str, body: Option<Value>) -> Result<Vec<Schema>, SchemaVaultError> {
    let body = body.ok_or_else(|| SchemaVaultError::EmptyBody(path.to_string()))?;
    serde_json::from_value(body).map_err(SchemaVaultError::Decode)
}

mod paths {
    use super::SchemaType;

    pub fn by_id(schema_id: &str) -> String {
        format!("{}/{schema_id}", super::SCHEMAS_ENDPOINT)
    }

    pub fn by_service_and_provider(provider: &str, service: &str) -> String {
        format!(
            "{}/provider/{provider}/service/{service}",
            super::SCHEMAS_ENDPOINT
        )
    }

    pub fn by_source_and_provider(provider: &str, source: &str) -> String {
        format!(
            "{}/provider/{provider}/source/{source}",
            super::SCHEMAS_ENDPOINT
        )
    }

    pub fn by_service_source_and_provider(provider: &str, service: &str, source: &str) -> String {
        format!(
            "{}/provider/{provider}/service/{service}/source/{source}",
            super::SCHEMAS_ENDPOINT
        )
    }

    pub fn by_schema_type(
        provider: &str,
        service: &str,
        source: &str,
        schema_type: SchemaType,
    ) -> String {
        format!(
            "{}/provider/{provider}/service/{service}/source/{source}/schema-type/{schema_type}",
            super::SCHEMAS_ENDPOINT
        )
    }

    pub fn validate() -> String {
        format!("{}/validate", super::SCHEMAS_ENDPOINT)
    }
}
