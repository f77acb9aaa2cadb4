//! Typed REST client for the Config Vault.
//!
//! Configs are the declarative records that bind one (provider, service,
//! source) pipeline to a parser module. The worker fetches them once at
//! startup via [`ConfigVaultClient::list_by_service_and_provider`]; the
//! remaining endpoints mirror the vault's full CRUD surface.

mod client;
mod types;

pub use client::{ConfigVaultClient, ConfigVaultError};
pub use types::{Config, JobDependency, JobParameters};
