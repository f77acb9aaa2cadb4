//! Typed REST client for the Schema Vault.
//!
//! Schemas pin the wire shape of each pipeline stage: an `input` schema
//! constrains inbound order data, an `output` schema constrains the
//! feedback a handler produces. Every schema carries a `schema_version_id`
//! that the worker stamps into the feedback metadata.

mod client;
mod types;

pub use client::{SchemaVaultClient, SchemaVaultError};
pub use types::{JsonSchema, Schema, SchemaData, SchemaType};
