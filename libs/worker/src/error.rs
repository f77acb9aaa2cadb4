//! Error types for the worker pipeline.
//!
//! Per-message failures never cross a listener boundary: the event
//! controller converts them into a delivery disposition. Everything that
//! reaches the caller of a listener or the loader is fatal to the process.

use amqp_broker::BrokerError;
use config_vault_client::ConfigVaultError;
use schema_vault_client::SchemaVaultError;
use thiserror::Error;

/// Errors surfaced by the worker library.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Two loaded configs share a `config_id`. Fatal at startup.
    #[error("duplicate config id '{0}'")]
    DuplicateConfig(String),

    /// A config names a parser module absent from the registry. Fatal at
    /// startup, never at message time.
    #[error("unknown parser module '{0}'")]
    UnknownParserModule(String),

    /// Two handler factories registered under the same name.
    #[error("handler '{0}' already registered")]
    DuplicateHandler(String),

    #[error("config vault error: {0}")]
    ConfigVault(#[from] ConfigVaultError),

    #[error("schema vault error: {0}")]
    SchemaVault(#[from] SchemaVaultError),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    /// The delivery stream ended, which means the broker connection is gone.
    #[error("delivery stream closed for queue '{0}'")]
    ConsumerClosed(String),
}

/// Errors produced by a job handler's `execute`.
///
/// Handlers perform arbitrary I/O; anything they raise leaves the delivery
/// unacked so the broker redelivers it.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("invalid handler input: {0}")]
    InvalidInput(String),

    #[error("{context}: {source}")]
    Failed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl HandlerError {
    /// Wrap an arbitrary error with context.
    pub fn failed(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Failed {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
