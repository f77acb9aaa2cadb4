//! Handler registry: parser-module names resolved at program start.
//!
//! A config selects its handler by the `parser_module` string. The registry
//! maps every known name to a factory; resolution of all loaded configs
//! happens during startup, so an unknown name can never surface at message
//! time.

use crate::debug::DebugSink;
use crate::error::{HandlerError, WorkerError};
use crate::record::InputRecord;
use async_trait::async_trait;
use config_vault_client::Config;
use domain_events::{Metadata, ServiceFeedback};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// One job execution. Implementations may perform arbitrary I/O.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn execute(&self, input: &InputRecord) -> Result<ServiceFeedback, HandlerError>;
}

/// Builds a handler for one message from its config and metadata.
pub trait HandlerFactory: Send + Sync {
    /// The `parser_module` name this factory answers to.
    fn name(&self) -> &'static str;

    fn create(
        &self,
        config: &Config,
        metadata: &Metadata,
        debug: Arc<DebugSink>,
    ) -> Box<dyn JobHandler>;
}

/// Registry of handler factories keyed by parser-module name.
#[derive(Default)]
pub struct HandlerRegistry {
    factories: HashMap<&'static str, Arc<dyn HandlerFactory>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory. Registering the same name twice is an error.
    pub fn register(&mut self, factory: Arc<dyn HandlerFactory>) -> Result<(), WorkerError> {
        let name = factory.name();
        if self.factories.contains_key(name) {
            return Err(WorkerError::DuplicateHandler(name.to_string()));
        }
        info!(handler = name, "Registered job handler");
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Resolve a parser-module name. Called for every loaded config during
    /// startup; failure is fatal there.
    pub fn resolve(&self, parser_module: &str) -> Result<Arc<dyn HandlerFactory>, WorkerError> {
        self.factories
            .get(parser_module)
            .cloned()
            .ok_or_else(|| WorkerError::UnknownParserModule(parser_module.to_string()))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}
