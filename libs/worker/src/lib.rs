//! Event Worker - message lifecycle engine for crawler pipelines
//!
//! A reusable library for building (provider, service, source) workers with:
//! - Startup config loading with duplicate-id fail-fast
//! - One listener task per config, each with its own `prefetch = 1` channel
//! - A per-message state machine: decode, schema-resolve, validate-in,
//!   dispatch, validate-out, publish feedback
//! - A compile-time handler registry resolved before any message flows
//! - A bounded, observable in-flight job counter
//! - Optional on-disk capture of intermediate artifacts
//! - Health check endpoints for Kubernetes probes
//!
//! # Architecture
//!
//! ```text
//! services exchange (topic)
//!   ↓ input.ready-to-process.{provider}.{service}.{source}
//! Listener (per config, QoS=1)
//!   ↓ delivery payload
//! EventController
//!   ↓ execute            ↘ processing-job announcement
//! JobHandler (registry)
//!   ↓ ServiceFeedback
//! EventController → service.feedback → ack
//! ```
//!
//! # Example Usage
//!
//! ```rust,ignore
//! let configs = loader::fetch_configs(store, &identity.service, &identity.provider).await?;
//! let mut supervisor = ListenerSupervisor::new();
//! for config in configs.into_values() {
//!     let factory = registry.resolve(&config.job_parameters.parser_module)?;
//!     let controller = EventController::new(config.clone(), factory, schemas, publisher, in_flight, debug);
//!     let listener = Listener::bind(&connection, exchange, &config, controller).await?;
//!     supervisor.spawn(listener);
//! }
//! supervisor.join().await?;
//! ```

mod controller;
pub mod debug;
mod error;
pub mod health;
mod inflight;
mod listener;
pub mod loader;
pub mod metrics;
mod ports;
mod record;
mod registry;

pub use controller::{Disposition, EventController};
pub use debug::DebugSink;
pub use error::{HandlerError, WorkerError};
pub use health::{HealthState, health_router, serve_health};
pub use inflight::InFlightCounter;
pub use listener::{Listener, ListenerSupervisor};
pub use ports::{ConfigStore, EventPublisher, SchemaStore};
pub use record::{InputRecord, RecordError};
pub use registry::{HandlerFactory, HandlerRegistry, JobHandler};

/// Result type alias for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;
