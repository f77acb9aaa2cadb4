//! Wire types exchanged over the services topic exchange.
//!
//! Inbound: [`ProcessOrder`], the work item routed into a pipeline's input
//! queue. Outbound: [`ServiceFeedback`], the result envelope, carrying the
//! [`Metadata`] that pins which config and schema versions produced it.
//!
//! Field keys follow the wire contract; notably the wire `_id` maps to
//! `order_id` internally.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound order telling a pipeline to process one input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessOrder {
    /// Unique identifier of the order.
    #[serde(rename = "_id")]
    pub order_id: String,
    /// Unique identifier of this processing run.
    pub processing_id: String,
    /// Service the order is addressed to.
    pub service: String,
    /// Origin of the order.
    pub source: String,
    /// Provider of the order.
    pub provider: String,
    /// Current stage of the order processing.
    pub stage: String,
    /// Identifier of the input data.
    pub input_id: String,
    /// Order payload, constrained by the pipeline's input schema.
    pub data: Value,
}

/// Provenance of one input as recorded in the feedback envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputMetadata {
    pub input_id: String,
    /// Version of the input schema the order data was validated against.
    pub schema_version_id: String,
    pub processing_order_id: String,
}

/// Provenance of the produced output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputMetadata {
    /// Version of the output schema the feedback data was validated against.
    pub schema_version_id: String,
}

/// Full provenance record attached to every outbound feedback.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub provider: String,
    pub service: String,
    pub source: String,
    pub processing_id: String,
    pub config_id: String,
    pub config_version_id: String,
    pub input_metadata: InputMetadata,
    pub output_metadata: OutputMetadata,
}

/// Handler-defined result status.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub code: i64,
    pub detail: String,
}

/// Outbound result envelope published on `service.feedback`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceFeedback {
    /// Handler output, constrained by the pipeline's output schema.
    pub data: Value,
    pub metadata: Metadata,
    pub status: Status,
}
