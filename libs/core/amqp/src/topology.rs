//! Naming scheme for the shared topic-exchange topology.
//!
//! One durable topic exchange carries everything; queues and bindings are
//! derived from the (provider, service, source) triple of each pipeline.

/// Prefix of every per-pipeline input queue.
pub const INPUT_QUEUE_PREFIX: &str = "input-queue";

/// Prefix of the routing key that feeds an input queue.
pub const READY_TO_PROCESS_PREFIX: &str = "input.ready-to-process";

/// Routing key for intermediate "a job is being processed" notifications.
pub const PROCESSING_ROUTING_KEY: &str = "processing-job";

/// Routing key for the outbound feedback envelope.
pub const FEEDBACK_ROUTING_KEY: &str = "service.feedback";

/// Durable input queue name for one pipeline.
pub fn input_queue_name(provider: &str, service: &str, source: &str) -> String {
    format!("{INPUT_QUEUE_PREFIX}.{provider}.{service}.{source}")
}

/// Binding key that routes ready-to-process orders into the input queue.
pub fn input_routing_key(provider: &str, service: &str, source: &str) -> String {
    format!("{READY_TO_PROCESS_PREFIX}.{provider}.{service}.{source}")
}
