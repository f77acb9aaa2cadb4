//! Per-message state machine.
//!
//! One controller is bound to one config for the lifetime of its listener.
//! Every delivery traverses: decode, input-schema validation, processing
//! announcement, dispatch to the job handler, output-schema version pinning,
//! remote output validation, feedback publish. The controller never touches
//! the broker delivery itself; it returns a [`Disposition`] and the listener
//! loop acks, rejects, or leaves the message.

use crate::debug::DebugSink;
use crate::error::WorkerError;
use crate::inflight::InFlightCounter;
use crate::metrics::{self, Outcome};
use crate::ports::{EventPublisher, SchemaStore};
use crate::record::InputRecord;
use crate::registry::HandlerFactory;
use amqp_broker::topology::{FEEDBACK_ROUTING_KEY, PROCESSING_ROUTING_KEY};
use config_vault_client::Config;
use domain_events::{InputMetadata, Metadata, OutputMetadata, ProcessOrder};
use schema_vault_client::{Schema, SchemaData, SchemaType};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// What the listener should do with the delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processing finished; acknowledge the delivery.
    Ack,
    /// The message itself is bad; nack without requeue.
    Reject,
    /// Leave the delivery unacked so the broker redelivers it.
    Leave,
}

/// The per-message state machine bound to one config.
pub struct EventController {
    config: Config,
    factory: Arc<dyn HandlerFactory>,
    schemas: Arc<dyn SchemaStore>,
    publisher: Arc<dyn EventPublisher>,
    in_flight: Arc<InFlightCounter>,
    debug: Arc<DebugSink>,
    /// Optional pause between output validation and the feedback publish.
    feedback_delay: Duration,
    /// Schemas are pinned for the controller's lifetime after first use.
    schema_cache: Mutex<HashMap<SchemaType, Schema>>,
    pipeline: String,
}

impl EventController {
    pub fn new(
        config: Config,
        factory: Arc<dyn HandlerFactory>,
        schemas: Arc<dyn SchemaStore>,
        publisher: Arc<dyn EventPublisher>,
        in_flight: Arc<InFlightCounter>,
        debug: Arc<DebugSink>,
    ) -> Self {
        let pipeline = format!(
            "{}.{}.{}",
            config.provider, config.service, config.source
        );
        Self {
            config,
            factory,
            schemas,
            publisher,
            in_flight,
            debug,
            feedback_delay: Duration::ZERO,
            schema_cache: Mutex::new(HashMap::new()),
            pipeline,
        }
    }

    /// Delay the feedback publish after output validation.
    pub fn with_feedback_delay(mut self, delay: Duration) -> Self {
        self.feedback_delay = delay;
        self
    }

    pub fn config_id(&self) -> &str {
        &self.config.config_id
    }

    /// Process one delivery payload and decide its fate.
    pub async fn process(&self, payload: &[u8]) -> Disposition {
        let started = Instant::now();
        let (outcome, disposition) = self.run(payload).await;
        metrics::record_order_processed(&self.pipeline, outcome);
        metrics::record_order_duration(&self.pipeline, started.elapsed());
        disposition
    }

    async fn run(&self, payload: &[u8]) -> (Outcome, Disposition) {
        // Inactive configs keep their deliveries enqueued: operators disable
        // a pipeline by removing the binding, not by draining the queue.
        if !self.config.active {
            info!(
                config_id = %self.config.config_id,
                "Controller for config is not active"
            );
            return (Outcome::Skipped, Disposition::Leave);
        }

        let order: ProcessOrder = match serde_json::from_slice(payload) {
            Ok(order) => order,
            Err(e) => {
                warn!(
                    config_id = %self.config.config_id,
                    error = %e,
                    "Failed to decode process order, rejecting"
                );
                return (Outcome::Rejected, Disposition::Reject);
            }
        };

        let input_schema = match self.schema(SchemaType::Input).await {
            Ok(schema) => schema,
            Err(e) => {
                error!(
                    processing_id = %order.processing_id,
                    error = %e,
                    "Input schema fetch failed, leaving delivery for redelivery"
                );
                return (Outcome::Failed, Disposition::Leave);
            }
        };

        let record = match InputRecord::from_schema(&input_schema.json_schema, &order.data) {
            Ok(record) => record,
            Err(e) if e.is_rejection() => {
                warn!(
                    processing_id = %order.processing_id,
                    error = %e,
                    "Order data failed input schema validation, rejecting"
                );
                return (Outcome::Rejected, Disposition::Reject);
            }
            Err(e) => {
                error!(
                    processing_id = %order.processing_id,
                    error = %e,
                    "Input schema unusable, leaving delivery for redelivery"
                );
                return (Outcome::Failed, Disposition::Leave);
            }
        };

        self.announce_processing(&order).await;

        let metadata = self.metadata(&order, input_schema.schema_version_id.clone());

        // Dispatch. The counter brackets exactly the handler execution.
        self.in_flight.acquire().await;
        let handler = self
            .factory
            .create(&self.config, &metadata, Arc::clone(&self.debug));
        info!(
            config_id = %self.config.config_id,
            handler = %self.factory.name(),
            processing_id = %order.processing_id,
            "Running job"
        );
        let result = handler.execute(&record).await;
        self.in_flight.release();

        let mut feedback = match result {
            Ok(feedback) => feedback,
            Err(e) => {
                error!(
                    processing_id = %order.processing_id,
                    handler = %self.factory.name(),
                    error = %e,
                    "Job handler failed, leaving delivery for redelivery"
                );
                return (Outcome::Failed, Disposition::Leave);
            }
        };

        // Pin the output schema version into the feedback we are about to
        // validate and publish.
        let output_schema = match self.schema(SchemaType::Output).await {
            Ok(schema) => schema,
            Err(e) => {
                error!(
                    processing_id = %order.processing_id,
                    error = %e,
                    "Output schema fetch failed, leaving delivery for redelivery"
                );
                return (Outcome::Failed, Disposition::Leave);
            }
        };
        feedback.metadata.output_metadata.schema_version_id =
            output_schema.schema_version_id.clone();

        match self.validate_output(feedback.data.clone()).await {
            Ok(true) => {}
            Ok(false) => {
                error!(
                    processing_id = %order.processing_id,
                    "Output schema is not valid"
                );
                return (Outcome::InvalidOutput, Disposition::Leave);
            }
            Err(e) => {
                error!(
                    processing_id = %order.processing_id,
                    error = %e,
                    "Output validation call failed, leaving delivery for redelivery"
                );
                return (Outcome::Failed, Disposition::Leave);
            }
        }

        if !self.feedback_delay.is_zero() {
            tokio::time::sleep(self.feedback_delay).await;
        }

        let payload = match serde_json::to_vec(&feedback) {
            Ok(payload) => payload,
            Err(e) => {
                error!(
                    processing_id = %order.processing_id,
                    error = %e,
                    "Failed to serialize feedback"
                );
                return (Outcome::Failed, Disposition::Leave);
            }
        };

        if let Err(e) = self
            .publisher
            .publish_event(FEEDBACK_ROUTING_KEY, &payload)
            .await
        {
            error!(
                processing_id = %order.processing_id,
                error = %e,
                "Failed to publish feedback, leaving delivery for redelivery"
            );
            return (Outcome::Failed, Disposition::Leave);
        }

        info!(
            processing_id = %order.processing_id,
            config_id = %self.config.config_id,
            "Published feedback"
        );
        (Outcome::Completed, Disposition::Ack)
    }

    /// Side-effect notification that a job entered processing. Failure is
    /// logged, never fatal to the message.
    async fn announce_processing(&self, order: &ProcessOrder) {
        let payload = match serde_json::to_vec(order) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Failed to serialize processing announcement");
                return;
            }
        };
        if let Err(e) = self
            .publisher
            .publish_event(PROCESSING_ROUTING_KEY, &payload)
            .await
        {
            warn!(
                processing_id = %order.processing_id,
                error = %e,
                "Failed to publish processing announcement, continuing"
            );
        }
    }

    async fn schema(&self, schema_type: SchemaType) -> Result<Schema, WorkerError> {
        {
            let cache = self.schema_cache.lock().await;
            if let Some(schema) = cache.get(&schema_type) {
                return Ok(schema.clone());
            }
        }

        let schema = self
            .schemas
            .fetch(
                &self.config.provider,
                &self.config.service,
                &self.config.source,
                schema_type,
            )
            .await?;
        self.schema_cache
            .lock()
            .await
            .insert(schema_type, schema.clone());
        Ok(schema)
    }

    async fn validate_output(&self, data: serde_json::Value) -> Result<bool, WorkerError> {
        self.schemas
            .validate(SchemaData {
                service: self.config.service.clone(),
                source: self.config.source.clone(),
                provider: self.config.provider.clone(),
                schema_type: SchemaType::Output,
                data,
            })
            .await
    }

    /// Provenance record for one order. The output schema version is pinned
    /// later, after the output schema fetch.
    fn metadata(&self, order: &ProcessOrder, input_schema_version: String) -> Metadata {
        Metadata {
            provider: self.config.provider.clone(),
            service: self.config.service.clone(),
            source: self.config.source.clone(),
            processing_id: order.processing_id.clone(),
            config_id: self.config.config_id.clone(),
            config_version_id: self.config.config_version_id.clone(),
            input_metadata: InputMetadata {
                input_id: order.input_id.clone(),
                schema_version_id: input_schema_version,
                processing_order_id: order.order_id.clone(),
            },
            output_metadata: OutputMetadata {
                schema_version_id: String::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::ports::{MockEventPublisher, MockSchemaStore};
    use crate::registry::JobHandler;
    use async_trait::async_trait;
    use config_vault_client::JobParameters;
    use domain_events::{ServiceFeedback, Status};
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Published = Arc<std::sync::Mutex<Vec<(String, Vec<u8>)>>>;

    fn test_config(active: bool) -> Config {
        Config {
            config_id: "cfg-1".to_string(),
            active,
            service: "video-downloader".to_string(),
            source: "pinkfong".to_string(),
            provider: "kids".to_string(),
            depends_on: vec![],
            job_parameters: JobParameters {
                parser_module: "video-downloader".to_string(),
            },
            config_version_id: "cv-1".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn test_schema(schema_type: SchemaType, version: &str) -> Schema {
        let json_schema = match schema_type {
            SchemaType::Input => json!({
                "type": "object",
                "properties": {"videoId": {"type": "string"}},
                "required": ["videoId"]
            }),
            SchemaType::Output => json!({
                "type": "object",
                "properties": {"videoUri": {"type": "string"}, "partition": {"type": "string"}},
                "required": ["videoUri", "partition"]
            }),
        };
        Schema {
            schema_id: format!("sch-{schema_type}"),
            service: "video-downloader".to_string(),
            source: "pinkfong".to_string(),
            provider: "kids".to_string(),
            schema_type,
            json_schema: serde_json::from_value(json_schema).unwrap(),
            schema_version_id: version.to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn order_payload() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "_id": "o1",
            "processing_id": "p1",
            "service": "video-downloader",
            "source": "pinkfong",
            "provider": "kids",
            "stage": "ready-to-process",
            "input_id": "i1",
            "data": {"videoId": "XqZsoesa55w"}
        }))
        .unwrap()
    }

    struct StubHandler {
        metadata: Metadata,
        result: Result<Value, String>,
    }

    #[async_trait]
    impl JobHandler for StubHandler {
        async fn execute(&self, _input: &InputRecord) -> Result<ServiceFeedback, HandlerError> {
            match &self.result {
                Ok(data) => Ok(ServiceFeedback {
                    data: data.clone(),
                    metadata: self.metadata.clone(),
                    status: Status {
                        code: 200,
                        detail: "Video uploaded successfully".to_string(),
                    },
                }),
                Err(message) => Err(HandlerError::InvalidInput(message.clone())),
            }
        }
    }

    struct StubFactory {
        result: Result<Value, String>,
        created: AtomicUsize,
    }

    impl StubFactory {
        fn ok(data: Value) -> Arc<Self> {
            Arc::new(Self {
                result: Ok(data),
                created: AtomicUsize::new(0),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                result: Err(message.to_string()),
                created: AtomicUsize::new(0),
            })
        }

        fn created_count(&self) -> usize {
            self.created.load(Ordering::SeqCst)
        }
    }

    impl HandlerFactory for StubFactory {
        fn name(&self) -> &'static str {
            "video-downloader"
        }

        fn create(
            &self,
            _config: &Config,
            metadata: &Metadata,
            _debug: Arc<DebugSink>,
        ) -> Box<dyn JobHandler> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Box::new(StubHandler {
                metadata: metadata.clone(),
                result: self.result.clone(),
            })
        }
    }

    fn capturing_publisher() -> (Arc<MockEventPublisher>, Published) {
        let published: Published = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&published);
        let mut publisher = MockEventPublisher::new();
        publisher.expect_publish_event().returning(move |rk, payload| {
            sink.lock()
                .unwrap()
                .push((rk.to_string(), payload.to_vec()));
            Ok(())
        });
        (Arc::new(publisher), published)
    }

    fn schema_store_with_validation(valid: bool) -> MockSchemaStore {
        let mut schemas = MockSchemaStore::new();
        schemas
            .expect_fetch()
            .returning(|_, _, _, schema_type| match schema_type {
                SchemaType::Input => Ok(test_schema(SchemaType::Input, "sv-in")),
                SchemaType::Output => Ok(test_schema(SchemaType::Output, "sv-out")),
            });
        schemas.expect_validate().returning(move |_| Ok(valid));
        schemas
    }

    fn controller_with(
        config: Config,
        factory: Arc<StubFactory>,
        schemas: MockSchemaStore,
        publisher: Arc<MockEventPublisher>,
        in_flight: Arc<InFlightCounter>,
    ) -> EventController {
        EventController::new(
            config,
            factory,
            Arc::new(schemas),
            publisher,
            in_flight,
            Arc::new(DebugSink::disabled()),
        )
    }

    #[tokio::test]
    async fn test_happy_path_publishes_feedback_and_acks() {
        let factory = StubFactory::ok(json!({
            "videoUri": "http://minio:9000/kids-pinkfong/video-downloader/videos/XqZsoesa55w/video.mp4",
            "partition": "video-downloader/videos/XqZsoesa55w"
        }));
        let (publisher, published) = capturing_publisher();
        let in_flight = Arc::new(InFlightCounter::new(1));
        let controller = controller_with(
            test_config(true),
            Arc::clone(&factory),
            schema_store_with_validation(true),
            publisher,
            Arc::clone(&in_flight),
        );

        let disposition = controller.process(&order_payload()).await;
        assert_eq!(disposition, Disposition::Ack);
        assert_eq!(in_flight.count(), 0);
        assert_eq!(factory.created_count(), 1);

        let published = published.lock().unwrap();
        assert_eq!(published.len(), 2);

        // First the processing announcement, with the original order.
        assert_eq!(published[0].0, "processing-job");
        let announced: ProcessOrder = serde_json::from_slice(&published[0].1).unwrap();
        assert_eq!(announced.order_id, "o1");

        // Then the feedback with full provenance.
        assert_eq!(published[1].0, "service.feedback");
        let feedback: ServiceFeedback = serde_json::from_slice(&published[1].1).unwrap();
        assert_eq!(feedback.status.code, 200);
        assert_eq!(feedback.metadata.processing_id, "p1");
        assert_eq!(feedback.metadata.config_id, "cfg-1");
        assert_eq!(feedback.metadata.config_version_id, "cv-1");
        assert_eq!(feedback.metadata.input_metadata.input_id, "i1");
        assert_eq!(feedback.metadata.input_metadata.processing_order_id, "o1");
        assert_eq!(feedback.metadata.input_metadata.schema_version_id, "sv-in");
        assert_eq!(feedback.metadata.output_metadata.schema_version_id, "sv-out");
        assert_eq!(
            feedback.data["partition"],
            "video-downloader/videos/XqZsoesa55w"
        );
    }

    #[tokio::test]
    async fn test_inactive_config_leaves_delivery_untouched() {
        let factory = StubFactory::ok(json!({}));
        let publisher = Arc::new(MockEventPublisher::new());
        let in_flight = Arc::new(InFlightCounter::new(1));
        let controller = controller_with(
            test_config(false),
            Arc::clone(&factory),
            MockSchemaStore::new(),
            publisher,
            Arc::clone(&in_flight),
        );

        let disposition = controller.process(&order_payload()).await;
        assert_eq!(disposition, Disposition::Leave);
        assert_eq!(factory.created_count(), 0);
        assert_eq!(in_flight.count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_rejected() {
        let factory = StubFactory::ok(json!({}));
        let publisher = Arc::new(MockEventPublisher::new());
        let controller = controller_with(
            test_config(true),
            Arc::clone(&factory),
            MockSchemaStore::new(),
            publisher,
            Arc::new(InFlightCounter::new(1)),
        );

        let disposition = controller.process(b"{not json").await;
        assert_eq!(disposition, Disposition::Reject);
        assert_eq!(factory.created_count(), 0);
    }

    #[tokio::test]
    async fn test_schema_invalid_input_is_rejected_without_dispatch() {
        let factory = StubFactory::ok(json!({}));
        let mut schemas = MockSchemaStore::new();
        schemas
            .expect_fetch()
            .returning(|_, _, _, _| Ok(test_schema(SchemaType::Input, "sv-in")));
        let publisher = Arc::new(MockEventPublisher::new());
        let in_flight = Arc::new(InFlightCounter::new(1));
        let controller = controller_with(
            test_config(true),
            Arc::clone(&factory),
            schemas,
            publisher,
            Arc::clone(&in_flight),
        );

        let payload = serde_json::to_vec(&json!({
            "_id": "o1",
            "processing_id": "p1",
            "service": "video-downloader",
            "source": "pinkfong",
            "provider": "kids",
            "stage": "ready-to-process",
            "input_id": "i1",
            "data": {}
        }))
        .unwrap();

        let disposition = controller.process(&payload).await;
        assert_eq!(disposition, Disposition::Reject);
        assert_eq!(factory.created_count(), 0);
        assert_eq!(in_flight.count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_output_leaves_delivery_without_feedback() {
        let factory = StubFactory::ok(json!({"videoUri": null}));
        let (publisher, published) = capturing_publisher();
        let in_flight = Arc::new(InFlightCounter::new(1));
        let controller = controller_with(
            test_config(true),
            Arc::clone(&factory),
            schema_store_with_validation(false),
            publisher,
            Arc::clone(&in_flight),
        );

        let disposition = controller.process(&order_payload()).await;
        assert_eq!(disposition, Disposition::Leave);
        assert_eq!(in_flight.count(), 0);

        // Only the processing announcement went out; no feedback.
        let published = published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "processing-job");
    }

    #[tokio::test]
    async fn test_handler_failure_leaves_delivery_and_releases_counter() {
        let factory = StubFactory::failing("videoId missing from input");
        let (publisher, published) = capturing_publisher();
        let mut schemas = MockSchemaStore::new();
        schemas
            .expect_fetch()
            .returning(|_, _, _, schema_type| match schema_type {
                SchemaType::Input => Ok(test_schema(SchemaType::Input, "sv-in")),
                SchemaType::Output => Ok(test_schema(SchemaType::Output, "sv-out")),
            });
        let in_flight = Arc::new(InFlightCounter::new(1));
        let controller = controller_with(
            test_config(true),
            Arc::clone(&factory),
            schemas,
            publisher,
            Arc::clone(&in_flight),
        );

        let disposition = controller.process(&order_payload()).await;
        assert_eq!(disposition, Disposition::Leave);
        assert_eq!(in_flight.count(), 0);
        assert_eq!(published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_schema_fetch_failure_leaves_delivery() {
        let factory = StubFactory::ok(json!({}));
        let mut schemas = MockSchemaStore::new();
        schemas.expect_fetch().returning(|_, _, _, _| {
            Err(WorkerError::SchemaVault(
                schema_vault_client::SchemaVaultError::EmptyBody("/schema".to_string()),
            ))
        });
        let publisher = Arc::new(MockEventPublisher::new());
        let controller = controller_with(
            test_config(true),
            Arc::clone(&factory),
            schemas,
            publisher,
            Arc::new(InFlightCounter::new(1)),
        );

        let disposition = controller.process(&order_payload()).await;
        assert_eq!(disposition, Disposition::Leave);
        assert_eq!(factory.created_count(), 0);
    }

    #[tokio::test]
    async fn test_schemas_are_cached_per_controller() {
        let factory = StubFactory::ok(json!({
            "videoUri": "http://minio/x",
            "partition": "p"
        }));
        let (publisher, _published) = capturing_publisher();
        let mut schemas = MockSchemaStore::new();
        schemas
            .expect_fetch()
            .times(2) // one input, one output, across two messages
            .returning(|_, _, _, schema_type| match schema_type {
                SchemaType::Input => Ok(test_schema(SchemaType::Input, "sv-in")),
                SchemaType::Output => Ok(test_schema(SchemaType::Output, "sv-out")),
            });
        schemas.expect_validate().returning(|_| Ok(true));
        let controller = controller_with(
            test_config(true),
            Arc::clone(&factory),
            schemas,
            publisher,
            Arc::new(InFlightCounter::new(1)),
        );

        assert_eq!(controller.process(&order_payload()).await, Disposition::Ack);
        assert_eq!(controller.process(&order_payload()).await, Disposition::Ack);
    }

    #[tokio::test]
    async fn test_output_validation_receives_handler_data() {
        let factory = StubFactory::ok(json!({
            "videoUri": "http://minio/x",
            "partition": "p"
        }));
        let (publisher, _published) = capturing_publisher();
        let mut schemas = MockSchemaStore::new();
        schemas
            .expect_fetch()
            .returning(|_, _, _, schema_type| match schema_type {
                SchemaType::Input => Ok(test_schema(SchemaType::Input, "sv-in")),
                SchemaType::Output => Ok(test_schema(SchemaType::Output, "sv-out")),
            });
        schemas
            .expect_validate()
            .withf(|data| {
                data.schema_type == SchemaType::Output
                    && data.data["videoUri"] == "http://minio/x"
                    && data.provider == "kids"
            })
            .returning(|_| Ok(true));
        let controller = controller_with(
            test_config(true),
            factory,
            schemas,
            publisher,
            Arc::new(InFlightCounter::new(1)),
        );

        assert_eq!(controller.process(&order_payload()).await, Disposition::Ack);
    }
}
