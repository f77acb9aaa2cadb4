//! The download-and-upload job.

use crate::fetcher::VideoFetcher;
use async_trait::async_trait;
use config_vault_client::Config;
use domain_events::{Metadata, ServiceFeedback, Status};
use event_worker::{DebugSink, HandlerError, HandlerFactory, InputRecord, JobHandler};
use object_store_client::ByteSink;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Registry name this handler answers to.
pub const HANDLER_NAME: &str = "video-downloader";

const TARGET_OBJECT: &str = "video";
const FILE_EXTENSION: &str = "mp4";
const DEFAULT_ENDPOINT_TEMPLATE: &str = "https://www.youtube.com/watch?v={video_id}";

/// Feedback payload of a successful upload.
#[derive(Serialize)]
struct Output {
    #[serde(rename = "videoUri")]
    video_uri: String,
    partition: String,
}

/// Builds a [`VideoDownloadJob`] per message.
pub struct VideoDownloaderFactory {
    fetcher: Arc<dyn VideoFetcher>,
    store: Arc<dyn ByteSink>,
    endpoint_template: String,
}

impl VideoDownloaderFactory {
    pub fn new(fetcher: Arc<dyn VideoFetcher>, store: Arc<dyn ByteSink>) -> Self {
        Self {
            fetcher,
            store,
            endpoint_template: DEFAULT_ENDPOINT_TEMPLATE.to_string(),
        }
    }

    /// Override the public endpoint template. `{video_id}` is substituted.
    pub fn with_endpoint_template(mut self, template: impl Into<String>) -> Self {
        self.endpoint_template = template.into();
        self
    }
}

impl HandlerFactory for VideoDownloaderFactory {
    fn name(&self) -> &'static str {
        HANDLER_NAME
    }

    fn create(
        &self,
        config: &Config,
        metadata: &Metadata,
        debug: Arc<DebugSink>,
    ) -> Box<dyn JobHandler> {
        Box::new(VideoDownloadJob {
            config: config.clone(),
            metadata: metadata.clone(),
            debug,
            fetcher: Arc::clone(&self.fetcher),
            store: Arc::clone(&self.store),
            endpoint_template: self.endpoint_template.clone(),
        })
    }
}

/// One video download bound to its config and metadata.
pub struct VideoDownloadJob {
    config: Config,
    metadata: Metadata,
    debug: Arc<DebugSink>,
    fetcher: Arc<dyn VideoFetcher>,
    store: Arc<dyn ByteSink>,
    endpoint_template: String,
}

impl VideoDownloadJob {
    fn bucket_name(&self) -> String {
        format!("{}-{}", self.config.provider, self.config.source)
    }

    fn partition(&self, video_id: &str) -> String {
        format!("{}/videos/{video_id}", self.config.service)
    }

    fn file_name(&self) -> String {
        format!("{TARGET_OBJECT}.{FILE_EXTENSION}")
    }

    fn file_path(&self, video_id: &str) -> String {
        format!("{}/{}", self.partition(video_id), self.file_name())
    }

    fn target_endpoint(&self, video_id: &str) -> String {
        self.endpoint_template.replace("{video_id}", video_id)
    }
}

#[async_trait]
impl JobHandler for VideoDownloadJob {
    async fn execute(&self, input: &InputRecord) -> Result<ServiceFeedback, HandlerError> {
        let video_id = input
            .get_str("videoId")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                HandlerError::InvalidInput("event order carries no videoId".to_string())
            })?;

        info!(
            config_id = %self.config.config_id,
            video_id,
            "Job triggered"
        );

        let video = self
            .fetcher
            .fetch(&self.target_endpoint(video_id))
            .await
            .map_err(|e| HandlerError::failed("failed to download video", e))?;

        self.debug.save(&self.file_name(), &video);

        let uri = self
            .store
            .put_bytes(&self.bucket_name(), &self.file_path(video_id), video)
            .await
            .map_err(|e| HandlerError::failed("failed to upload video", e))?;

        let output = Output {
            video_uri: uri,
            partition: self.partition(video_id),
        };
        let data = serde_json::to_value(output)
            .map_err(|e| HandlerError::failed("failed to serialize output", e))?;

        Ok(ServiceFeedback {
            data,
            metadata: self.metadata.clone(),
            status: Status {
                code: 200,
                detail: "Video uploaded successfully".to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FetchError;
    use config_vault_client::JobParameters;
    use domain_events::{InputMetadata, OutputMetadata};
    use object_store_client::MemoryStore;
    use schema_vault_client::JsonSchema;
    use serde_json::json;

    struct StubFetcher {
        result: Result<Vec<u8>, String>,
    }

    #[async_trait]
    impl VideoFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            match &self.result {
                Ok(bytes) => Ok(bytes.clone()),
                Err(_) => Err(FetchError::EmptyBody(url.to_string())),
            }
        }
    }

    fn test_config() -> Config {
        Config {
            config_id: "cfg-1".to_string(),
            active: true,
            service: "video-downloader".to_string(),
            source: "pinkfong".to_string(),
            provider: "kids".to_string(),
            depends_on: vec![],
            job_parameters: JobParameters {
                parser_module: HANDLER_NAME.to_string(),
            },
            config_version_id: "cv-1".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    fn test_metadata() -> Metadata {
        Metadata {
            provider: "kids".to_string(),
            service: "video-downloader".to_string(),
            source: "pinkfong".to_string(),
            processing_id: "p1".to_string(),
            config_id: "cfg-1".to_string(),
            config_version_id: "cv-1".to_string(),
            input_metadata: InputMetadata {
                input_id: "i1".to_string(),
                schema_version_id: "sv-in".to_string(),
                processing_order_id: "o1".to_string(),
            },
            output_metadata: OutputMetadata {
                schema_version_id: String::new(),
            },
        }
    }

    fn input_record(data: serde_json::Value) -> InputRecord {
        let schema: JsonSchema = serde_json::from_value(json!({
            "type": "object",
            "properties": {"videoId": {"type": ["string", "null"]}},
            "required": []
        }))
        .unwrap();
        InputRecord::from_schema(&schema, &data).unwrap()
    }

    fn job_with(
        fetcher_result: Result<Vec<u8>, String>,
        store: Arc<MemoryStore>,
    ) -> Box<dyn JobHandler> {
        let factory = VideoDownloaderFactory::new(
            Arc::new(StubFetcher {
                result: fetcher_result,
            }),
            store,
        );
        factory.create(
            &test_config(),
            &test_metadata(),
            Arc::new(DebugSink::disabled()),
        )
    }

    #[tokio::test]
    async fn test_happy_path_uploads_and_reports_uri() {
        let store = Arc::new(MemoryStore::with_endpoint("localhost:9000"));
        let job = job_with(Ok(vec![0xde, 0xad]), Arc::clone(&store));

        let feedback = job
            .execute(&input_record(json!({"videoId": "XqZsoesa55w"})))
            .await
            .unwrap();

        assert_eq!(feedback.status.code, 200);
        assert_eq!(
            feedback.data["videoUri"],
            "http://localhost:9000/kids-pinkfong/video-downloader/videos/XqZsoesa55w/video.mp4"
        );
        assert_eq!(
            feedback.data["partition"],
            "video-downloader/videos/XqZsoesa55w"
        );
        assert_eq!(feedback.metadata.processing_id, "p1");

        let stored = store
            .get_bytes(
                "kids-pinkfong",
                "video-downloader/videos/XqZsoesa55w/video.mp4",
            )
            .await
            .unwrap();
        assert_eq!(stored, vec![0xde, 0xad]);
    }

    #[tokio::test]
    async fn test_missing_video_id_is_invalid_input() {
        let store = Arc::new(MemoryStore::new());
        let job = job_with(Ok(vec![1]), Arc::clone(&store));

        let err = job.execute(&input_record(json!({}))).await.unwrap_err();
        assert!(matches!(err, HandlerError::InvalidInput(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_null_video_id_is_invalid_input() {
        let store = Arc::new(MemoryStore::new());
        let job = job_with(Ok(vec![1]), store);

        let err = job
            .execute(&input_record(json!({"videoId": null})))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates_without_upload() {
        let store = Arc::new(MemoryStore::new());
        let job = job_with(Err("boom".to_string()), Arc::clone(&store));

        let err = job
            .execute(&input_record(json!({"videoId": "abc"})))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::Failed { .. }));
        assert!(store.is_empty().await);
    }

    #[test]
    fn test_endpoint_template_substitution() {
        let job = VideoDownloadJob {
            config: test_config(),
            metadata: test_metadata(),
            debug: Arc::new(DebugSink::disabled()),
            fetcher: Arc::new(StubFetcher {
                result: Ok(vec![1]),
            }),
            store: Arc::new(MemoryStore::new()),
            endpoint_template: "http://gateway/videos/{video_id}".to_string(),
        };
        assert_eq!(job.target_endpoint("abc"), "http://gateway/videos/abc");
        assert_eq!(job.bucket_name(), "kids-pinkfong");
        assert_eq!(job.file_path("abc"), "video-downloader/videos/abc/video.mp4");
    }

    #[tokio::test]
    async fn test_debug_sink_captures_video_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(DebugSink::new(true, dir.path().to_str().unwrap()).unwrap());
        let factory = VideoDownloaderFactory::new(
            Arc::new(StubFetcher {
                result: Ok(vec![7, 7, 7]),
            }),
            Arc::new(MemoryStore::new()),
        );
        let job = factory.create(&test_config(), &test_metadata(), sink);

        job.execute(&input_record(json!({"videoId": "abc"})))
            .await
            .unwrap();

        let saved = dir.path().join("responses").join("1-video.mp4");
        assert_eq!(std::fs::read(saved).unwrap(), vec![7, 7, 7]);
    }
}
