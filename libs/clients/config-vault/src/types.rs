use serde::{Deserialize, Serialize};

/// Advisory upstream dependency of a pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobDependency {
    pub service: String,
    pub source: String,
}

/// Parameters handed to the job handler selected by a config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobParameters {
    /// Name of the handler in the registry.
    pub parser_module: String,
}

/// Immutable record describing one (provider, service, source) pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Sole identity used for registration.
    #[serde(rename = "_id")]
    pub config_id: String,
    pub active: bool,
    pub service: String,
    pub source: String,
    pub provider: String,
    /// Ordered, advisory.
    pub depends_on: Vec<JobDependency>,
    pub job_parameters: JobParameters,
    pub config_version_id: String,
    pub created_at: String,
    pub updated_at: String,
}
