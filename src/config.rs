//! Deployment settings, read from flags or the environment the infrastructure exports

use std::path::PathBuf;
use std::str::FromStr;

use clap::Args;
use rusoto_core::Region;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown AWS region {0}")]
    InvalidRegion(String),
    #[error("bucket {bucket} is in {bucket_region}, but the job queue is in {queue_region}")]
    RegionMismatch {
        bucket: String,
        bucket_region: String,
        queue_region: String,
    },
    #[error("can't locate bucket {bucket}: {reason}")]
    BucketLocation { bucket: String, reason: String },
}

/// Where jobs go
#[derive(Clone, Debug, Args)]
pub struct Settings {
    /// ARN of the batch job queue
    #[arg(long, env = "JOB_QUEUE_ARN")]
    pub job_queue: String,
    /// Job definition every worker container is started from
    #[arg(long, env = "WORKER_JOB_DEFINITION_NAME")]
    pub job_definition: String,
    #[arg(long, env = "AWS_REGION", default_value = "eu-west-2")]
    pub region: String,
}

impl Settings {
    pub fn region(&self) -> Result<Region, ConfigError> {
        Region::from_str(&self.region).map_err(|_| ConfigError::InvalidRegion(self.region.clone()))
    }
}

/// Layout of the shared file system for one analysis
#[derive(Clone, Debug, Args)]
pub struct Workspace {
    /// Shared storage, mounted at the same path on every worker
    #[arg(long, env = "FILE_SYSTEM_MOUNT_POINT")]
    pub mount_point: PathBuf,
    #[arg(long, env = "STUDY_NAME")]
    pub study: String,
    #[arg(long, env = "ANALYSIS_NAME")]
    pub analysis: String,
}

impl Workspace {
    pub fn analysis_directory(&self) -> PathBuf {
        self.mount_point.join(&self.study).join(&self.analysis)
    }

    pub fn logs_directory(&self) -> PathBuf {
        self.analysis_directory().join("logs")
    }

    /// Tools are shared between studies
    pub fn software_directory(&self) -> PathBuf {
        self.mount_point.join("software")
    }

    pub fn genomes_directory(&self) -> PathBuf {
        self.mount_point.join("genomes")
    }
}

/// Linked buckets must live where the jobs run
pub fn ensure_same_region(bucket: &str, bucket_region: &Region, queue_region: &Region) -> Result<(), ConfigError> {
    match bucket_region.name() == queue_region.name() {
        true => Ok(()),
        false => Err(ConfigError::RegionMismatch {
            bucket: bucket.to_string(),
            bucket_region: bucket_region.name().to_string(),
            queue_region: queue_region.name().to_string(),
        }),
    }
}
