//! Data transfer jobs
//!
//! [transfer] is called while the graph is built and submits the fetch job. [fetch] is the
//! remote half, run by `cooper transfer` on a worker.

use std::fmt;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use log::{info, warn};
use rusoto_core::Region;
use rusoto_s3::{GetObjectRequest, S3};
use thiserror::Error;
use tokio::io::AsyncRead;
use url::Url;

use crate::pipeline::Pipeline;
use crate::queue::{JobHandle, JobQueue, JobSpec, QueueError};
use crate::storage;

/// Fetches hit the network, let the backend try twice
pub const TRANSFER_ATTEMPTS: u32 = 2;
const TRANSFER_MEMORY: u32 = 4096;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("unsupported source {0}, expected s3://, file:// or job://")]
    UnsupportedScheme(String),
    #[error("invalid source {locator}: {reason}")]
    InvalidSource { locator: String, reason: String },
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Where a file comes from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    S3 { bucket: String, key: String },
    /// Linked into place, never copied
    File(PathBuf),
    /// Produced by an upstream job, nothing to move
    Job(JobHandle),
}

impl FromStr for Source {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix("job://") {
            return Ok(Source::Job(JobHandle::new(id)));
        }

        let invalid = |reason: &str| TransferError::InvalidSource {
            locator: s.to_string(),
            reason: reason.to_string(),
        };

        // Keys are taken verbatim, S3 allows characters a URL would escape
        if let Some(location) = s.strip_prefix("s3://") {
            let (bucket, key) = location.split_once('/').ok_or_else(|| invalid("missing key"))?;
            if bucket.is_empty() {
                return Err(invalid("missing bucket"));
            }
            if key.is_empty() {
                return Err(invalid("missing key"));
            }
            return Ok(Source::S3 { bucket: bucket.to_string(), key: key.to_string() });
        }

        let url = Url::parse(s).map_err(|err| invalid(&err.to_string()))?;
        match url.scheme() {
            "file" => {
                let path = url.to_file_path().map_err(|_| invalid("not a local path"))?;
                Ok(Source::File(path))
            }
            _ => Err(TransferError::UnsupportedScheme(s.to_string())),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Source::S3 { bucket, key } => write!(f, "s3://{bucket}/{key}"),
            Source::File(path) => write!(f, "file://{}", path.display()),
            Source::Job(handle) => write!(f, "job://{handle}"),
        }
    }
}

/// Submit a fetch of `source` to `destination`, skipped remotely if the destination exists
pub fn transfer<Q: JobQueue>(pipeline: &Pipeline<Q>, source: &Source, destination: &Path) -> Result<JobHandle, TransferError> {
    if let Source::Job(handle) = source {
        info!("{} is produced by job {handle}", destination.display());
        return Ok(handle.clone());
    }

    let command = format!(
        "if [ ! -f '{destination}' ]; then cooper transfer --source='{source}' --destination='{destination}'; fi",
        destination = destination.display(),
    );
    let job = JobSpec::new("FILE_TRANSFER", command)
        .resources(1, TRANSFER_MEMORY)
        .retry_attempts(TRANSFER_ATTEMPTS);

    Ok(pipeline.execute(job)?)
}

/// Bring `source` to `destination` on the worker
pub async fn fetch(source: &Source, destination: &Path) -> anyhow::Result<()> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    match source {
        Source::S3 { bucket, key } => {
            info!("Downloading {source} to {}", destination.display());
            let client = storage::s3_client(Region::default())?;
            let request = GetObjectRequest {
                bucket: bucket.clone(),
                key: key.clone(),
                ..Default::default()
            };
            let object = client.get_object(request).await.with_context(|| format!("Can't get {source}"))?;
            let body = object.body.with_context(|| format!("{source} has no body"))?;

            write_complete(&mut body.into_async_read(), destination)
                .await
                .with_context(|| format!("Can't download {source}"))
        }
        Source::File(path) => {
            info!("Linking {} to {}", path.display(), destination.display());
            match tokio::fs::symlink(path, destination).await {
                Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(()),
                result => Ok(result?),
            }
        }
        Source::Job(handle) => anyhow::bail!("{} is written by job {handle}, there is nothing to fetch", destination.display()),
    }
}

/// Stream into a sibling `.part` file and only rename it onto `destination` once complete
///
/// A failed download must not leave anything at `destination`, the job's guard would take it
/// for a finished transfer on retry.
async fn write_complete<R: AsyncRead + Unpin>(reader: &mut R, destination: &Path) -> io::Result<()> {
    let mut partial = destination.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let copied = async {
        let mut file = tokio::fs::File::create(&partial).await?;
        tokio::io::copy(reader, &mut file).await?;
        file.sync_all().await
    }
    .await;

    match copied {
        Ok(()) => tokio::fs::rename(&partial, destination).await,
        Err(err) => {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                warn!("Can't remove {}: {cleanup}", partial.display());
            }
            Err(err)
        }
    }
}
