//! Submission interface to the external batch queue
//!
//! A [JobQueue] registers one remote unit of work per call and hands back a [JobHandle]
//! immediately. Scheduling, retries and dependency enforcement all happen on the backend.

use std::fmt;

use thiserror::Error;

/// AWS Batch implementation of [JobQueue]
pub mod batch;
/// In-memory queue for dry runs and tests
pub mod memory;
/// Backend job states
pub mod status;

pub use status::JobStatus;

/// The backend refuses jobs with more direct dependencies than this
pub const MAX_DEPENDENCIES: usize = 20;

/// Opaque reference to a submitted job, only ever used as a dependency
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> JobHandle {
        JobHandle(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Integral vCPU count and memory in MB
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct Resources {
    pub vcpu: u32,
    pub memory: u32,
}

impl Resources {
    pub fn new(vcpu: u32, memory: u32) -> Resources {
        Resources { vcpu, memory }
    }
}

impl Default for Resources {
    fn default() -> Self {
        Resources { vcpu: 1, memory: 2048 }
    }
}

/// Everything the backend needs to run one command
#[derive(Clone, Debug)]
pub struct JobSpec {
    pub name: String,
    pub command: String,
    pub resources: Resources,
    pub dependencies: Vec<JobHandle>,
    pub retry_attempts: u32,
    pub environment: Vec<(String, String)>,
    /// Overrides the queue the client was configured with
    pub queue: Option<String>,
}

impl JobSpec {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> JobSpec {
        JobSpec {
            name: name.into(),
            command: command.into(),
            resources: Resources::default(),
            dependencies: Vec::new(),
            retry_attempts: 1,
            environment: Vec::new(),
            queue: None,
        }
    }

    pub fn resources(mut self, vcpu: u32, memory: u32) -> JobSpec {
        self.resources = Resources::new(vcpu, memory);
        self
    }

    pub fn depends_on(mut self, dependencies: impl IntoIterator<Item = JobHandle>) -> JobSpec {
        self.dependencies.extend(dependencies);
        self
    }

    /// Attempts are clamped to at least one
    pub fn retry_attempts(mut self, attempts: u32) -> JobSpec {
        self.retry_attempts = attempts.max(1);
        self
    }

    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> JobSpec {
        self.environment.push((name.into(), value.into()));
        self
    }

    pub fn queue(mut self, queue: impl Into<String>) -> JobSpec {
        self.queue = Some(queue.into());
        self
    }

    /// Refuse specs the backend would reject for their dependency count
    pub fn check(&self) -> Result<(), QueueError> {
        match self.dependencies.len() {
            count if count > MAX_DEPENDENCIES => Err(QueueError::TooManyDependencies {
                name: self.name.clone(),
                count,
            }),
            _ => Ok(()),
        }
    }
}

/// One row of a job listing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobSummary {
    pub handle: JobHandle,
    pub name: String,
    pub status: JobStatus,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("batch queue rejected job {name}: {reason}")]
    Rejected { name: String, reason: String },
    #[error("job {name} has {count} dependencies, at most {max} are allowed", max = MAX_DEPENDENCIES)]
    TooManyDependencies { name: String, count: usize },
    #[error("can't list {status} jobs: {reason}")]
    Listing { status: JobStatus, reason: String },
    #[error("can't prepare job logs: {0}")]
    Logs(#[from] std::io::Error),
}

/// Synchronous acknowledgement, asynchronous execution
pub trait JobQueue {
    fn submit(&self, job: &JobSpec) -> Result<JobHandle, QueueError>;

    /// Every job currently in `status`, across all pages
    fn list(&self, status: JobStatus) -> Result<Vec<JobSummary>, QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_attempts_never_drop_below_one() {
        let job = JobSpec::new("WAIT", ":").retry_attempts(0);
        assert_eq!(job.retry_attempts, 1);
    }

    #[test]
    fn oversized_dependency_sets_are_refused() {
        let handles = (0..21).map(|i| JobHandle::new(format!("job-{i}")));
        let job = JobSpec::new("NORMALIZE", "true").depends_on(handles);
        match job.check() {
            Err(QueueError::TooManyDependencies { count, .. }) => assert_eq!(count, 21),
            other => panic!("expected too many dependencies, got {other:?}"),
        }

        let handles = (0..20).map(|i| JobHandle::new(format!("job-{i}")));
        assert!(JobSpec::new("ALIGN", "true").depends_on(handles).check().is_ok());
    }
}
