//! Pipeline definitions submit jobs as they execute
//!
//! Each call submits synchronously and returns a [JobHandle] that later calls pass on as a
//! dependency. Execution order and parallelism are left entirely to the backend.

use std::cell::{Ref, RefCell};
use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::graph::{JobGraph, JobNode, NodeKind};
use crate::queue::{JobHandle, JobQueue, JobSpec, QueueError, MAX_DEPENDENCIES};
use crate::worker::{STDERR_LOG, STDOUT_LOG};

/// Command of every synthetic job
const NO_OP: &str = ":";

pub struct Pipeline<Q> {
    queue: Q,
    logs: PathBuf,
    graph: RefCell<JobGraph>,
}

impl<Q: JobQueue> Pipeline<Q> {
    /// Job logs are written below `logs`, which must be on shared storage
    pub fn new(queue: Q, logs: impl Into<PathBuf>) -> Result<Pipeline<Q>, QueueError> {
        let logs = logs.into();
        if !logs.exists() {
            info!("Creating job log directory {}", logs.display());
        }
        fs::create_dir_all(&logs)?;

        Ok(Pipeline { queue, logs, graph: RefCell::new(JobGraph::new()) })
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn graph(&self) -> Ref<'_, JobGraph> {
        self.graph.borrow()
    }

    /// Submit real work
    pub fn execute(&self, job: JobSpec) -> Result<JobHandle, QueueError> {
        self.submit(job, NodeKind::Work)
    }

    /// Submit a no-op that completes once every dependency has
    pub fn wait(&self, dependencies: impl IntoIterator<Item = JobHandle>) -> Result<JobHandle, QueueError> {
        self.submit(JobSpec::new("WAIT", NO_OP).depends_on(dependencies), NodeKind::Wait)
    }

    /// Submit `job` unless `output` is already on shared storage
    ///
    /// The check happens here, while the graph is built. A finished output is replaced by a
    /// wait job on the same dependencies so downstream handles still mean "this step is done".
    pub fn execute_unless_exists(&self, output: &Path, job: JobSpec) -> Result<JobHandle, QueueError> {
        if output.exists() {
            info!("{} already exists, skipping {}", output.display(), job.name);
            self.wait(job.dependencies)
        } else {
            self.execute(job)
        }
    }

    /// Shrink any number of handles to a dependency list the backend accepts
    ///
    /// Handles are joined [MAX_DEPENDENCIES] at a time, level by level, until one remains.
    /// No handles gives a single join with no dependencies, a single handle is returned as is.
    pub fn every(&self, handles: impl IntoIterator<Item = JobHandle>) -> Result<Vec<JobHandle>, QueueError> {
        let mut level: Vec<JobHandle> = handles.into_iter().collect();

        match level.len() {
            0 => return Ok(vec![self.join(Vec::new())?]),
            1 => return Ok(level),
            n => info!("Reducing {n} dependencies"),
        }

        while level.len() > 1 {
            level = level
                .chunks(MAX_DEPENDENCIES)
                .map(|chunk| self.join(chunk.to_vec()))
                .collect::<Result<Vec<JobHandle>, QueueError>>()?;
        }

        Ok(level)
    }

    fn join(&self, dependencies: Vec<JobHandle>) -> Result<JobHandle, QueueError> {
        self.submit(JobSpec::new("JOIN", NO_OP).depends_on(dependencies), NodeKind::Join)
    }

    fn submit(&self, job: JobSpec, kind: NodeKind) -> Result<JobHandle, QueueError> {
        job.check()?;
        let stdout = self.log_path(&job.name, "out");
        let stderr = self.log_path(&job.name, "err");
        let job = job.env(STDOUT_LOG, stdout).env(STDERR_LOG, stderr);

        let handle = self.queue.submit(&job)?;
        info!("Submitted {} as {handle} with {} dependencies", job.name, job.dependencies.len());

        self.graph.borrow_mut().insert(JobNode {
            handle: handle.clone(),
            name: job.name,
            kind,
            resources: job.resources,
            dependencies: job.dependencies,
        });
        Ok(handle)
    }

    fn log_path(&self, name: &str, extension: &str) -> String {
        self.logs.join(format!("{name}.{extension}")).display().to_string()
    }
}
