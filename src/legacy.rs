//! LSF compatibility
//!
//! Older pipeline scripts drive the scheduler with `bjobs` and `bsub`. These are the same two
//! commands mapped onto the batch queue, so the scripts run unmodified.

use std::io::{self, Read, Write};

use anyhow::{Context, Result};
use clap::{Args, Parser};
use log::info;

use crate::config::Settings;
use crate::queue::batch::BatchQueue;
use crate::queue::status::ACTIVE;
use crate::queue::{JobHandle, JobQueue, JobSpec, JobStatus, QueueError};
use crate::worker::{STDERR_LOG, STDOUT_LOG};

/// Added to every memory limit
pub const SAFETY_MARGIN: u32 = 512;

/// Jobs known to need more memory than they ask for
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JobKind {
    FilterSam,
    GetNovelExons,
    Other,
}

/// Name token of each heavy job kind and the headroom in MB it gets
static MEMORY_POLICIES: [(JobKind, &str, u32); 2] = [
    (JobKind::FilterSam, "filtersam", 3072),
    (JobKind::GetNovelExons, "get_novel_exons", 3072),
];

impl JobKind {
    /// Legacy names are dot separated, a kind matches when one segment is its token
    pub fn classify(legacy_name: &str) -> JobKind {
        legacy_name
            .split('.')
            .find_map(|segment| {
                MEMORY_POLICIES
                    .iter()
                    .find(|(_, token, _)| *token == segment)
                    .map(|(kind, _, _)| *kind)
            })
            .unwrap_or(JobKind::Other)
    }

    pub fn headroom(&self) -> u32 {
        MEMORY_POLICIES
            .iter()
            .find(|(kind, _, _)| kind == self)
            .map_or(0, |(_, _, headroom)| *headroom)
    }
}

/// LSF status code of a backend status, `None` once a job has left the queue
pub fn legacy_status(status: JobStatus) -> Option<&'static str> {
    match status {
        JobStatus::Running => Some("RUN"),
        JobStatus::Submitted | JobStatus::Pending | JobStatus::Runnable | JobStatus::Starting => Some("PEND"),
        JobStatus::Succeeded | JobStatus::Failed => None,
    }
}

/// Print `<name> <RUN|PEND>` for every active job
pub fn list_jobs<Q: JobQueue, W: Write>(queue: &Q, out: &mut W) -> Result<()> {
    for status in ACTIVE {
        let Some(code) = legacy_status(status) else { continue };
        for job in queue.list(status)? {
            writeln!(out, "{} {code}", job.name.replace('-', "."))?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Flags `bsub` is called with
#[derive(Clone, Debug, Args)]
pub struct Submission {
    /// Assigns the specified name to the job
    #[arg(short = 'J', long = "job_name")]
    pub job_name: String,
    /// Sets a memory limit in MB for all the processes that belong to the job
    #[arg(short = 'M', long = "memory")]
    pub memory: u32,
    /// Appends the standard output of the job to the specified log
    #[arg(short = 'o', long = "output_file")]
    pub output_file: String,
    /// Appends the standard error output of the job to the specified log
    #[arg(short = 'e', long = "error_file")]
    pub error_file: String,
}

impl Submission {
    /// The job `bsub` would have run, sized for the batch queue
    pub fn job(&self, command: String) -> JobSpec {
        let kind = JobKind::classify(&self.job_name);
        let memory = self.memory.saturating_add(SAFETY_MARGIN).saturating_add(kind.headroom());

        JobSpec::new(self.job_name.replace('.', "-"), command)
            .resources(1, memory)
            .env(STDOUT_LOG, self.output_file.clone())
            .env(STDERR_LOG, self.error_file.clone())
    }
}

pub fn submit<Q: JobQueue>(queue: &Q, submission: &Submission, command: String) -> Result<JobHandle, QueueError> {
    let job = submission.job(command);
    info!("Submitting legacy job {} with {} MB", job.name, job.resources.memory);
    queue.submit(&job)
}

#[derive(Debug, Parser)]
#[command(name = "bjobs", about = "List active jobs the way LSF does")]
pub struct ListArgs {
    /// Accepted for compatibility, output is never truncated
    #[arg(short = 'w')]
    pub wide: bool,
    #[command(flatten)]
    pub settings: Settings,
}

#[derive(Debug, Parser)]
#[command(name = "bsub", about = "Submit a job read from standard input the way LSF does")]
pub struct SubmitArgs {
    #[command(flatten)]
    pub submission: Submission,
    #[command(flatten)]
    pub settings: Settings,
}

pub fn bjobs(args: ListArgs) -> Result<()> {
    let settings = &args.settings;
    let queue = BatchQueue::new(settings.region()?, &settings.job_queue, &settings.job_definition)?;
    list_jobs(&queue, &mut io::stdout().lock())
}

pub fn bsub(args: SubmitArgs) -> Result<()> {
    let mut command = String::new();
    io::stdin()
        .read_to_string(&mut command)
        .context("Reading job command from standard input")?;

    let settings = &args.settings;
    let queue = BatchQueue::new(settings.region()?, &settings.job_queue, &settings.job_definition)?;
    submit(&queue, &args.submission, command)?;
    Ok(())
}
