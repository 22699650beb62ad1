//! Installable tools
//!
//! A [Program] is a [Tool] at a version, installed at a location on shared storage. Installing
//! submits one job, and every job the program runs afterwards depends on that same handle.
//!
//! Skipping is asymmetric. The install job checks for the install location itself, remotely, so
//! it is safe across separate pipeline runs. Operations check for their output locally, while the
//! graph is built, and submit a wait job instead of work when it is already there.

use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;
use thiserror::Error;
use tinytemplate::TinyTemplate;

use crate::pipeline::Pipeline;
use crate::queue::{JobHandle, JobQueue, JobSpec, QueueError, MAX_DEPENDENCIES};

pub mod fastqc;
pub mod port;
pub mod sam2cov;
pub mod samtools;
pub mod star;

pub use fastqc::FastQc;
pub use port::{Normalization, Port};
pub use sam2cov::Sam2Cov;
pub use samtools::Samtools;
pub use star::{Star, StarIndex};

const INSTALL_VCPU: u32 = 8;
const INSTALL_MEMORY: u32 = 16000;

#[derive(Debug, Error)]
pub enum SoftwareError {
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("can't render install script: {0}")]
    Template(#[from] tinytemplate::error::Error),
    #[error("sample {0} has not been aligned")]
    Unaligned(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// How to get an external program onto shared storage
pub trait Tool {
    /// Stem of the tool's job names
    const NAME: &'static str;

    /// Shell steps run in a scratch directory, they must leave the tool at `location`
    fn install_steps(version: &str, location: &Path) -> String;

    fn executable(location: &Path) -> PathBuf;
}

/// A tool whose installation has been submitted
#[derive(Debug)]
pub struct Program<T> {
    version: String,
    location: PathBuf,
    installation: JobHandle,
    tool: PhantomData<T>,
}

/// Rendering context for the install wrapper
#[derive(Serialize)]
struct InstallContext {
    location: String,
    steps: String,
}

impl<T: Tool> Program<T> {
    pub fn install<Q: JobQueue>(pipeline: &Pipeline<Q>, version: &str, location: impl Into<PathBuf>) -> Result<Program<T>, SoftwareError> {
        let location = location.into();
        info!("Installing {} {version} at {}", T::NAME, location.display());

        let command = render_install(&location, &T::install_steps(version, &location))?;
        let job = JobSpec::new(format!("INSTALL_{}", T::NAME), command).resources(INSTALL_VCPU, INSTALL_MEMORY);
        let installation = pipeline.execute(job)?;

        Ok(Program {
            version: version.to_string(),
            location,
            installation,
            tool: PhantomData,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn installation(&self) -> &JobHandle {
        &self.installation
    }

    pub fn executable(&self) -> PathBuf {
        T::executable(&self.location)
    }
}

/// Render the install wrapper using TinyTemplate
fn render_install(location: &Path, steps: &str) -> Result<String, tinytemplate::error::Error> {
    /// included install wrapper template
    static INSTALL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/install.sh"));
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template("install", INSTALL)?;

    let context = InstallContext {
        location: location.display().to_string(),
        steps: steps.to_string(),
    };
    tt.render("install", &context)
}

/// Job name for an operation on one subject, restricted to what the backend accepts
pub fn job_name(operation: &str, subject: &str) -> String {
    let subject: String = subject
        .chars()
        .map(|c| match c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            true => c,
            false => '_',
        })
        .collect();
    format!("{operation}-{subject}")
}

/// `fixed` plus `upstream`, with `upstream` joined only if together they exceed the backend cap
pub fn bounded<Q: JobQueue>(pipeline: &Pipeline<Q>, fixed: Vec<JobHandle>, upstream: Vec<JobHandle>) -> Result<Vec<JobHandle>, QueueError> {
    let mut dependencies = fixed;
    match dependencies.len() + upstream.len() > MAX_DEPENDENCIES {
        true => dependencies.extend(pipeline.every(upstream)?),
        false => dependencies.extend(upstream),
    }
    Ok(dependencies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::memory::MemoryQueue;

    #[test]
    fn install_is_guarded_remotely() {
        let location = Path::new("/mnt/software/star-2.7.10b");
        let script = render_install(location, "make -j STAR").unwrap();

        assert!(script.starts_with("if [ -d \"/mnt/software/star-2.7.10b\" ]; then exit 0; fi"));
        assert!(script.contains("mkdir -p /mnt/software/star-2.7.10b"));
        assert!(script.contains("export TEMPORARY_DIRECTORY=$(mktemp -d)"));
        assert!(script.contains("make -j STAR"));
        assert!(script.trim_end().ends_with("rm -r $TEMPORARY_DIRECTORY"));
    }

    #[test]
    fn steps_are_not_escaped() {
        let script = render_install(Path::new("/opt/tool"), "echo \"a && b\" > <file>").unwrap();
        assert!(script.contains("echo \"a && b\" > <file>"));
    }

    #[test]
    fn job_names_are_sanitised() {
        assert_eq!(job_name("ALIGN", "Control 1.b"), "ALIGN-Control_1_b");
        assert_eq!(job_name("ALIGN", "K1-rep_2"), "ALIGN-K1-rep_2");
    }

    #[test]
    fn upstream_is_joined_only_when_needed() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(MemoryQueue::new(), dir.path().join("logs")).unwrap();
        let fixed = vec![JobHandle::new("install"), JobHandle::new("index")];
        let upstream = |n: usize| (0..n).map(|i| JobHandle::new(format!("read-{i}"))).collect::<Vec<_>>();

        assert_eq!(bounded(&pipeline, fixed.clone(), upstream(18)).unwrap().len(), 20);
        assert!(pipeline.queue().is_empty());

        let dependencies = bounded(&pipeline, fixed, upstream(19)).unwrap();
        assert_eq!(dependencies.len(), 3);
        assert_eq!(pipeline.queue().named("JOIN").len(), 1);
    }
}
