use std::cell::RefCell;

use log::info;

use crate::queue::{JobHandle, JobQueue, JobSpec, JobStatus, JobSummary, QueueError};

/// A job the in-memory queue accepted
#[derive(Clone, Debug)]
pub struct SubmittedJob {
    pub handle: JobHandle,
    pub spec: JobSpec,
    pub status: JobStatus,
}

/// Records submissions instead of sending them anywhere
///
/// Handles are sequential (`job-0000`, `job-0001`, ...) so dry runs are reproducible. Nothing
/// ever runs, jobs stay SUBMITTED unless a caller moves them with [MemoryQueue::set_status].
#[derive(Debug, Default)]
pub struct MemoryQueue {
    jobs: RefCell<Vec<SubmittedJob>>,
}

impl MemoryQueue {
    pub fn new() -> MemoryQueue {
        MemoryQueue::default()
    }

    pub fn jobs(&self) -> Vec<SubmittedJob> {
        self.jobs.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.jobs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.borrow().is_empty()
    }

    pub fn get(&self, handle: &JobHandle) -> Option<SubmittedJob> {
        self.jobs
            .borrow()
            .iter()
            .find(|job| &job.handle == handle)
            .cloned()
    }

    /// Submitted jobs with exactly this name
    pub fn named(&self, name: &str) -> Vec<SubmittedJob> {
        self.jobs
            .borrow()
            .iter()
            .filter(|job| job.spec.name == name)
            .cloned()
            .collect()
    }

    pub fn set_status(&self, handle: &JobHandle, status: JobStatus) {
        if let Some(job) = self
            .jobs
            .borrow_mut()
            .iter_mut()
            .find(|job| &job.handle == handle)
        {
            job.status = status;
        }
    }
}

impl JobQueue for MemoryQueue {
    fn submit(&self, job: &JobSpec) -> Result<JobHandle, QueueError> {
        job.check()?;
        let mut jobs = self.jobs.borrow_mut();
        let handle = JobHandle::new(format!("job-{:04}", jobs.len()));
        info!("Recording job {} as {handle}", job.name);
        jobs.push(SubmittedJob {
            handle: handle.clone(),
            spec: job.clone(),
            status: JobStatus::Submitted,
        });
        Ok(handle)
    }

    fn list(&self, status: JobStatus) -> Result<Vec<JobSummary>, QueueError> {
        Ok(self
            .jobs
            .borrow()
            .iter()
            .filter(|job| job.status == status)
            .map(|job| JobSummary {
                handle: job.handle.clone(),
                name: job.spec.name.clone(),
                status: job.status,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_sequential() {
        let queue = MemoryQueue::new();
        let first = queue.submit(&JobSpec::new("A", "true")).unwrap();
        let second = queue.submit(&JobSpec::new("B", "true")).unwrap();
        assert_eq!(first.as_str(), "job-0000");
        assert_eq!(second.as_str(), "job-0001");
    }

    #[test]
    fn listing_filters_by_status() {
        let queue = MemoryQueue::new();
        let running = queue.submit(&JobSpec::new("ALIGN", "true")).unwrap();
        queue.submit(&JobSpec::new("WAIT", ":")).unwrap();
        queue.set_status(&running, JobStatus::Running);

        let listed = queue.list(JobStatus::Running).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "ALIGN");
        assert_eq!(queue.list(JobStatus::Submitted).unwrap().len(), 1);
    }

    #[test]
    fn rejects_oversized_dependency_sets() {
        let queue = MemoryQueue::new();
        let handles = (0..25).map(|i| JobHandle::new(i.to_string()));
        let job = JobSpec::new("JOIN", ":").depends_on(handles);
        assert!(queue.submit(&job).is_err());
        assert!(queue.is_empty());
    }
}
