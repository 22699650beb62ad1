use std::time::Duration;

use log::{info, warn};
use rusoto_batch::{
    Batch, BatchClient, ContainerOverrides, JobDependency, KeyValuePair, ListJobsRequest,
    ResourceRequirement, RetryStrategy, SubmitJobRequest,
};
use rusoto_core::{HttpClient, Region};
use rusoto_credential::DefaultCredentialsProvider;
use tokio::runtime::Runtime;

use crate::queue::{JobHandle, JobQueue, JobSpec, JobStatus, JobSummary, QueueError};

/// Container entrypoint, every command runs through `cooper worker` so its output is logged
static WORKER_ENTRYPOINT: [&str; 2] = ["cooper", "worker"];

/// Pause between listing pages to stay under the ListJobs rate limit
const PAGE_INTERVAL: Duration = Duration::from_millis(100);

/// A job queue on AWS Batch
///
/// rusoto is async, but graph construction is sequential: each call blocks on a private
/// current-thread runtime until the backend acknowledges the request.
pub struct BatchQueue {
    client: BatchClient,
    runtime: Runtime,
    job_queue: String,
    job_definition: String,
}

impl BatchQueue {
    pub fn new(region: Region, job_queue: &str, job_definition: &str) -> anyhow::Result<BatchQueue> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let client = {
            let _guard = runtime.enter();
            BatchClient::new_with(HttpClient::new()?, DefaultCredentialsProvider::new()?, region)
        };
        info!("Connected to job queue {job_queue} with job definition {job_definition}");

        Ok(BatchQueue {
            client,
            runtime,
            job_queue: job_queue.to_string(),
            job_definition: job_definition.to_string(),
        })
    }

    fn request(&self, job: &JobSpec) -> SubmitJobRequest {
        let environment = job
            .environment
            .iter()
            .map(|(name, value)| KeyValuePair {
                name: Some(name.clone()),
                value: Some(value.clone()),
            })
            .collect();

        let resource_requirements = vec![
            ResourceRequirement {
                type_: "MEMORY".to_string(),
                value: job.resources.memory.to_string(),
            },
            ResourceRequirement {
                type_: "VCPU".to_string(),
                value: job.resources.vcpu.to_string(),
            },
        ];

        let mut command: Vec<String> = WORKER_ENTRYPOINT.iter().map(|s| s.to_string()).collect();
        command.push(job.command.clone());

        SubmitJobRequest {
            job_name: job.name.clone(),
            job_queue: job.queue.clone().unwrap_or_else(|| self.job_queue.clone()),
            job_definition: self.job_definition.clone(),
            depends_on: Some(
                job.dependencies
                    .iter()
                    .map(|handle| JobDependency {
                        job_id: Some(handle.to_string()),
                        ..Default::default()
                    })
                    .collect(),
            ),
            retry_strategy: Some(RetryStrategy {
                attempts: Some(i64::from(job.retry_attempts)),
                ..Default::default()
            }),
            container_overrides: Some(ContainerOverrides {
                command: Some(command),
                environment: Some(environment),
                resource_requirements: Some(resource_requirements),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

impl JobQueue for BatchQueue {
    fn submit(&self, job: &JobSpec) -> Result<JobHandle, QueueError> {
        job.check()?;
        let request = self.request(job);
        let response = self
            .runtime
            .block_on(self.client.submit_job(request))
            .map_err(|err| QueueError::Rejected {
                name: job.name.clone(),
                reason: err.to_string(),
            })?;

        Ok(JobHandle::new(response.job_id))
    }

    fn list(&self, status: JobStatus) -> Result<Vec<JobSummary>, QueueError> {
        self.runtime.block_on(self.list_pages(status))
    }
}

impl BatchQueue {
    async fn list_pages(&self, status: JobStatus) -> Result<Vec<JobSummary>, QueueError> {
        let mut summaries = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let request = ListJobsRequest {
                job_queue: Some(self.job_queue.clone()),
                job_status: Some(status.to_string()),
                next_token: next_token.take(),
                ..Default::default()
            };
            let page = self
                .client
                .list_jobs(request)
                .await
                .map_err(|err| QueueError::Listing {
                    status,
                    reason: err.to_string(),
                })?;

            for job in page.job_summary_list {
                // listing was filtered by status, trust the filter if the field is missing
                let job_status = match job.status.as_deref().map(str::parse::<JobStatus>) {
                    Some(Ok(job_status)) => job_status,
                    Some(Err(err)) => {
                        warn!("{err}, reporting job {} as {status}", job.job_id);
                        status
                    }
                    None => status,
                };
                summaries.push(JobSummary {
                    handle: JobHandle::new(job.job_id),
                    name: job.job_name,
                    status: job_status,
                });
            }

            match page.next_token {
                Some(token) => {
                    next_token = Some(token);
                    tokio::time::sleep(PAGE_INTERVAL).await;
                }
                None => break,
            }
        }

        Ok(summaries)
    }
}
