//! Define multi-stage workflows as code and run them as job graphs on AWS Batch

/// Deployment settings and shared storage layout
pub mod config;
/// Local record of submitted jobs
pub mod graph;
/// LSF `bjobs` / `bsub` compatibility
pub mod legacy;
/// Submission and fan-in reduction
pub mod pipeline;
/// Batch queue clients
pub mod queue;
/// S3 helpers
pub mod storage;
/// Data transfer jobs
pub mod transfer;
/// Command runner inside worker containers
pub mod worker;

pub mod bioinformatics;
pub mod study;
