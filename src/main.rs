use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use rusoto_core::Region;

use cooper::config::{ensure_same_region, Settings, Workspace};
use cooper::legacy::{self, ListArgs, SubmitArgs};
use cooper::pipeline::Pipeline;
use cooper::queue::batch::BatchQueue;
use cooper::queue::memory::MemoryQueue;
use cooper::storage;
use cooper::study::manifest::Manifest;
use cooper::study::rnaseq;
use cooper::transfer::{self, Source};
use cooper::worker::{self, LogDestinations};

#[derive(Parser)]
#[command(name = "cooper", version, about = "Run workflows as job graphs on AWS Batch")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit every job of a study
    Run(RunArgs),
    /// List active jobs, same as bjobs
    Jobs(ListArgs),
    /// Submit a job read from standard input, same as bsub
    Submit(SubmitArgs),
    /// Run a command inside a worker container
    Worker {
        command: String,
    },
    /// Fetch a file on a worker
    Transfer {
        #[arg(long)]
        source: String,
        #[arg(long)]
        destination: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Path to the study manifest
    #[arg(long)]
    manifest: PathBuf,
    /// Record jobs locally and print the graph instead of submitting
    #[arg(long)]
    dry_run: bool,
    #[command(flatten)]
    workspace: Workspace,
    #[command(flatten)]
    settings: Settings,
}

fn main() -> Result<()> {
    env_logger::init();

    match Cli::parse().command {
        Command::Run(args) => run(args),
        Command::Jobs(args) => legacy::bjobs(args),
        Command::Submit(args) => legacy::bsub(args),
        Command::Worker { command } => {
            let logs = LogDestinations::from_env()?;
            let runtime = tokio::runtime::Runtime::new()?;
            let code = runtime.block_on(worker::run(&command, &logs))?;
            std::process::exit(code)
        }
        Command::Transfer { source, destination } => {
            let source: Source = source.parse()?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(transfer::fetch(&source, &destination))
        }
    }
}

fn run(args: RunArgs) -> Result<()> {
    let manifest = Manifest::read(&args.manifest)?;
    let logs = args.workspace.logs_directory();

    if args.dry_run {
        info!("--dry-run set, recording jobs without submitting them");
        let pipeline = Pipeline::new(MemoryQueue::new(), logs)?;
        rnaseq::build(&pipeline, &manifest, &args.workspace)?;
        println!("{}", serde_json::to_string_pretty(&*pipeline.graph())?);
        return Ok(());
    }

    let region = args.settings.region()?;
    check_bucket_regions(&manifest, &region)?;

    let queue = BatchQueue::new(region, &args.settings.job_queue, &args.settings.job_definition)?;
    let pipeline = Pipeline::new(queue, logs)?;
    let analysis = rnaseq::build(&pipeline, &manifest, &args.workspace)?;
    info!("Submitted {} jobs, normalization is {}", pipeline.graph().len(), analysis.normalization);
    Ok(())
}

/// Refuse to start when a read bucket is outside the queue's region
fn check_bucket_regions(manifest: &Manifest, region: &Region) -> Result<()> {
    let buckets = manifest.buckets();
    if buckets.is_empty() {
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(async {
        let client = storage::s3_client(region.clone())?;
        for bucket in &buckets {
            let bucket_region = storage::bucket_region(&client, bucket)
                .await
                .with_context(|| format!("Checking region of bucket {bucket}"))?;
            ensure_same_region(bucket, &bucket_region, region)?;
        }
        Ok::<(), anyhow::Error>(())
    })
}
