//! Runs a submitted command inside the batch container
//!
//! Workers are ephemeral, so both output streams are appended to log files on shared storage
//! while still being echoed to the console for the backend's own log capture.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use chrono::Utc;
use log::{info, warn};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Command;

/// Environment variable naming the stdout log of a job
pub const STDOUT_LOG: &str = "STDOUT_LOG";
/// Environment variable naming the stderr log of a job
pub const STDERR_LOG: &str = "STDERR_LOG";

pub struct LogDestinations {
    pub stdout: PathBuf,
    pub stderr: PathBuf,
}

impl LogDestinations {
    pub fn from_env() -> Result<LogDestinations> {
        let stdout = env::var(STDOUT_LOG).with_context(|| format!("{STDOUT_LOG} is not set"))?;
        let stderr = env::var(STDERR_LOG).with_context(|| format!("{STDERR_LOG} is not set"))?;
        Ok(LogDestinations { stdout: stdout.into(), stderr: stderr.into() })
    }
}

/// Run `command` with `sh -c` and return its exit code
pub async fn run(command: &str, logs: &LogDestinations) -> Result<i32> {
    info!("Starting command at {}", Utc::now());

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("Can't start shell")?;

    let stdout = child.stdout.take().context("stdout not captured")?;
    let stderr = child.stderr.take().context("stderr not captured")?;
    let stdout_log = open_log(&logs.stdout).await?;
    let stderr_log = open_log(&logs.stderr).await?;

    let (out, err) = tokio::join!(
        duplicate(stdout, tokio::io::stdout(), stdout_log),
        duplicate(stderr, tokio::io::stderr(), stderr_log),
    );
    let copied = out.context("Copying stdout").and_then(|()| err.context("Copying stderr"));
    if copied.is_err() {
        if let Err(err) = child.kill().await {
            warn!("Can't stop command: {err}");
        }
    }
    copied?;

    let status = child.wait().await?;
    info!("Command finished at {} with {status}", Utc::now());

    match status.code() {
        Some(code) => Ok(code),
        None => {
            warn!("Command was terminated by a signal");
            Ok(1)
        }
    }
}

async fn open_log(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("Can't open log {}", path.display()))
}

/// Copy every line of `stream` to the console and the log, bytes as they are
async fn duplicate<R, W>(stream: R, mut console: W, mut log: File) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    while reader.read_until(b'\n', &mut line).await? > 0 {
        console.write_all(&line).await?;
        log.write_all(&line).await?;
        line.clear();
    }
    console.flush().await?;
    log.flush().await
}
