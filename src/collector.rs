use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::CollectorCommand;
use crate::types::Source;

/// Proof that a collector finished and (re)wrote its dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetWritten {
    pub source: Source,
    pub path: PathBuf,
    pub elapsed: Duration,
}

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("exited with {}", exit_label(.code))]
    ExitStatus { code: Option<i32> },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Failed(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => "a signal".to_string(),
    }
}

/// Something that refreshes one raw dataset. Implementations may shell out,
/// run in-process, or call a remote service.
#[async_trait]
pub trait Collector: Send + Sync {
    fn source(&self) -> Source;

    async fn run(&self) -> Result<DatasetWritten, CollectorError>;
}

/// Runs an external executable, captures its output into the log, and checks the exit status.
pub struct ProcessCollector {
    source: Source,
    command: CollectorCommand,
    dataset: PathBuf,
    timeout: Duration,
}

impl ProcessCollector {
    pub fn new(source: Source, command: CollectorCommand, dataset: PathBuf, timeout: Duration) -> Self {
        Self {
            source,
            command,
            dataset,
            timeout,
        }
    }
}

#[async_trait]
impl Collector for ProcessCollector {
    fn source(&self) -> Source {
        self.source
    }

    async fn run(&self) -> Result<DatasetWritten, CollectorError> {
        let started = Instant::now();
        let child = Command::new(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CollectorError::Spawn {
                program: self.command.program.clone(),
                source: e,
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(CollectorError::Failed(format!("waiting for collector: {e}"))),
            Err(_) => return Err(CollectorError::Timeout(self.timeout)),
        };

        let source = self.source;
        for line in String::from_utf8_lossy(&output.stdout).lines().filter(|l| !l.trim().is_empty()) {
            debug!(source = %source, "[{source} stdout] {line}");
        }
        for line in String::from_utf8_lossy(&output.stderr).lines().filter(|l| !l.trim().is_empty()) {
            warn!(source = %source, "[{source} stderr] {line}");
        }

        if !output.status.success() {
            return Err(CollectorError::ExitStatus {
                code: output.status.code(),
            });
        }

        Ok(DatasetWritten {
            source,
            path: self.dataset.clone(),
            elapsed: started.elapsed(),
        })
    }
}
