//! Lifecycle of the external node started by the bootstrap toolchain.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{HarnessError, HarnessResult};

pub const DEFAULT_BOOTSTRAP_PROGRAM: &str = "symbol-bootstrap";

/// Parameters handed to the toolchain on start and stop.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartParams {
    pub target: PathBuf,
    pub detached: bool,
}

impl StartParams {
    pub fn for_target(target: impl AsRef<Path>) -> Self {
        Self {
            target: target.as_ref().to_path_buf(),
            detached: true,
        }
    }
}

#[async_trait]
pub trait BootstrapService: Send + Sync {
    /// Boots the node. Starting a running node is left to the toolchain.
    async fn start(&self, params: &StartParams) -> HarnessResult<()>;

    async fn stop(&self, params: &StartParams) -> HarnessResult<()>;
}

/// Drives the bootstrap CLI as a child process.
#[derive(Clone, Debug)]
pub struct ProcessBootstrap {
    program: PathBuf,
}

impl Default for ProcessBootstrap {
    fn default() -> Self {
        Self::new(DEFAULT_BOOTSTRAP_PROGRAM)
    }
}

impl ProcessBootstrap {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn start_args(params: &StartParams) -> Vec<String> {
        let mut args = vec!["start".to_string()];
        if params.detached {
            args.push("--detached".to_string());
        }
        args.push("--target".to_string());
        args.push(params.target.display().to_string());
        args
    }

    pub fn stop_args(params: &StartParams) -> Vec<String> {
        vec![
            "stop".to_string(),
            "--target".to_string(),
            params.target.display().to_string(),
        ]
    }

    async fn run(&self, args: Vec<String>) -> HarnessResult<()> {
        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| {
                HarnessError::Service(format!("failed to run {}: {err}", self.program.display()))
            })?;
        if output.status.success() {
            return Ok(());
        }
        Err(HarnessError::Service(format!(
            "{} {} exited with {}: {}",
            self.program.display(),
            args.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

#[async_trait]
impl BootstrapService for ProcessBootstrap {
    async fn start(&self, params: &StartParams) -> HarnessResult<()> {
        self.run(Self::start_args(params)).await
    }

    async fn stop(&self, params: &StartParams) -> HarnessResult<()> {
        self.run(Self::stop_args(params)).await
    }
}

/// Owns the node for one session. Stops only what it started.
pub struct ServiceHandle {
    service: Arc<dyn BootstrapService>,
    params: StartParams,
    stop_on_close: bool,
    running: AtomicBool,
}

impl ServiceHandle {
    pub fn new(service: Arc<dyn BootstrapService>, params: StartParams, stop_on_close: bool) -> Self {
        Self {
            service,
            params,
            stop_on_close,
            running: AtomicBool::new(false),
        }
    }

    pub fn params(&self) -> &StartParams {
        &self.params
    }

    pub fn stop_on_close(&self) -> bool {
        self.stop_on_close
    }

    /// True once this handle has started the node and not yet stopped it.
    pub fn is_owned(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn start(&self) -> HarnessResult<()> {
        info!(dir = %self.params.target.display(), "starting bootstrap service");
        self.service.start(&self.params).await?;
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Stops the node if this handle owns it and is configured to.
    ///
    /// Returns whether a stop was attempted. Failures are logged, not returned.
    pub async fn stop(&self) -> bool {
        if !self.stop_on_close || !self.running.swap(false, Ordering::SeqCst) {
            return false;
        }
        info!(dir = %self.params.target.display(), "stopping bootstrap service");
        if let Err(err) = self.service.stop(&self.params).await {
            warn!(%err, "bootstrap service did not stop cleanly");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingBootstrap;

    #[test]
    fn cli_arguments() {
        let params = StartParams::for_target("target/bootstrap-test");
        assert_eq!(
            ProcessBootstrap::start_args(&params),
            vec!["start", "--detached", "--target", "target/bootstrap-test"]
        );
        assert_eq!(
            ProcessBootstrap::stop_args(&params),
            vec!["stop", "--target", "target/bootstrap-test"]
        );
    }

    #[tokio::test]
    async fn missing_program_is_service_error() {
        let bootstrap = ProcessBootstrap::new("/nonexistent/ledger-bootstrap");
        let err = bootstrap
            .start(&StartParams::for_target("unused"))
            .await
            .unwrap_err();
        assert!(matches!(err, HarnessError::Service(_)));
    }

    #[tokio::test]
    async fn never_started_service_is_not_stopped() {
        let recorder = Arc::new(RecordingBootstrap::default());
        let handle = ServiceHandle::new(recorder.clone(), StartParams::for_target("t"), true);
        assert!(!handle.stop().await);
        assert_eq!(recorder.stops(), 0);
    }

    #[tokio::test]
    async fn stop_runs_once_and_swallows_errors() {
        let recorder = Arc::new(RecordingBootstrap::failing_stop());
        let handle = ServiceHandle::new(recorder.clone(), StartParams::for_target("t"), true);
        handle.start().await.unwrap();
        assert!(handle.is_owned());
        assert!(handle.stop().await);
        assert!(!handle.stop().await);
        assert_eq!(recorder.starts(), 1);
        assert_eq!(recorder.stops(), 1);
    }

    #[tokio::test]
    async fn shared_node_is_left_running() {
        let recorder = Arc::new(RecordingBootstrap::default());
        let handle = ServiceHandle::new(recorder.clone(), StartParams::for_target("t"), false);
        handle.start().await.unwrap();
        assert!(!handle.stop().await);
        assert_eq!(recorder.stops(), 0);
    }
}
