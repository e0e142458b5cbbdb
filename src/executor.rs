//! Remote Executor (C1): runs commands and ships content to a node under a
//! fixed administrative identity (spec §6.2).

use crate::error::{DyniaError, ProviderError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Captured failure of a remote command: non-zero exit plus stderr.
#[derive(Debug, Clone)]
pub struct CommandFailure {
    pub exit_code: i32,
    pub stderr: String,
}

/// `exec`/`uploadContent`/`waitForReady` against a single host, under
/// whatever transport and identity the implementation fixes (typically
/// SSH with one administrative key).
#[async_trait]
pub trait Executor: Send + Sync {
    async fn exec(&self, host: &str, command: &str) -> Result<String>;
    async fn upload_content(&self, host: &str, remote_path: &str, bytes: &[u8]) -> Result<()>;

    /// Returns once a trivial command succeeds on `host`, bounded by
    /// `timeout`. Used both for fresh-VM readiness and post-prepare checks.
    async fn wait_for_ready(&self, host: &str, timeout: Duration) -> Result<()>;
}

/// SSH-backed executor using one fixed identity file, per spec §6.2
/// ("typically SSH with a fixed key").
pub struct SshExecutor {
    identity_path: String,
    user: String,
    ssh_port: u16,
}

impl SshExecutor {
    pub fn new(identity_path: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            identity_path: identity_path.into(),
            user: user.into(),
            ssh_port: 22,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.ssh_port = port;
        self
    }

    fn ssh_base_args(&self, host: &str) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.identity_path.clone(),
            "-p".to_string(),
            self.ssh_port.to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            format!("{}@{host}", self.user),
        ]
    }

    async fn run(&self, host: &str, command: &str) -> Result<String> {
        debug!(host, command, "executing remote command");
        let mut args = self.ssh_base_args(host);
        args.push(command.to_string());

        let output = Command::new("ssh")
            .args(&args)
            .output()
            .await
            .map_err(|e| DyniaError::Transport(format!("failed to spawn ssh: {e}")))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            let retryable = stderr.contains("Connection refused")
                || stderr.contains("Connection timed out")
                || stderr.contains("Could not resolve hostname");
            Err(DyniaError::Provider(ProviderError {
                message: format!(
                    "command on {host} exited with {}: {stderr}",
                    output.status.code().unwrap_or(-1)
                ),
                retryable,
            }))
        }
    }
}

#[async_trait]
impl Executor for SshExecutor {
    async fn exec(&self, host: &str, command: &str) -> Result<String> {
        self.run(host, command).await
    }

    async fn upload_content(&self, host: &str, remote_path: &str, bytes: &[u8]) -> Result<()> {
        debug!(host, remote_path, len = bytes.len(), "uploading content");
        let mut args = self.ssh_base_args(host);
        args.push(format!("cat > {remote_path}"));

        let mut child = Command::new("ssh")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DyniaError::Transport(format!("failed to spawn ssh: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| DyniaError::Transport("failed to open ssh stdin".to_string()))?;
        stdin
            .write_all(bytes)
            .await
            .map_err(|e| DyniaError::Transport(format!("failed to write upload content: {e}")))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| DyniaError::Transport(format!("failed to wait on ssh: {e}")))?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            Err(DyniaError::Provider(ProviderError::transient(format!(
                "upload to {host}:{remote_path} failed: {stderr}"
            ))))
        }
    }

    async fn wait_for_ready(&self, host: &str, timeout: Duration) -> Result<()> {
        crate::retry::retry(
            crate::retry::RetryPolicy::new(
                (timeout.as_secs() / 5).max(1) as u32,
                Duration::from_secs(5),
                Duration::from_secs(30),
            ),
            "wait_for_ready",
            || async { self.run(host, "true").await.map(|_| ()) },
        )
        .await
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records every call instead of touching the network; hosts listed in
    /// `unready_hosts` fail `wait_for_ready` until removed.
    #[derive(Default)]
    pub struct RecordingExecutor {
        pub commands: Mutex<Vec<(String, String)>>,
        pub uploads: Mutex<Vec<(String, String, Vec<u8>)>>,
        pub responses: Mutex<HashMap<String, String>>,
        pub unready_hosts: Mutex<std::collections::HashSet<String>>,
    }

    impl RecordingExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn stub(&self, command: impl Into<String>, output: impl Into<String>) {
            self.responses.lock().unwrap().insert(command.into(), output.into());
        }
    }

    #[async_trait]
    impl Executor for RecordingExecutor {
        async fn exec(&self, host: &str, command: &str) -> Result<String> {
            self.commands.lock().unwrap().push((host.to_string(), command.to_string()));
            Ok(self
                .responses
                .lock()
                .unwrap()
                .get(command)
                .cloned()
                .unwrap_or_default())
        }

        async fn upload_content(&self, host: &str, remote_path: &str, bytes: &[u8]) -> Result<()> {
            self.uploads
                .lock()
                .unwrap()
                .push((host.to_string(), remote_path.to_string(), bytes.to_vec()));
            Ok(())
        }

        async fn wait_for_ready(&self, host: &str, _timeout: Duration) -> Result<()> {
            if self.unready_hosts.lock().unwrap().contains(host) {
                Err(DyniaError::Provider(ProviderError::transient(format!(
                    "{host} not ready"
                ))))
            } else {
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingExecutor;
    use super::*;

    #[tokio::test]
    async fn recording_executor_replays_stubbed_output() {
        let executor = RecordingExecutor::new();
        executor.stub("echo hi", "hi\n");
        let out = executor.exec("brave-otter.example.com", "echo hi").await.unwrap();
        assert_eq!(out, "hi\n");
        assert_eq!(executor.commands.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn recording_executor_fails_ready_check_for_unready_hosts() {
        let executor = RecordingExecutor::new();
        executor.unready_hosts.lock().unwrap().insert("brave-otter".to_string());
        let result = executor.wait_for_ready("brave-otter", Duration::from_secs(1)).await;
        assert!(result.is_err());
    }
}
