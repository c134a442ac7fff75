//! Sandbox runtime abstraction
//!
//! Thin boundary over the external container runtime: create an isolated
//! environment, run commands inside it, tear it down. The production
//! implementation shells out to the container CLI; tests substitute an
//! in-memory fake behind the same trait.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::EngineConfig;

/// Working directory inside every sandbox.
pub const SANDBOX_WORKDIR: &str = "/workspace";

/// Output of one command run inside a sandbox.
#[derive(Debug)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// External container runtime boundary.
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    /// Start an isolated environment from `image` with network disabled and
    /// fixed resource ceilings. Returns an opaque sandbox id.
    async fn create(&self, image: &str) -> Result<String>;

    /// Run a command inside an existing sandbox, streaming `stdin` in (closed
    /// after the write so the program observes end-of-input) and collecting
    /// stdout/stderr. Cancelling the returned future kills the child.
    async fn exec(&self, id: &str, command: &[String], stdin: Option<&str>) -> Result<ExecOutput>;

    /// Terminate and remove a sandbox.
    async fn destroy(&self, id: &str) -> Result<()>;
}

/// Container runtime driven through the `docker`-compatible CLI.
pub struct DockerRuntime {
    bin: String,
    memory_limit_mb: u32,
    cpus: f64,
}

impl DockerRuntime {
    pub fn new(bin: impl Into<String>, memory_limit_mb: u32, cpus: f64) -> Self {
        Self {
            bin: bin.into(),
            memory_limit_mb,
            cpus,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.container_bin.clone(),
            config.memory_limit_mb,
            config.cpus,
        )
    }
}

#[async_trait]
impl SandboxRuntime for DockerRuntime {
    async fn create(&self, image: &str) -> Result<String> {
        let output = Command::new(&self.bin)
            .args(["run", "-d", "--network", "none"])
            .arg(format!("--memory={}m", self.memory_limit_mb))
            .arg(format!("--cpus={}", self.cpus))
            .args(["--workdir", SANDBOX_WORKDIR, image, "tail", "-f", "/dev/null"])
            .output()
            .await
            .context("failed to invoke container runtime")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("container create failed for image {}: {}", image, stderr);
        }

        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(image, sandbox = %id, "created sandbox");
        Ok(id)
    }

    async fn exec(&self, id: &str, command: &[String], stdin: Option<&str>) -> Result<ExecOutput> {
        let mut cmd = Command::new(&self.bin);
        cmd.args(["exec", "-i", id])
            .args(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().context("failed to spawn exec in sandbox")?;

        // Write stdin and drop the handle so the program sees EOF.
        if let Some(mut handle) = child.stdin.take() {
            if let Some(input) = stdin {
                handle
                    .write_all(input.as_bytes())
                    .await
                    .context("failed to stream stdin into sandbox")?;
            }
        }

        let output = child
            .wait_with_output()
            .await
            .context("failed to wait for exec in sandbox")?;

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        let output = Command::new(&self.bin)
            .args(["rm", "-f", id])
            .output()
            .await
            .context("failed to invoke container runtime")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("container remove failed for {}: {}", id, stderr);
        }

        debug!(sandbox = %id, "destroyed sandbox");
        Ok(())
    }
}
