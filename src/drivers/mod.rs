//! Language execution drivers
//!
//! One driver per language family, all behind the same [`Driver`] trait:
//! lease a sandbox, stream the source in, compile if the family needs it,
//! run against the test input, and hand the sandbox back on every exit path.
//!
//! Drivers never fail across this boundary: every failure class maps into an
//! [`ErrorKind`] inside the returned result, so the orchestrator can treat
//! all languages uniformly and one test case can never abort a batch.
//!
//! All phases share a single end-to-end deadline computed at `execute()`
//! entry, so a hung write or compile step is bounded by the same budget as
//! the run itself.

pub mod compiled;
pub mod interpreted;
pub mod jvm;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use crate::languages::{Family, Language};
use crate::outcome::{ErrorKind, ExecutionResult};
use crate::pool::{ContainerPool, SandboxHandle};
use crate::runtime::{ExecOutput, SandboxRuntime};

pub use compiled::CompiledDriver;
pub use interpreted::InterpretedDriver;
pub use jvm::JvmDriver;

/// Language-specific orchestration of write -> (compile) -> run -> collect.
#[async_trait]
pub trait Driver: Send + Sync {
    fn language(&self) -> Language;

    /// Execute `source` against `stdin`. Always returns a result, never an
    /// error; infrastructure failures surface as `ErrorKind::Internal`.
    async fn execute(&self, source: &str, stdin: &str) -> ExecutionResult;
}

/// Resolve the driver for a language.
pub fn resolve(language: Language, pool: Arc<ContainerPool>, budget: Duration) -> Arc<dyn Driver> {
    match language.family() {
        Family::Interpreted => Arc::new(InterpretedDriver::new(language, pool, budget)),
        Family::Transpiled | Family::Native => Arc::new(CompiledDriver::new(language, pool, budget)),
        Family::Jvm => Arc::new(JvmDriver::new(language, pool, budget)),
    }
}

enum Phase {
    Completed(ExecOutput),
    TimedOut,
    Failed(anyhow::Error),
}

/// One leased sandbox plus the deadline shared by all phases.
///
/// Construction leases the handle; [`Session::finish`] is the single
/// hand-back point for every exit path. A session that timed out or hit an
/// exec transport failure is marked unhealthy and its sandbox is discarded
/// instead of re-entering the Free set.
pub(crate) struct Session {
    pool: Arc<ContainerPool>,
    runtime: Arc<dyn SandboxRuntime>,
    handle: SandboxHandle,
    budget: Duration,
    started: Instant,
    deadline: Instant,
    unhealthy: bool,
}

impl Session {
    /// Lease a sandbox. An acquisition failure is returned as a ready-made
    /// `Internal` result; there is no handle to release in that case.
    pub(crate) async fn open(
        pool: &Arc<ContainerPool>,
        language: Language,
        budget: Duration,
    ) -> Result<Session, ExecutionResult> {
        let handle = match pool.acquire(language).await {
            Ok(handle) => handle,
            Err(e) => {
                debug!(%language, error = %e, "sandbox acquisition failed");
                return Err(ExecutionResult::internal(e.to_string()));
            }
        };

        let started = Instant::now();
        Ok(Session {
            pool: Arc::clone(pool),
            runtime: pool.runtime(),
            handle,
            budget,
            started,
            deadline: started + budget,
            unhealthy: false,
        })
    }

    /// Stream the source into a fresh file inside the sandbox. The content
    /// travels over the exec stdin channel, never through shell-quoted
    /// arguments. Returns `Some(failure)` if the phase did not complete.
    pub(crate) async fn write_source(
        &mut self,
        file: &str,
        source: &str,
    ) -> Option<ExecutionResult> {
        let command = vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("cat > {}", file),
        ];
        match self.exec(&command, Some(source)).await {
            Phase::Completed(out) if out.success() => None,
            Phase::Completed(out) => {
                let detail = format!("source write exited with code {}", out.exit_code);
                Some(self.result(ErrorKind::WriteFailure, out, detail))
            }
            Phase::TimedOut => Some(self.timed_out()),
            Phase::Failed(e) => Some(self.infra_failure("source write", e)),
        }
    }

    /// Run the compiler against the written source. Returns `Some(failure)`
    /// if compilation did not succeed.
    pub(crate) async fn compile(&mut self, command: &[String]) -> Option<ExecutionResult> {
        match self.exec(command, None).await {
            Phase::Completed(out) if out.success() => None,
            Phase::Completed(out) => {
                let detail = format!("compiler exited with code {}", out.exit_code);
                Some(self.result(ErrorKind::CompileFailure, out, detail))
            }
            Phase::TimedOut => Some(self.timed_out()),
            Phase::Failed(e) => Some(self.infra_failure("compile", e)),
        }
    }

    /// Run the program, feeding `stdin` and closing it so the program can
    /// detect end-of-input. A non-zero exit is reported, not treated as a
    /// judge failure.
    pub(crate) async fn run(&mut self, command: &[String], stdin: &str) -> ExecutionResult {
        match self.exec(command, Some(stdin)).await {
            Phase::Completed(out) => {
                if out.success() {
                    self.result(ErrorKind::None, out, String::new())
                } else {
                    let detail = format!("process exited with code {}", out.exit_code);
                    self.result(ErrorKind::NonZeroExit, out, detail)
                }
            }
            Phase::TimedOut => self.timed_out(),
            Phase::Failed(e) => self.infra_failure("run", e),
        }
    }

    /// Hand the sandbox back and return the result. Called on every exit
    /// path; release is asynchronous relative to the caller.
    pub(crate) fn finish(self, result: ExecutionResult) -> ExecutionResult {
        if self.unhealthy {
            self.pool.discard(self.handle);
        } else {
            self.pool.release(self.handle);
        }
        result
    }

    async fn exec(&self, command: &[String], stdin: Option<&str>) -> Phase {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Phase::TimedOut;
        }
        // Dropping the exec future on timeout kills the child on our side;
        // the sandbox itself is discarded by finish().
        match tokio::time::timeout(remaining, self.runtime.exec(&self.handle.id, command, stdin))
            .await
        {
            Ok(Ok(out)) => Phase::Completed(out),
            Ok(Err(e)) => Phase::Failed(e),
            Err(_) => Phase::TimedOut,
        }
    }

    fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }

    fn result(&self, kind: ErrorKind, out: ExecOutput, detail: String) -> ExecutionResult {
        ExecutionResult {
            stdout: out.stdout,
            stderr: out.stderr,
            elapsed_ms: self.elapsed_ms(),
            memory_mb: None,
            error_kind: kind,
            error_detail: detail,
        }
    }

    fn timed_out(&mut self) -> ExecutionResult {
        // A runaway process may still be alive inside the sandbox.
        self.unhealthy = true;
        ExecutionResult {
            stdout: String::new(),
            stderr: String::new(),
            elapsed_ms: self.elapsed_ms(),
            memory_mb: None,
            error_kind: ErrorKind::Timeout,
            error_detail: format!("execution exceeded the {} ms budget", self.budget.as_millis()),
        }
    }

    fn infra_failure(&mut self, phase: &str, e: anyhow::Error) -> ExecutionResult {
        self.unhealthy = true;
        let mut result = ExecutionResult::internal(format!("{} phase failed: {:#}", phase, e));
        result.elapsed_ms = self.elapsed_ms();
        result
    }
}
