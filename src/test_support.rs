//! In-memory sandbox runtime for tests
//!
//! `ScriptedRuntime` stands in for the container CLI behind the
//! [`SandboxRuntime`] trait. Submitted "programs" steer its behavior through
//! markers in the source text, so driver and orchestrator tests can exercise
//! every failure class without a container runtime on the host.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::runtime::{ExecOutput, SandboxRuntime};

/// Source markers understood by the fake:
/// - `#WRITE_FAIL`  — the write phase exits non-zero
/// - `#SYNTAX_ERROR` — the compile phase exits non-zero with stderr
/// - `#HANG`        — the run phase never completes
/// - `#EXIT:<n>`    — the run phase exits with code n
/// - `#OUT:<text>`  — the run phase prints text
/// - anything else  — the run phase echoes its stdin
pub struct ScriptedRuntime {
    created: AtomicUsize,
    execs: AtomicUsize,
    fail_creates: AtomicUsize,
    fail_execs: AtomicUsize,
    files: Mutex<HashMap<String, HashMap<String, String>>>,
    destroyed: Mutex<Vec<String>>,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self {
            created: AtomicUsize::new(0),
            execs: AtomicUsize::new(0),
            fail_creates: AtomicUsize::new(0),
            fail_execs: AtomicUsize::new(0),
            files: Mutex::new(HashMap::new()),
            destroyed: Mutex::new(Vec::new()),
        }
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn exec_count(&self) -> usize {
        self.execs.load(Ordering::SeqCst)
    }

    /// Make the next `n` create calls fail.
    pub fn fail_next_creates(&self, n: usize) {
        self.fail_creates.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` exec calls fail at spawn level.
    pub fn fail_next_execs(&self, n: usize) {
        self.fail_execs.store(n, Ordering::SeqCst);
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.destroyed.lock().clone()
    }

    fn take_token(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn stored_source(&self, id: &str) -> String {
        self.files
            .lock()
            .get(id)
            .and_then(|files| files.values().next().cloned())
            .unwrap_or_default()
    }
}

fn ok(stdout: impl Into<String>) -> ExecOutput {
    ExecOutput {
        stdout: stdout.into(),
        stderr: String::new(),
        exit_code: 0,
    }
}

fn failed(exit_code: i32, stderr: impl Into<String>) -> ExecOutput {
    ExecOutput {
        stdout: String::new(),
        stderr: stderr.into(),
        exit_code,
    }
}

fn marker_arg<'a>(source: &'a str, marker: &str) -> Option<&'a str> {
    source
        .lines()
        .find_map(|line| line.trim().strip_prefix(marker))
}

#[async_trait]
impl SandboxRuntime for ScriptedRuntime {
    async fn create(&self, _image: &str) -> Result<String> {
        // Startup takes at least one scheduler tick, like a real container.
        tokio::task::yield_now().await;
        if Self::take_token(&self.fail_creates) {
            bail!("image pull failed");
        }
        let n = self.created.fetch_add(1, Ordering::SeqCst);
        let id = format!("sbx-{}", n);
        self.files.lock().insert(id.clone(), HashMap::new());
        Ok(id)
    }

    async fn exec(&self, id: &str, command: &[String], stdin: Option<&str>) -> Result<ExecOutput> {
        self.execs.fetch_add(1, Ordering::SeqCst);
        if Self::take_token(&self.fail_execs) {
            bail!("exec transport failed");
        }
        if self.destroyed.lock().contains(&id.to_string()) {
            bail!("no such sandbox: {}", id);
        }

        // Write phase: sh -c "cat > FILE"
        if command.len() == 3 && command[0] == "sh" && command[1] == "-c" {
            if let Some(file) = command[2].strip_prefix("cat > ") {
                let source = stdin.unwrap_or_default().to_string();
                if source.contains("#WRITE_FAIL") {
                    return Ok(failed(1, "write: no space left on device"));
                }
                self.files
                    .lock()
                    .entry(id.to_string())
                    .or_default()
                    .insert(file.to_string(), source);
                return Ok(ok(""));
            }
        }

        // Compile phase
        if matches!(command[0].as_str(), "gcc" | "g++" | "javac" | "tsc") {
            let source = self.stored_source(id);
            if source.contains("#SYNTAX_ERROR") {
                return Ok(failed(1, "error: expected ';' before '}' token"));
            }
            return Ok(ok(""));
        }

        // Run phase
        let source = self.stored_source(id);
        if source.contains("#HANG") {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if let Some(code) = marker_arg(&source, "#EXIT:") {
            let code: i32 = code.trim().parse().unwrap_or(1);
            return Ok(failed(code, "runtime failure"));
        }
        if let Some(text) = marker_arg(&source, "#OUT:") {
            return Ok(ok(format!("{}\n", text)));
        }
        // Default program: echo stdin
        Ok(ok(stdin.unwrap_or_default()))
    }

    async fn destroy(&self, id: &str) -> Result<()> {
        self.files.lock().remove(id);
        self.destroyed.lock().push(id.to_string());
        Ok(())
    }
}

/// Let spawned release/discard tasks run to completion.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
