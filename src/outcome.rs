//! Execution results and per-testcase outcomes
//!
//! Everything here is immutable once constructed. Drivers never raise across
//! the orchestrator boundary; every failure class is folded into
//! [`ErrorKind`] so one bad test case can never abort a batch.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure class of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Execution completed with exit code 0
    None,
    /// Streaming the source file into the sandbox failed
    WriteFailure,
    /// Compiler exited non-zero
    CompileFailure,
    /// The end-to-end deadline elapsed; the process was killed
    Timeout,
    /// The program exited with a non-zero code
    NonZeroExit,
    /// Pool exhaustion, provisioning failure or unexpected infrastructure error
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::None => "none",
            ErrorKind::WriteFailure => "write_failure",
            ErrorKind::CompileFailure => "compile_failure",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NonZeroExit => "non_zero_exit",
            ErrorKind::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

impl ErrorKind {
    pub fn is_none(&self) -> bool {
        matches!(self, ErrorKind::None)
    }
}

/// Result of one driver execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock time across the phases that actually ran
    #[serde(rename = "runtime_ms")]
    pub elapsed_ms: f64,
    /// Not measured by the container-CLI runtime; carried for the boundary contract
    #[serde(rename = "memory_mb", default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<f64>,
    #[serde(rename = "error")]
    pub error_kind: ErrorKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_detail: String,
}

impl ExecutionResult {
    /// An infrastructure failure that produced no program output.
    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            elapsed_ms: 0.0,
            memory_mb: None,
            error_kind: ErrorKind::Internal,
            error_detail: detail.into(),
        }
    }
}

/// One (input, expected output) pair to judge against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
}

/// Per-testcase verdict plus the full execution result for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct TestCaseOutcome {
    pub input: String,
    pub expected: String,
    /// Trailing-trimmed stdout, the value compared against `expected`
    pub output: String,
    pub passed: bool,
    #[serde(flatten)]
    pub result: ExecutionResult,
}

impl TestCaseOutcome {
    /// Judge one execution result against a test case. A pass requires a
    /// clean execution and an exact match of trailing-trimmed outputs.
    pub fn judge(test_case: TestCase, result: ExecutionResult) -> Self {
        let output = result.stdout.trim_end().to_string();
        let passed = result.error_kind.is_none() && output == test_case.expected_output.trim_end();
        Self {
            input: test_case.input,
            expected: test_case.expected_output,
            output,
            passed,
            result,
        }
    }
}
