//! Sandboxed multi-language code execution core for an online judge
//!
//! The crate leases pre-warmed container sandboxes from a per-language pool,
//! drives write/compile/run phases through language-family drivers under an
//! end-to-end deadline, and aggregates independent per-testcase verdicts.
//! The surrounding judge (problem catalog, submissions, HTTP) lives
//! elsewhere and only calls [`orchestrator::Orchestrator::run_all`].

pub mod cache;
pub mod config;
pub mod drivers;
pub mod languages;
pub mod orchestrator;
pub mod outcome;
pub mod pool;
pub mod runtime;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::EngineConfig;
pub use languages::Language;
pub use orchestrator::Orchestrator;
pub use outcome::{ErrorKind, ExecutionResult, TestCase, TestCaseOutcome};
pub use pool::{ContainerPool, PoolError, SandboxHandle};
pub use runtime::{DockerRuntime, SandboxRuntime};
