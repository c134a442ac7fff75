//! Driver for compiled languages (C, C++, TypeScript)
//!
//! Three phases: write the source, run the compiler, run the artifact. The
//! compiler's exit code decides between `CompileFailure` and the run phase;
//! its stderr is surfaced verbatim so the submitter sees real diagnostics.
//! Covers both native compilation (gcc/g++ producing a binary) and
//! compile-to-script (tsc producing a file for node).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{Driver, Session};
use crate::languages::{Language, LanguageSpec};
use crate::outcome::ExecutionResult;
use crate::pool::ContainerPool;

pub struct CompiledDriver {
    language: Language,
    spec: LanguageSpec,
    pool: Arc<ContainerPool>,
    budget: Duration,
}

impl CompiledDriver {
    pub fn new(language: Language, pool: Arc<ContainerPool>, budget: Duration) -> Self {
        Self {
            language,
            spec: language.spec(),
            pool,
            budget,
        }
    }
}

#[async_trait]
impl Driver for CompiledDriver {
    fn language(&self) -> Language {
        self.language
    }

    async fn execute(&self, source: &str, stdin: &str) -> ExecutionResult {
        debug!(language = %self.language, "compiled execution");
        let mut session = match Session::open(&self.pool, self.language, self.budget).await {
            Ok(session) => session,
            Err(result) => return result,
        };

        if let Some(failure) = session.write_source(self.spec.source_file, source).await {
            return session.finish(failure);
        }

        if let Some(command) = &self.spec.compile_command {
            if let Some(failure) = session.compile(command).await {
                return session.finish(failure);
            }
        }

        let result = session.run(&self.spec.run_command, stdin).await;
        session.finish(result)
    }
}
