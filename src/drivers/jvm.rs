//! Driver for JVM languages (Java)
//!
//! Same three-phase shape as the native driver, but the artifact is a class
//! file run by the JVM, and the budget is the longest of any family: javac
//! startup plus JVM startup are fixed costs that must fit inside the same
//! wall-clock budget as execution.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{Driver, Session};
use crate::languages::{Language, LanguageSpec};
use crate::outcome::ExecutionResult;
use crate::pool::ContainerPool;

pub struct JvmDriver {
    language: Language,
    spec: LanguageSpec,
    pool: Arc<ContainerPool>,
    budget: Duration,
}

impl JvmDriver {
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
impl Driver for JvmDriver {
    fn language(&self) -> Language {
        self.language
    }

    async fn execute(&self, source: &str, stdin: &str) -> ExecutionResult {
        debug!(language = %self.language, "jvm execution");
        let mut session = match Session::open(&self.pool, self.language, self.budget).await {
            Ok(session) => session,
            Err(result) => return result,
        };

        // The public class must be named to match the source file; the
        // submission contract fixes both to "Main".
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
