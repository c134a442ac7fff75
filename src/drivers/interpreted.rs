//! Driver for interpreted-immediate languages (Python, JavaScript)
//!
//! Two phases only: write the source, run it under the interpreter. These
//! languages carry the shortest time budget since there is no compile cost
//! to absorb.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{Driver, Session};
use crate::languages::{Language, LanguageSpec};
use crate::outcome::ExecutionResult;
use crate::pool::ContainerPool;

pub struct InterpretedDriver {
    language: Language,
    spec: LanguageSpec,
    pool: Arc<ContainerPool>,
    budget: Duration,
}

impl InterpretedDriver {
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
impl Driver for InterpretedDriver {
    fn language(&self) -> Language {
        self.language
    }

    async fn execute(&self, source: &str, stdin: &str) -> ExecutionResult {
        debug!(language = %self.language, "interpreted execution");
        let mut session = match Session::open(&self.pool, self.language, self.budget).await {
            Ok(session) => session,
            Err(result) => return result,
        };

        if let Some(failure) = session.write_source(self.spec.source_file, source).await {
            return session.finish(failure);
        }

        let result = session.run(&self.spec.run_command, stdin).await;
        session.finish(result)
    }
}
