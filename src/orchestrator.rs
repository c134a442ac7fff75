//! Execution orchestrator
//!
//! The sole inbound boundary of the core: fan one submission out across its
//! test cases, one driver execution per case, and aggregate independent
//! verdicts. A failure on one test case never hides the results of the
//! others, and no ordering is guaranteed during execution; outcomes are
//! restored to input order before returning.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cache::ResultCache;
use crate::config::EngineConfig;
use crate::drivers::{self, Driver};
use crate::languages::{Family, Language};
use crate::outcome::{ExecutionResult, TestCase, TestCaseOutcome};
use crate::pool::ContainerPool;

pub struct Orchestrator {
    drivers: HashMap<Language, Arc<dyn Driver>>,
    cache: Option<ResultCache>,
}

impl Orchestrator {
    /// Build one driver per configured language against a shared pool.
    pub fn new(pool: Arc<ContainerPool>, config: &EngineConfig) -> Self {
        let drivers = config
            .pools()
            .map(|(language, settings)| {
                let driver = drivers::resolve(language, Arc::clone(&pool), settings.time_budget);
                (language, driver)
            })
            .collect();

        Self {
            drivers,
            cache: config.cache_ttl.map(ResultCache::new),
        }
    }

    /// Judge `code` against every test case. Always returns exactly one
    /// outcome per test case, in input order.
    pub async fn run_all(
        &self,
        code: &str,
        language: Language,
        test_cases: &[TestCase],
    ) -> Vec<TestCaseOutcome> {
        let Some(driver) = self.drivers.get(&language) else {
            let detail = format!("no driver configured for language: {}", language);
            return test_cases
                .iter()
                .cloned()
                .map(|tc| TestCaseOutcome::judge(tc, ExecutionResult::internal(detail.clone())))
                .collect();
        };

        // The cache is only sound for interpreted-immediate languages.
        let cache = match language.family() {
            Family::Interpreted => self.cache.clone(),
            _ => None,
        };

        let code: Arc<str> = Arc::from(code);
        let mut set = JoinSet::new();
        for (idx, test_case) in test_cases.iter().cloned().enumerate() {
            let driver = Arc::clone(driver);
            let code = Arc::clone(&code);
            let cache = cache.clone();
            set.spawn(async move {
                let result = execute_one(driver, cache, language, &code, &test_case.input).await;
                (idx, TestCaseOutcome::judge(test_case, result))
            });
        }

        let mut slots: Vec<Option<TestCaseOutcome>> =
            test_cases.iter().map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, outcome)) => slots[idx] = Some(outcome),
                Err(e) => warn!(error = %e, "test case execution task failed"),
            }
        }

        let outcomes: Vec<TestCaseOutcome> = slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.unwrap_or_else(|| {
                    TestCaseOutcome::judge(
                        test_cases[idx].clone(),
                        ExecutionResult::internal("execution task panicked"),
                    )
                })
            })
            .collect();

        let passed = outcomes.iter().filter(|o| o.passed).count();
        info!(%language, passed, total = outcomes.len(), "submission judged");
        outcomes
    }

    /// Same as [`Orchestrator::run_all`] but resolving the language from its
    /// wire name, for callers that hold a plain string.
    pub async fn run_all_named(
        &self,
        code: &str,
        language: &str,
        test_cases: &[TestCase],
    ) -> Vec<TestCaseOutcome> {
        match language.parse::<Language>() {
            Ok(language) => self.run_all(code, language, test_cases).await,
            Err(e) => test_cases
                .iter()
                .cloned()
                .map(|tc| TestCaseOutcome::judge(tc, ExecutionResult::internal(e.to_string())))
                .collect(),
        }
    }
}

async fn execute_one(
    driver: Arc<dyn Driver>,
    cache: Option<ResultCache>,
    language: Language,
    code: &str,
    input: &str,
) -> ExecutionResult {
    if let Some(cache) = &cache {
        if let Some(hit) = cache.get(language, code, input) {
            debug!(%language, "result cache hit");
            return hit;
        }
    }

    let result = driver.execute(code, input).await;

    if let Some(cache) = &cache {
        // Only clean results are cacheable. A transient infrastructure
        // failure (or any other fault) stored here would be replayed for the
        // whole TTL after the pool recovers.
        if result.error_kind.is_none() {
            cache.put(language, code, input, &result);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::ErrorKind;
    use crate::test_support::ScriptedRuntime;

    fn setup(toml: &str) -> (Orchestrator, Arc<ContainerPool>, Arc<ScriptedRuntime>) {
        let runtime = Arc::new(ScriptedRuntime::new());
        let config = EngineConfig::from_toml(toml).unwrap();
        let pool = Arc::new(ContainerPool::new(runtime.clone(), &config));
        let orchestrator = Orchestrator::new(pool.clone(), &config);
        (orchestrator, pool, runtime)
    }

    fn case(input: &str, expected: &str) -> TestCase {
        TestCase {
            input: input.to_string(),
            expected_output: expected.to_string(),
        }
    }

    #[tokio::test]
    async fn test_echo_submission_passes() {
        let (orchestrator, pool, _) = setup("[languages.python]\npool_size = 1");
        pool.warm_up().await;

        let outcomes = orchestrator
            .run_all("print(input())", Language::Python, &[case("hello", "hello")])
            .await;

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].passed);
        assert_eq!(outcomes[0].result.error_kind, ErrorKind::None);
    }

    #[tokio::test]
    async fn test_trailing_newline_tolerated_in_comparison() {
        let (orchestrator, pool, _) = setup("[languages.python]\npool_size = 1");
        pool.warm_up().await;

        // The echo program emits "42\n"; expected is "42".
        let outcomes = orchestrator
            .run_all("print(input())", Language::Python, &[case("42\n", "42")])
            .await;
        assert!(outcomes[0].passed);
    }

    #[tokio::test]
    async fn test_outcomes_keep_input_order() {
        let (orchestrator, pool, _) = setup("[languages.python]\npool_size = 2");
        pool.warm_up().await;

        let cases = vec![case("1", "1"), case("2", "2"), case("3", "wrong")];
        let outcomes = orchestrator
            .run_all("print(input())", Language::Python, &cases)
            .await;

        assert_eq!(outcomes.len(), 3);
        for (outcome, tc) in outcomes.iter().zip(&cases) {
            assert_eq!(outcome.input, tc.input);
        }
        assert!(outcomes[0].passed);
        assert!(outcomes[1].passed);
        assert!(!outcomes[2].passed);
    }

    #[tokio::test]
    async fn test_one_failing_case_never_hides_the_rest() {
        let (orchestrator, pool, runtime) = setup("[languages.python]\npool_size = 5");
        pool.warm_up().await;
        // Exactly one of the five executions loses its exec transport.
        runtime.fail_next_execs(1);

        let cases: Vec<TestCase> = (0..5).map(|i| case(&i.to_string(), &i.to_string())).collect();
        let outcomes = orchestrator
            .run_all("print(input())", Language::Python, &cases)
            .await;

        assert_eq!(outcomes.len(), 5);
        let internal = outcomes
            .iter()
            .filter(|o| o.result.error_kind == ErrorKind::Internal)
            .count();
        let passed = outcomes.iter().filter(|o| o.passed).count();
        assert_eq!(internal, 1);
        assert_eq!(passed, 4);
    }

    #[tokio::test]
    async fn test_compile_failure_still_yields_all_outcomes() {
        let (orchestrator, pool, _) = setup("[languages.cpp]\npool_size = 2");
        pool.warm_up().await;

        let cases = vec![case("a", "a"), case("b", "b"), case("c", "c")];
        let outcomes = orchestrator
            .run_all("int main() { #SYNTAX_ERROR }", Language::Cpp, &cases)
            .await;

        assert_eq!(outcomes.len(), 3);
        for outcome in &outcomes {
            assert!(!outcome.passed);
            assert_eq!(outcome.result.error_kind, ErrorKind::CompileFailure);
            assert!(!outcome.result.stderr.is_empty());
        }
    }

    #[tokio::test]
    async fn test_unconfigured_language_yields_internal_outcomes() {
        let (orchestrator, pool, _) = setup("[languages.python]\npool_size = 1");
        pool.warm_up().await;

        let outcomes = orchestrator
            .run_all("public class Main {}", Language::Java, &[case("a", "a")])
            .await;
        assert_eq!(outcomes[0].result.error_kind, ErrorKind::Internal);
        assert!(!outcomes[0].passed);
    }

    #[tokio::test]
    async fn test_unknown_language_name_yields_internal_outcomes() {
        let (orchestrator, pool, _) = setup("[languages.python]\npool_size = 1");
        pool.warm_up().await;

        let outcomes = orchestrator
            .run_all_named("code", "brainfuck", &[case("a", "a")])
            .await;
        assert_eq!(outcomes[0].result.error_kind, ErrorKind::Internal);
        assert!(outcomes[0].result.error_detail.contains("brainfuck"));
    }

    #[tokio::test]
    async fn test_cache_skips_repeat_interpreted_executions() {
        let (orchestrator, pool, runtime) =
            setup("cache_ttl_ms = 60000\n[languages.python]\npool_size = 1");
        pool.warm_up().await;

        let cases = [case("hi", "hi")];
        orchestrator.run_all("print(input())", Language::Python, &cases).await;
        let execs_after_first = runtime.exec_count();

        let outcomes = orchestrator.run_all("print(input())", Language::Python, &cases).await;
        assert!(outcomes[0].passed);
        assert_eq!(runtime.exec_count(), execs_after_first);
    }

    #[tokio::test]
    async fn test_cache_never_stores_transient_failures() {
        let (orchestrator, pool, runtime) =
            setup("cache_ttl_ms = 60000\n[languages.python]\npool_size = 2");
        pool.warm_up().await;
        runtime.fail_next_execs(1);

        let cases = [case("hi", "hi")];
        let first = orchestrator.run_all("print(input())", Language::Python, &cases).await;
        assert_eq!(first[0].result.error_kind, ErrorKind::Internal);

        // The transport is healthy again; the earlier failure must not be
        // replayed out of the cache.
        let second = orchestrator.run_all("print(input())", Language::Python, &cases).await;
        assert_eq!(second[0].result.error_kind, ErrorKind::None);
        assert!(second[0].passed);
    }

    #[tokio::test]
    async fn test_cache_never_applies_to_compiled_languages() {
        let (orchestrator, pool, runtime) =
            setup("cache_ttl_ms = 60000\n[languages.cpp]\npool_size = 1");
        pool.warm_up().await;

        let cases = [case("hi", "hi")];
        orchestrator.run_all("int main() {}", Language::Cpp, &cases).await;
        let execs_after_first = runtime.exec_count();

        orchestrator.run_all("int main() {}", Language::Cpp, &cases).await;
        assert!(runtime.exec_count() > execs_after_first);
    }
}
