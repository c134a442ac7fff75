//! Execution worker binary
//!
//! Warms the sandbox pools, reads one JSON job from stdin, judges it and
//! prints the outcome list. Queue transport and HTTP live in the judge
//! services that embed this crate as a library.

use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

use judgelet::config::EngineConfig;
use judgelet::languages::Language;
use judgelet::orchestrator::Orchestrator;
use judgelet::outcome::TestCase;
use judgelet::pool::ContainerPool;
use judgelet::runtime::DockerRuntime;

#[derive(Debug, Deserialize)]
struct Job {
    code: String,
    language: Language,
    test_cases: Vec<TestCase>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("judgelet=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let config_path =
        std::env::var("JUDGELET_CONFIG").unwrap_or_else(|_| "./files/judgelet.toml".into());
    let config = EngineConfig::load(&config_path)?;
    info!("Loaded engine configuration from {}", config_path);

    let runtime = Arc::new(DockerRuntime::from_config(&config));
    let pool = Arc::new(ContainerPool::new(runtime, &config));

    pool.warm_up().await;
    for (language, stats) in pool.stats() {
        info!(%language, available = stats.available, "pool ready");
    }

    let orchestrator = Orchestrator::new(pool.clone(), &config);

    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("failed to read job from stdin")?;
    let job: Job = serde_json::from_str(&raw).context("failed to parse job")?;

    info!(language = %job.language, test_cases = job.test_cases.len(), "running job");
    let outcomes = orchestrator
        .run_all(&job.code, job.language, &job.test_cases)
        .await;

    println!("{}", serde_json::to_string_pretty(&outcomes)?);

    pool.shutdown().await;
    Ok(())
}
