use anyhow::Result;
use serde_json::json;
use stub_loader::{config::LoadTestConfig, telemetry, StubLoader};
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = LoadTestConfig::load()?;
    let scenario = cfg.scenario;

    let loader = StubLoader::connect(cfg).await?;
    loader.reset().await?;

    let report = loader.run_scenario(scenario).await?;
    if !report.is_clean() {
        warn!(
            failed = ?report.failed_indexes(),
            "some stubs were not registered; the load run will see 404s for them"
        );
    }

    let plan = loader.load_plan(scenario);
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "plan": plan, "registration": report }))?
    );

    if loader.is_embedded() {
        info!(base_url = %loader.base_url(), "embedded server ready; waiting for shutdown signal");
        telemetry::shutdown_signal().await;
    }

    loader.teardown().await?;
    warn!("shutdown complete");
    Ok(())
}
