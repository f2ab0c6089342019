//! Load Testing Suite for the stub loader
//!
//! Full-size registration runs against the embedded server, plus a short
//! driver that exercises a populated server the way the external load
//! tool would:
//! - Thousands of stubs registered through the worker pool
//! - Many concurrent clients hitting registered paths
//! - Global random delay applied to every response
//!
//! Key Performance Requirements:
//! - 6000 GET stubs register well inside the scenario deadline
//! - Registered paths keep answering 200 under 50 concurrent clients
//! - Unregistered paths fall through to the catch-all 404

use rand::seq::SliceRandom;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

use stub_loader::scenario::{Scenario, DEFAULT_STUB_COUNT};
use stub_loader::stub::HttpMethod;
use stub_loader::{LoadTestConfig, StubLoader};

async fn populated(scenario: Scenario, stub_count: usize) -> StubLoader {
    let config = LoadTestConfig {
        stub_count,
        scenario,
        journal_entries: 0,
        ..LoadTestConfig::default()
    };
    let loader = StubLoader::connect(config).await.expect("embedded server");
    loader.reset().await.expect("reset");

    let start = Instant::now();
    let report = loader.run_scenario(scenario).await.expect("scenario setup");
    println!(
        "{scenario}: registered {}/{} stubs in {:?}",
        report.completed,
        report.submitted,
        start.elapsed()
    );
    assert!(report.is_clean(), "failures: {:?}", report.failures);
    loader
}

/// Test: Full-size many-stub-get registration
///
/// Registers the default 6000 GET stubs plus the catch-all and samples a
/// few of them.
#[tokio::test(flavor = "multi_thread")]
#[ignore] // Ignore by default as this is a slow test
async fn test_many_stub_get_full_size() {
    let loader = populated(Scenario::ManyStubGet, DEFAULT_STUB_COUNT).await;
    let client = reqwest::Client::new();

    for index in [1, 2999, DEFAULT_STUB_COUNT] {
        let resp = client
            .get(format!("{}load-test/{index}", loader.base_url()))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "stub {index} should be registered");
    }
    let resp = client
        .get(format!("{}load-test/{}", loader.base_url(), DEFAULT_STUB_COUNT + 1))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    loader.teardown().await.unwrap();
}

/// Test: Concurrent clients against a populated server
///
/// 50 clients each issue 40 GETs to random registered paths, similar to
/// the external driver at a steady rate.
#[tokio::test(flavor = "multi_thread")]
#[ignore] // Ignore by default as this is a slow test
async fn test_concurrent_clients_against_populated_server() {
    let loader = populated(Scenario::ManyStubGet, 1000).await;
    let plan = loader.load_plan(Scenario::ManyStubGet);
    assert_eq!(plan.targets.len(), 1000);

    let client = reqwest::Client::new();
    let mut clients = JoinSet::new();
    for _ in 0..50 {
        let client = client.clone();
        let urls: Vec<String> = plan
            .targets
            .choose_multiple(&mut rand::thread_rng(), 40)
            .map(|t| format!("{}{}", plan.base_url, t.path.trim_start_matches('/')))
            .collect();
        clients.spawn(async move {
            let mut slowest = Duration::ZERO;
            for url in urls {
                let start = Instant::now();
                let resp = client.get(&url).send().await.expect("request");
                assert_eq!(resp.status(), 200, "{url}");
                resp.bytes().await.expect("body");
                slowest = slowest.max(start.elapsed());
            }
            slowest
        });
    }

    let mut worst = Duration::ZERO;
    while let Some(result) = clients.join_next().await {
        worst = worst.max(result.expect("client should not panic"));
    }
    println!("slowest response: {worst:?}");
    assert!(worst < Duration::from_secs(5), "responses too slow: {worst:?}");

    loader.teardown().await.unwrap();
}

/// Test: Webhook acknowledgements under concurrent POSTs
#[tokio::test(flavor = "multi_thread")]
#[ignore] // Ignore by default as this is a slow test
async fn test_only_post_under_concurrent_posts() {
    let loader = populated(Scenario::OnlyPost1000, DEFAULT_STUB_COUNT).await;
    let plan = loader.load_plan(Scenario::OnlyPost1000);
    assert!(plan.targets.iter().all(|t| t.method == HttpMethod::Post));

    let client = reqwest::Client::new();
    let mut posts = JoinSet::new();
    for target in plan.targets.iter().step_by(5) {
        let client = client.clone();
        let url = format!("{}{}", plan.base_url, target.path.trim_start_matches('/'));
        posts.spawn(async move { client.post(url).send().await.map(|r| r.status()) });
    }
    while let Some(result) = posts.join_next().await {
        let status = result.expect("task").expect("request");
        assert_eq!(status, 200);
    }

    loader.teardown().await.unwrap();
}

/// Test: Global random delay in the mixed scenario
///
/// Every response is held back by 100-2000 ms.
#[tokio::test(flavor = "multi_thread")]
#[ignore] // Ignore by default as this is a slow test
async fn test_mixed_scenario_applies_global_delay() {
    let loader = populated(Scenario::Mixed100, DEFAULT_STUB_COUNT).await;
    let client = reqwest::Client::new();

    let mut requests = JoinSet::new();
    for index in 1..=10 {
        let client = client.clone();
        let url = format!("{}load-test/{index}", loader.base_url());
        requests.spawn(async move {
            let start = Instant::now();
            let resp = client
                .get(url)
                .header("Accept", "text/plain")
                .send()
                .await
                .expect("request");
            (resp.status(), start.elapsed())
        });
    }
    while let Some(result) = requests.join_next().await {
        let (status, elapsed) = result.expect("task");
        assert_eq!(status, 200);
        assert!(elapsed >= Duration::from_millis(100), "not delayed: {elapsed:?}");
        assert!(elapsed < Duration::from_secs(5), "delayed too long: {elapsed:?}");
    }

    loader.teardown().await.unwrap();
}
