//! Remote mode against a stand-in admin API

use serde_json::json;
use std::time::Duration;
use stub_loader::error::LoaderError;
use stub_loader::scenario::{Scenario, CUSTOMER_ACK};
use stub_loader::stub::DelayDistribution;
use stub_loader::target::{RemoteTarget, StubTarget};
use stub_loader::{LoadTestConfig, StubLoader};
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn remote_for(server: &MockServer) -> RemoteTarget {
    let address = server.address();
    RemoteTarget::new(
        "http",
        &address.ip().to_string(),
        address.port(),
        Duration::from_secs(5),
    )
    .unwrap()
}

#[tokio::test]
async fn test_register_posts_mapping_json() {
    let admin = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/__admin/mappings"))
        .and(body_partial_json(json!({
            "request": { "method": "POST", "url": "/webhooks/customer/7" },
            "response": {
                "status": 200,
                "body": CUSTOMER_ACK,
                "headers": { "Content-Type": "application/json" }
            },
            "persistent": false
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&admin)
        .await;

    let target = remote_for(&admin);
    target
        .register(&Scenario::OnlyPost1000.rule(7))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_reset_and_global_delay_use_admin_endpoints() {
    let admin = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/__admin/mappings/reset"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&admin)
        .await;
    Mock::given(method("POST"))
        .and(path("/__admin/settings"))
        .and(body_json(json!({
            "delayDistribution": { "type": "uniform", "lower": 100, "upper": 2000 }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&admin)
        .await;

    let target = remote_for(&admin);
    target.reset().await.unwrap();
    target
        .set_global_random_delay(DelayDistribution::uniform(2000, 100))
        .await
        .unwrap();
    target.stop().await.unwrap();
}

#[tokio::test]
async fn test_admin_error_status_is_surfaced() {
    let admin = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/__admin/mappings"))
        .respond_with(ResponseTemplate::new(500).set_body_string("mapping store full"))
        .mount(&admin)
        .await;

    let err = remote_for(&admin)
        .register(&Scenario::ManyStubGet.rule(1))
        .await
        .unwrap_err();
    match err {
        LoaderError::AdminStatus { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "mapping store full");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_remote_loader_registers_catch_all_and_rules() {
    let admin = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/__admin/mappings"))
        .and(body_partial_json(json!({
            "request": { "method": "ANY" },
            "response": { "status": 404 },
            "priority": 10
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&admin)
        .await;
    Mock::given(method("POST"))
        .and(path("/__admin/mappings"))
        .and(body_partial_json(json!({ "request": { "method": "GET" } })))
        .respond_with(ResponseTemplate::new(201))
        .expect(100)
        .mount(&admin)
        .await;
    Mock::given(method("POST"))
        .and(path("/__admin/mappings/reset"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&admin)
        .await;

    let address = admin.address();
    let config = LoadTestConfig {
        host: Some(address.ip().to_string()),
        port: address.port(),
        ..LoadTestConfig::default()
    };
    let loader = StubLoader::connect(config).await.unwrap();
    assert!(!loader.is_embedded());
    assert_eq!(
        loader.base_url(),
        format!("http://{}:{}/", address.ip(), address.port())
    );

    loader.reset().await.unwrap();
    let report = loader.run_scenario(Scenario::GetLargeStub).await.unwrap();
    assert_eq!(report.completed, 100);
    assert!(report.is_clean());
    loader.teardown().await.unwrap();
}
