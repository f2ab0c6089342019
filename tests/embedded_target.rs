//! End-to-end checks against the in-process mock server

use reqwest::StatusCode;
use stub_loader::error::LoaderError;
use stub_loader::scenario::{
    posted_xml, Scenario, CUSTOMER_ACK, JSON_FOR_JSON_PATH_MATCH, POSTED_JSON,
};
use stub_loader::stub::{HttpMethod, RequestPattern, ResponseDefinition, StringPredicate};
use stub_loader::target::{EmbeddedOptions, EmbeddedTarget, StubTarget};
use stub_loader::{LoadTestConfig, StubLoader};

fn embedded_config(stub_count: usize) -> LoadTestConfig {
    LoadTestConfig {
        stub_count,
        ..LoadTestConfig::default()
    }
}

#[tokio::test]
async fn test_embedded_loader_reports_localhost_and_bound_port() {
    let loader = StubLoader::connect(embedded_config(10)).await.unwrap();
    assert!(loader.is_embedded());
    assert_eq!(loader.scheme(), "http");
    assert_eq!(loader.host(), "localhost");
    assert_ne!(loader.port(), 0);
    assert_eq!(
        loader.base_url(),
        format!("http://localhost:{}/", loader.port())
    );
    loader.teardown().await.unwrap();
}

#[tokio::test]
async fn test_only_post_serves_customer_acknowledgement() {
    let loader = StubLoader::connect(embedded_config(10)).await.unwrap();
    loader.reset().await.unwrap();
    let report = loader.run_scenario(Scenario::OnlyPost1000).await.unwrap();
    assert_eq!(report.completed, 1000);

    let resp = reqwest::Client::new()
        .post(format!("{}webhooks/customer/500", loader.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );
    assert_eq!(resp.text().await.unwrap(), CUSTOMER_ACK);

    loader.teardown().await.unwrap();
}

#[tokio::test]
async fn test_many_get_serves_stubs_and_falls_back_to_404() {
    let loader = StubLoader::connect(embedded_config(25)).await.unwrap();
    loader.reset().await.unwrap();
    let report = loader.run_scenario(Scenario::ManyStubGet).await.unwrap();
    assert!(report.is_clean());

    let client = reqwest::Client::new();
    let body = client
        .get(format!("{}load-test/25", loader.base_url()))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!((2000..5000).contains(&body.len()));

    let missing = client
        .get(format!("{}not-a-stub", loader.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    loader.teardown().await.unwrap();
}

#[tokio::test]
async fn test_scenario_after_reset_leaves_only_its_own_rules() {
    let loader = StubLoader::connect(embedded_config(10)).await.unwrap();
    loader.reset().await.unwrap();
    loader.run_scenario(Scenario::ManyStubGet).await.unwrap();
    loader.reset().await.unwrap();
    loader.run_scenario(Scenario::OnlyPost1000).await.unwrap();

    let client = reqwest::Client::new();
    let stale = client
        .get(format!("{}load-test/3", loader.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(stale.status(), StatusCode::NOT_FOUND);
    let fresh = client
        .post(format!("{}webhooks/customer/3", loader.base_url()))
        .send()
        .await
        .unwrap();
    assert_eq!(fresh.status(), StatusCode::OK);

    loader.teardown().await.unwrap();
}

#[tokio::test]
async fn test_reset_drops_registered_stubs() {
    let target = EmbeddedTarget::start(&EmbeddedOptions::default())
        .await
        .unwrap();
    target
        .register(&RequestPattern::get("/ping").will_return(ResponseDefinition::ok_with_body("pong")))
        .await
        .unwrap();

    let url = format!("{}ping", target.base_url());
    assert_eq!(reqwest::get(&url).await.unwrap().status(), StatusCode::OK);

    target.reset().await.unwrap();
    assert_eq!(
        reqwest::get(&url).await.unwrap().status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_teardown_is_idempotent_and_final() {
    let target = EmbeddedTarget::start(&EmbeddedOptions {
        journal_entries: 0,
    })
    .await
    .unwrap();
    target.stop().await.unwrap();
    target.stop().await.unwrap();

    let err = target
        .register(&RequestPattern::get("/late").will_return(ResponseDefinition::ok()))
        .await
        .unwrap_err();
    assert!(matches!(err, LoaderError::TargetStopped));
}

#[tokio::test]
async fn test_invalid_regex_is_rejected_at_registration() {
    let target = EmbeddedTarget::start(&EmbeddedOptions::default())
        .await
        .unwrap();
    let rule = RequestPattern::get("/bad")
        .with_header("Accept", StringPredicate::matching("(unclosed"))
        .will_return(ResponseDefinition::ok());
    let err = target.register(&rule).await.unwrap_err();
    assert!(matches!(err, LoaderError::InvalidRegex { .. }));
    target.stop().await.unwrap();
}

/// Mixed rules registered one by one, so responses skip the global delay
async fn mixed_target(indexes: &[usize]) -> EmbeddedTarget {
    let target = EmbeddedTarget::start(&EmbeddedOptions::default())
        .await
        .unwrap();
    for &index in indexes {
        target.register(&Scenario::Mixed100.rule(index)).await.unwrap();
    }
    target
}

#[tokio::test]
async fn test_mixed_accept_header_and_body_matchers() {
    // 7: accept GET, 51: JSON equality, 61: JSONPath, 71: XML equality,
    // 73: XPath, 83: text regex
    let target = mixed_target(&[7, 51, 61, 71, 73, 83]).await;
    let base = target.base_url();
    let client = reqwest::Client::new();

    let accepted = client
        .get(format!("{base}load-test/7"))
        .header("Accept", "text/plain, */*")
        .send()
        .await
        .unwrap();
    assert_eq!(accepted.status(), StatusCode::OK);
    let rejected = client
        .get(format!("{base}load-test/7"))
        .header("Accept", "application/json")
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::NOT_FOUND);

    let json = client
        .post(format!("{base}load-test/json"))
        .header("Accept", "text/plain")
        .header("Content-Type", "application/json")
        .body(POSTED_JSON.replace("\n", " "))
        .send()
        .await
        .unwrap();
    assert_eq!(json.status(), StatusCode::OK);
    assert_eq!(json.text().await.unwrap().len(), 200);

    let json_path = client
        .post(format!("{base}load-test/jsonpath"))
        .header("Content-Type", "application/json")
        .body(JSON_FOR_JSON_PATH_MATCH)
        .send()
        .await
        .unwrap();
    assert_eq!(json_path.status(), StatusCode::CREATED);

    let xml = client
        .post(format!("{base}load-test/xml"))
        .header("Content-Type", "application/xml")
        .body(posted_xml(1))
        .send()
        .await
        .unwrap();
    assert_eq!(xml.status(), StatusCode::OK);
    let wrong_id = client
        .post(format!("{base}load-test/xml"))
        .header("Content-Type", "application/xml")
        .body(posted_xml(2))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_id.status(), StatusCode::NOT_FOUND);

    let xpath = client
        .post(format!("{base}load-test/xpath"))
        .header("Content-Type", "text/xml; charset=utf-8")
        .body(posted_xml(99))
        .send()
        .await
        .unwrap();
    assert_eq!(xpath.status(), StatusCode::OK);

    let text = client
        .post(format!("{base}load-test/text"))
        .header("Content-Type", "text/plain")
        .body("order 12345 shipped")
        .send()
        .await
        .unwrap();
    assert_eq!(text.status(), StatusCode::OK);

    target.stop().await.unwrap();
}

#[tokio::test]
async fn test_mixed_templated_response_is_rendered() {
    let target = mixed_target(&[93]).await;
    let resp = reqwest::Client::new()
        .put(format!("{}load-test/templated", target.base_url()))
        .header("MyDate", "2024-03-01T10:00:00Z")
        .body(JSON_FOR_JSON_PATH_MATCH)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.starts_with("Templated response"));
    assert!(body.contains("2024-03-01T21:00:00+11:00"));
    assert!(body.contains("innermost"));
    assert!(!body.contains("{{"));
    target.stop().await.unwrap();
}

#[tokio::test]
async fn test_request_journal_keeps_only_the_configured_number() {
    let target = EmbeddedTarget::start(&EmbeddedOptions { journal_entries: 200 })
        .await
        .unwrap();
    target
        .register(
            &RequestPattern::url_matching(HttpMethod::Get, r"/p\?n=\d+")
                .will_return(ResponseDefinition::ok()),
        )
        .await
        .unwrap();

    let client = reqwest::Client::new();
    for n in 0..500 {
        let resp = client
            .get(format!("{}p?n={n}", target.base_url()))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let journal = target.journal();
    assert_eq!(journal.len(), 200);
    assert_eq!(journal.first().unwrap().url, "/p?n=300");
    assert_eq!(journal.last().unwrap().url, "/p?n=499");
    target.stop().await.unwrap();
}

#[tokio::test]
async fn test_request_journal_survives_reset_and_can_be_disabled() {
    let target = EmbeddedTarget::start(&EmbeddedOptions::default())
        .await
        .unwrap();
    target.reset().await.unwrap();
    reqwest::get(format!("{}after-reset", target.base_url()))
        .await
        .unwrap();
    assert_eq!(target.journal().len(), 1);
    assert_eq!(target.journal()[0].method, "GET");
    target.stop().await.unwrap();

    let silent = EmbeddedTarget::start(&EmbeddedOptions { journal_entries: 0 })
        .await
        .unwrap();
    reqwest::get(format!("{}anything", silent.base_url()))
        .await
        .unwrap();
    assert!(silent.journal().is_empty());
    silent.stop().await.unwrap();
}
