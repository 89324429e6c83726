//! Fetcher, breaker and fan-out behavior against a local mock server.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use arbiter_core::ProviderOutcome;
use arbiter_providers::{
    fan_out, AuthStyle, BreakerPolicy, FanOutPlan, Fetcher, ProviderSpec, QueryParams, RetryPolicy,
};
use arbiter_core::Tier;

fn fast_breaker() -> BreakerPolicy {
    BreakerPolicy {
        failure_threshold: 3,
        cooldown: Duration::from_millis(200),
    }
}

fn quick_retry() -> RetryPolicy {
    RetryPolicy {
        retries: 2,
        initial_delay: Duration::from_millis(5),
        factor: 2,
    }
}

#[tokio::test]
async fn retries_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let fetcher = Fetcher::with_policy(fast_breaker());
    let value = fetcher
        .fetch_json(
            &format!("{}/data", server.uri()),
            &HashMap::new(),
            &quick_retry(),
        )
        .await
        .expect("third attempt should succeed");

    assert_eq!(value["ok"], json!(true));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn breaker_opens_after_threshold_and_skips_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let fetcher = Fetcher::with_policy(fast_breaker());
    let url = format!("{}/always-bad", server.uri());

    for _ in 0..3 {
        let err = fetcher
            .fetch_json(&url, &HashMap::new(), &RetryPolicy::none())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            arbiter_providers::ProviderError::ApiError { status: 500, .. }
        ));
    }

    // Fourth call: rejected by the breaker, no request on the wire.
    let before = server.received_requests().await.unwrap().len();
    let err = fetcher
        .fetch_json(&url, &HashMap::new(), &RetryPolicy::none())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        arbiter_providers::ProviderError::CircuitOpen { .. }
    ));
    assert_eq!(server.received_requests().await.unwrap().len(), before);
}

#[tokio::test]
async fn breaker_probe_after_cooldown_resets_on_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": 1})))
        .mount(&server)
        .await;

    let fetcher = Fetcher::with_policy(fast_breaker());
    let url = format!("{}/recovers", server.uri());

    for _ in 0..3 {
        let _ = fetcher
            .fetch_json(&url, &HashMap::new(), &RetryPolicy::none())
            .await;
    }
    assert!(fetcher.breaker_for(&url).unwrap().is_open());

    tokio::time::sleep(Duration::from_millis(250)).await;

    // Probe is allowed and succeeds; failure count starts over.
    let value = fetcher
        .fetch_json(&url, &HashMap::new(), &RetryPolicy::none())
        .await
        .expect("probe should be attempted after cooldown");
    assert_eq!(value["ok"], json!(1));
    assert_eq!(fetcher.breaker_for(&url).unwrap().failures(), 0);
}

#[tokio::test]
async fn bearer_auth_header_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("Authorization", "Bearer sekrit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"authed": true})))
        .mount(&server)
        .await;

    let spec = ProviderSpec {
        key: "TEST",
        name: "Test Provider",
        tier: Tier::Official,
        base_url_env: "ARBITER_TEST_UNUSED_BASE",
        api_key_env: None,
        path: "/stats",
        auth: AuthStyle::Bearer,
        retry: None,
    };

    let fetcher = Fetcher::with_policy(fast_breaker());
    let headers = spec.build_headers(Some("sekrit"));
    let value = fetcher
        .fetch_json(
            &format!("{}/stats", server.uri()),
            &headers,
            &RetryPolicy::none(),
        )
        .await
        .unwrap();
    assert_eq!(value["authed"], json!(true));
}

#[tokio::test]
async fn fan_out_skips_unconfigured_and_fetches_configured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/events"))
        .and(query_param("date", "2025-01-15"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"events": []})))
        .mount(&server)
        .await;

    std::env::set_var("ARBITER_TEST_FANOUT_BASE_URL", server.uri());

    let specs = vec![
        ProviderSpec {
            key: "CONFIGURED",
            name: "Configured",
            tier: Tier::Industry,
            base_url_env: "ARBITER_TEST_FANOUT_BASE_URL",
            api_key_env: None,
            path: "/events",
            auth: AuthStyle::Bearer,
            retry: Some(RetryPolicy::none()),
        },
        ProviderSpec {
            key: "MISSING",
            name: "Missing",
            tier: Tier::Aggregator,
            base_url_env: "ARBITER_TEST_FANOUT_NEVER_SET",
            api_key_env: None,
            path: "/events",
            auth: AuthStyle::Bearer,
            retry: None,
        },
    ];

    let fetcher = Fetcher::with_policy(fast_breaker());
    let outcomes = fan_out(
        &fetcher,
        FanOutPlan {
            specs: &specs,
            params: QueryParams {
                date: Some("2025-01-15".into()),
                ..Default::default()
            },
            concurrency: 3,
            deadline: None,
        },
    )
    .await;

    assert_eq!(outcomes.len(), 2);

    let success = outcomes
        .iter()
        .find(|o| o.provider() == "CONFIGURED")
        .unwrap();
    assert!(matches!(success, ProviderOutcome::Success(_)));
    if let ProviderOutcome::Success(resp) = success {
        assert_eq!(resp.payload["events"], json!([]));
        assert_eq!(resp.tier, Tier::Industry);
    }

    let skipped = outcomes.iter().find(|o| o.provider() == "MISSING").unwrap();
    assert!(matches!(skipped, ProviderOutcome::Skipped { .. }));
}
