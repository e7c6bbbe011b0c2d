#![allow(clippy::unwrap_used)]
// End-to-end tests for `Hub` against wiremock vendor clouds.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pethub_core::{
    Action, AuthCause, CloudPetsConfig, CoreError, Credential, CredentialStore, Hub, HubConfig,
    MemoryStatsCache, Metric, MetricValue, PetKitConfig, PlanRecord, RetryPolicy, SessionStatus,
    StatsSnapshot, StatsSource, Vendor,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn base_config() -> HubConfig {
    HubConfig {
        timeout: Duration::from_millis(300),
        retry: RetryPolicy {
            transport_attempts: 2,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(20),
        },
        ..HubConfig::default()
    }
}

fn petkit_hub(server: &MockServer, cache: Arc<MemoryStatsCache>) -> Hub {
    let config = HubConfig {
        petkit: Some(PetKitConfig {
            base_url: format!("{}/", server.uri()),
            ..PetKitConfig::default()
        }),
        ..base_config()
    };
    let credentials = CredentialStore::new([Credential::new(
        Vendor::PetKit,
        "cat@example.com",
        SecretString::from("hunter2".to_string()),
    )]);
    Hub::new(config, credentials, cache).unwrap()
}

fn cloudpets_hub(server: &MockServer) -> Hub {
    cloudpets_hub_with_cache(server, Arc::new(MemoryStatsCache::new()))
}

fn cloudpets_hub_with_cache(server: &MockServer, cache: Arc<MemoryStatsCache>) -> Hub {
    let config = HubConfig {
        cloudpets: Some(CloudPetsConfig {
            base_url: server.uri(),
            family_id: "572807".into(),
        }),
        ..base_config()
    };
    let credentials = CredentialStore::new([Credential::new(
        Vendor::CloudPets,
        "+86-17700000000",
        SecretString::from("pw".to_string()),
    )]);
    Hub::new(config, credentials, cache).unwrap()
}

async fn mount_petkit_login(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/user/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "result": { "session": { "id": "sess-1", "expiresIn": 3600 } }
                }))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(expected)
        .mount(server)
        .await;
}

fn roster() -> serde_json::Value {
    json!({
        "result": { "devices": [
            { "type": "T4", "data": { "id": 100_200, "name": "Upstairs" } }
        ] }
    })
}

async fn mount_roster(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/discovery/device_roster"))
        .respond_with(ResponseTemplate::new(200).set_body_json(roster()))
        .expect(expected)
        .mount(server)
        .await;
}

fn expired() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "error": { "code": 5, "msg": "Session expired" }
    }))
}

// ── Session tests ───────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_requests_share_one_login() {
    let server = MockServer::start().await;
    mount_petkit_login(&server, 1).await;
    mount_roster(&server, 5).await;
    let hub = petkit_hub(&server, Arc::new(MemoryStatsCache::new()));

    let results = join_all((0..5).map(|_| hub.list_devices(Vendor::PetKit))).await;

    for result in results {
        assert_eq!(result.unwrap().len(), 1);
    }
    assert_eq!(
        hub.session_status(Vendor::PetKit).await,
        Some(SessionStatus::Authenticated)
    );
}

#[tokio::test]
async fn expired_session_is_renewed_once() {
    let server = MockServer::start().await;
    mount_petkit_login(&server, 2).await;
    Mock::given(method("POST"))
        .and(path("/discovery/device_roster"))
        .respond_with(expired())
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_roster(&server, 1).await;
    let hub = petkit_hub(&server, Arc::new(MemoryStatsCache::new()));

    let devices = hub.list_devices(Vendor::PetKit).await.unwrap();
    assert_eq!(devices[0].id, "100200");
}

#[tokio::test]
async fn repeated_auth_failure_surfaces_auth_error() {
    let server = MockServer::start().await;
    mount_petkit_login(&server, 2).await;
    Mock::given(method("POST"))
        .and(path("/discovery/device_roster"))
        .respond_with(expired())
        .expect(2)
        .mount(&server)
        .await;
    let hub = petkit_hub(&server, Arc::new(MemoryStatsCache::new()));

    let err = hub.list_devices(Vendor::PetKit).await.unwrap_err();
    assert!(
        matches!(
            err,
            CoreError::Auth {
                cause: AuthCause::Repeated,
                ..
            }
        ),
        "got {err:?}"
    );
}

#[tokio::test]
async fn bad_credentials_are_a_reconfigure_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": { "code": 122, "msg": "wrong password" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_roster(&server, 0).await;
    let hub = petkit_hub(&server, Arc::new(MemoryStatsCache::new()));

    let err = hub.list_devices(Vendor::PetKit).await.unwrap_err();
    assert_eq!(err.remedy(), pethub_core::Remedy::Reconfigure);
    assert_eq!(
        hub.session_status(Vendor::PetKit).await,
        Some(SessionStatus::Unauthenticated)
    );
}

// ── Dispatch tests ──────────────────────────────────────────────────

#[tokio::test]
async fn rate_limit_is_not_retried() {
    let server = MockServer::start().await;
    mount_petkit_login(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/discovery/device_roster"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .expect(1)
        .mount(&server)
        .await;
    let hub = petkit_hub(&server, Arc::new(MemoryStatsCache::new()));

    let err = hub.list_devices(Vendor::PetKit).await.unwrap_err();
    assert!(matches!(err, CoreError::RateLimited { .. }), "got {err:?}");
    assert_eq!(err.retry_after_secs(), Some(30));
}

#[tokio::test]
async fn timeouts_exhaust_transport_budget() {
    let server = MockServer::start().await;
    mount_petkit_login(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/discovery/device_roster"))
        .respond_with(ResponseTemplate::new(200).set_body_json(roster()).set_delay(Duration::from_secs(2)))
        .expect(2)
        .mount(&server)
        .await;
    let hub = petkit_hub(&server, Arc::new(MemoryStatsCache::new()));

    let err = hub.list_devices(Vendor::PetKit).await.unwrap_err();
    assert!(
        matches!(err, CoreError::VendorUnavailable { attempts: 2, .. }),
        "got {err:?}"
    );
}

// ── Action tests ────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_device_triggers_one_refresh() {
    let server = MockServer::start().await;
    mount_petkit_login(&server, 1).await;
    mount_roster(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/t4/controlDevice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "success" })))
        .expect(1)
        .mount(&server)
        .await;
    let hub = petkit_hub(&server, Arc::new(MemoryStatsCache::new()));

    let ack = hub
        .trigger_action(Vendor::PetKit, "100200", Action::Clean)
        .await
        .unwrap();
    assert_eq!(ack.device_id, "100200");
    assert_eq!(ack.action, Action::Clean);
}

#[tokio::test]
async fn device_still_unknown_after_refresh_is_validation_error() {
    let server = MockServer::start().await;
    mount_petkit_login(&server, 1).await;
    mount_roster(&server, 1).await;
    let hub = petkit_hub(&server, Arc::new(MemoryStatsCache::new()));

    let err = hub
        .trigger_action(Vendor::PetKit, "999", Action::Clean)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }), "got {err:?}");
}

#[tokio::test]
async fn unsupported_action_makes_no_vendor_call() {
    let server = MockServer::start().await;
    mount_petkit_login(&server, 1).await;
    mount_roster(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/t4/controlDevice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "success" })))
        .expect(0)
        .mount(&server)
        .await;
    let hub = petkit_hub(&server, Arc::new(MemoryStatsCache::new()));

    hub.list_devices(Vendor::PetKit).await.unwrap();
    let err = hub
        .trigger_action(Vendor::PetKit, "100200", Action::Feed { portions: 1 })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }), "got {err:?}");
}

#[tokio::test]
async fn unsupported_action_on_fresh_hub_makes_no_request() {
    let server = MockServer::start().await;
    let hub = petkit_hub(&server, Arc::new(MemoryStatsCache::new()));

    let err = hub
        .trigger_action(Vendor::PetKit, "100200", Action::Feed { portions: 1 })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }), "got {err:?}");
    assert!(server.received_requests().await.unwrap().is_empty());
    assert_eq!(
        hub.session_status(Vendor::PetKit).await,
        Some(SessionStatus::Unauthenticated)
    );
}

#[tokio::test]
async fn vendor_refusal_is_not_reported_as_success() {
    let server = MockServer::start().await;
    mount_petkit_login(&server, 1).await;
    mount_roster(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/t4/controlDevice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "busy" })))
        .expect(1)
        .mount(&server)
        .await;
    let hub = petkit_hub(&server, Arc::new(MemoryStatsCache::new()));

    let err = hub
        .trigger_action(Vendor::PetKit, "100200", Action::Deodorize)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Rejected { .. }), "got {err:?}");
}

// ── Stats tests ─────────────────────────────────────────────────────

async fn mount_degraded_statistic(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/t4/statistic"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "avgTime": 80, "statisticInfo": [] }
        })))
        .mount(server)
        .await;
}

async fn mount_device_detail(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/t4/device_detail"))
        .and(body_string_contains("id=100200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "id": 100_200,
                "state": {
                    "sandPercent": 62,
                    "deodorantLeftDays": 11,
                    "usedTimes": 1408,
                    "boxFull": 0,
                    "sandLack": false,
                    "liquidLack": 1
                }
            }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn petkit_stats_report_consumables_and_lifetime_usage() {
    let server = MockServer::start().await;
    mount_petkit_login(&server, 1).await;
    mount_roster(&server, 1).await;
    mount_device_detail(&server).await;
    Mock::given(method("POST"))
        .and(path("/t4/statistic"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "times": 2, "avgTime": 80, "totalTime": 160, "statisticInfo": [] }
        })))
        .mount(&server)
        .await;
    let hub = petkit_hub(&server, Arc::new(MemoryStatsCache::new()));

    let snapshot = hub.fetch_stats(Vendor::PetKit, "100200").await.unwrap();

    assert_eq!(snapshot.source, StatsSource::VendorAuthoritative);
    assert!(!snapshot.stale);
    assert_eq!(snapshot.metrics[&Metric::TodayVisits], MetricValue::Count(2));
    assert_eq!(snapshot.metrics[&Metric::UsedTimes], MetricValue::Count(1408));
    assert_eq!(snapshot.metrics[&Metric::SandPercent], MetricValue::Percent(62));
    assert_eq!(snapshot.metrics[&Metric::DeodorantLeftDays], MetricValue::Days(11));
    assert_eq!(snapshot.metrics[&Metric::BoxFull], MetricValue::Flag(false));
    assert_eq!(snapshot.metrics[&Metric::LiquidLack], MetricValue::Flag(true));
}

#[tokio::test]
async fn degraded_stats_fall_back_to_cached_snapshot() {
    let server = MockServer::start().await;
    mount_petkit_login(&server, 1).await;
    mount_roster(&server, 1).await;
    mount_degraded_statistic(&server).await;
    mount_device_detail(&server).await;

    let cache = Arc::new(MemoryStatsCache::new());
    cache.store(StatsSnapshot {
        vendor: Vendor::PetKit,
        device_id: "100200".into(),
        metrics: [(Metric::TodayVisits, MetricValue::Count(3))].into_iter().collect(),
        source: StatsSource::VendorAuthoritative,
        stale: false,
        warnings: Vec::new(),
        as_of: Utc::now(),
    });
    let hub = petkit_hub(&server, Arc::clone(&cache));

    let snapshot = hub.fetch_stats(Vendor::PetKit, "100200").await.unwrap();

    assert_eq!(snapshot.source, StatsSource::LocalFallback);
    assert!(snapshot.stale);
    assert!(!snapshot.warnings.is_empty());
    assert_eq!(snapshot.metrics[&Metric::TodayVisits], MetricValue::Count(3));
    assert_eq!(snapshot.metrics[&Metric::AverageVisitSecs], MetricValue::Seconds(80));
    // The lifetime counter is present but never stands in for today's visits.
    assert_eq!(snapshot.metrics[&Metric::UsedTimes], MetricValue::Count(1408));
    assert_eq!(snapshot.warnings.len(), 1);
}

#[tokio::test]
async fn degraded_stats_without_cache_are_unavailable() {
    let server = MockServer::start().await;
    mount_petkit_login(&server, 1).await;
    mount_roster(&server, 1).await;
    mount_degraded_statistic(&server).await;
    let hub = petkit_hub(&server, Arc::new(MemoryStatsCache::new()));

    let err = hub.fetch_stats(Vendor::PetKit, "100200").await.unwrap_err();
    assert!(matches!(err, CoreError::VendorUnavailable { .. }), "got {err:?}");
}

// ── CloudPets tests ─────────────────────────────────────────────────

async fn mount_cloudpets_basics(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/app/terminal/user/login"))
        .and(body_string_contains("account=17700000000"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("authorization", "cp-token")
                .set_body_json(json!({ "code": 200 })),
        )
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/app/terminal/device/list"))
        .and(header("authorization", "cp-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "result": [ { "deviceId": 336_704, "deviceName": "Kitchen" } ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn cloudpets_feed_and_stats() {
    let server = MockServer::start().await;
    mount_cloudpets_basics(&server).await;
    Mock::given(method("POST"))
        .and(path("/app/terminal/feeder/manualFeed"))
        .and(body_string_contains("unit=2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 200 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/app/terminal/feeder/servingsToday"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 200, "result": 4 })))
        .mount(&server)
        .await;
    let hub = cloudpets_hub(&server);

    let ack = hub
        .trigger_action(Vendor::CloudPets, "336704", Action::Feed { portions: 2 })
        .await
        .unwrap();
    assert_eq!(ack.vendor, Vendor::CloudPets);

    let snapshot = hub.fetch_stats(Vendor::CloudPets, "336704").await.unwrap();
    assert_eq!(snapshot.source, StatsSource::VendorAuthoritative);
    assert!(!snapshot.stale);
    assert_eq!(snapshot.metrics[&Metric::ServingsToday], MetricValue::Count(4));
}

#[tokio::test]
async fn cloudpets_missing_servings_fall_back_to_cached_snapshot() {
    let server = MockServer::start().await;
    mount_cloudpets_basics(&server).await;
    Mock::given(method("POST"))
        .and(path("/app/terminal/feeder/servingsToday"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(MemoryStatsCache::new());
    cache.store(StatsSnapshot {
        vendor: Vendor::CloudPets,
        device_id: "336704".into(),
        metrics: [(Metric::ServingsToday, MetricValue::Count(2))].into_iter().collect(),
        source: StatsSource::VendorAuthoritative,
        stale: false,
        warnings: Vec::new(),
        as_of: Utc::now(),
    });
    let hub = cloudpets_hub_with_cache(&server, cache);

    let snapshot = hub.fetch_stats(Vendor::CloudPets, "336704").await.unwrap();

    assert_eq!(snapshot.source, StatsSource::LocalFallback);
    assert!(snapshot.stale);
    assert_eq!(snapshot.metrics[&Metric::ServingsToday], MetricValue::Count(2));
}

#[tokio::test]
async fn cloudpets_missing_servings_without_cache_are_unavailable() {
    let server = MockServer::start().await;
    mount_cloudpets_basics(&server).await;
    let hub = cloudpets_hub(&server);

    let err = hub.fetch_stats(Vendor::CloudPets, "336704").await.unwrap_err();
    assert!(matches!(err, CoreError::VendorUnavailable { .. }), "got {err:?}");
}

#[tokio::test]
async fn invalid_plan_is_rejected_before_any_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/app/terminal/feeder/feedPlan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 200 })))
        .expect(0)
        .mount(&server)
        .await;
    let hub = cloudpets_hub(&server);

    let plan = PlanRecord {
        id: None,
        hour: 25,
        minute: 0,
        serving: 1,
        enable: true,
        days_of_week: vec![],
        remark: None,
    };
    let err = hub.add_plan("336704", &plan).await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }), "got {err:?}");
}

#[tokio::test]
async fn feeding_plans_are_listed() {
    let server = MockServer::start().await;
    mount_cloudpets_basics(&server).await;
    Mock::given(method("GET"))
        .and(path("/app/terminal/feeder/planList/336704"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "result": { "list": [
                { "id": "9", "hour": "07", "minute": "30", "serving": 2, "enable": true, "daysOfWeek": "1,2,3" }
            ] }
        })))
        .mount(&server)
        .await;
    let hub = cloudpets_hub(&server);

    let plans = hub.list_plans("336704").await.unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].hour, 7);
    assert_eq!(plans[0].days_of_week, vec![1, 2, 3]);
}
