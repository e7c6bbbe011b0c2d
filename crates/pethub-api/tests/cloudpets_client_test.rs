#![allow(clippy::unwrap_used)]
// Integration tests for `CloudPetsClient` using wiremock.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pethub_api::{CloudPetsClient, Error, PlanRecord, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, CloudPetsClient) {
    let server = MockServer::start().await;
    let client = CloudPetsClient::new(&server.uri(), "572807", &TransportConfig::default()).unwrap();
    (server, client)
}

fn session() -> SecretString {
    SecretString::from("tok-1".to_string())
}

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_login_strips_country_prefix_and_reads_nested_token() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/app/terminal/user/login"))
        .and(body_string_contains("account=17700000000"))
        .and(body_string_contains("userType=1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "result": { "authorization": "fresh-token" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let secret = SecretString::from("pw".to_string());
    let grant = client.login("86-17700000000", &secret).await.unwrap();

    assert_eq!(grant.token.expose_secret(), "fresh-token");
    assert_eq!(grant.expires_in, None);
}

#[tokio::test]
async fn test_login_falls_back_to_header_token() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/app/terminal/user/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("authorization", "header-token")
                .set_body_json(json!({ "code": 200, "msg": "ok" })),
        )
        .mount(&server)
        .await;

    let secret = SecretString::from("pw".to_string());
    let grant = client.login("17700000000", &secret).await.unwrap();
    assert_eq!(grant.token.expose_secret(), "header-token");
}

#[tokio::test]
async fn test_login_without_token_fails() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/app/terminal/user/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 200 })))
        .mount(&server)
        .await;

    let secret = SecretString::from("pw".to_string());
    let result = client.login("17700000000", &secret).await;
    assert!(matches!(result, Err(Error::Authentication { .. })), "got {result:?}");
}

// ── Feeder tests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_requests_carry_family_and_token_headers() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/app/terminal/device/list"))
        .and(header("authorization", "tok-1"))
        .and(header("x-cp-familyid", "572807"))
        .and(header("platform", "Android"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "result": [ { "deviceId": 336_704, "deviceName": "Kitchen", "deviceType": 66 } ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let feeders = client.list_feeders(&session()).await.unwrap();
    assert_eq!(feeders.len(), 1);
    assert_eq!(feeders[0].device_id, "336704");
    assert_eq!(feeders[0].device_type.as_deref(), Some("66"));
}

#[tokio::test]
async fn test_body_code_401_is_expired_session() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/app/terminal/feeder/servingsToday"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "code": 401, "msg": "token invalid" })),
        )
        .mount(&server)
        .await;

    let err = client.servings_today(&session(), "336704").await.unwrap_err();
    assert!(err.is_auth_expired(), "got {err:?}");
}

#[tokio::test]
async fn test_manual_feed_rejection_code() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/app/terminal/feeder/manualFeed"))
        .and(body_string_contains("unit=3"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "code": 500, "msg": "feeder offline" })),
        )
        .mount(&server)
        .await;

    let result = client.manual_feed(&session(), "336704", 3).await;
    assert!(
        matches!(result, Err(Error::Vendor { code: 500, .. })),
        "got {result:?}"
    );
}

// ── Plan tests ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_plans_from_rows() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/app/terminal/feeder/planList/336704"))
        .and(query_param("deviceType", "66"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rows": [
                { "id": 1, "hour": 7, "minute": 30, "serving": 2, "enable": true, "daysOfWeek": [1, 2, 3, 4, 5] },
                { "id": 2, "hour": 19, "minute": 0, "serving": 1, "enable": false, "daysOfWeek": [6, 7] }
            ]
        })))
        .mount(&server)
        .await;

    let plans = client.list_plans(&session(), "336704").await.unwrap();
    assert_eq!(plans.len(), 2);
    assert_eq!(plans[1].id.as_deref(), Some("2"));
    assert!(!plans[1].enable);
}

#[tokio::test]
async fn test_update_plan_uses_put_form() {
    let (server, client) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/app/terminal/feeder/feedPlan"))
        .and(body_string_contains("id=42"))
        .and(body_string_contains("enable=false"))
        .and(body_string_contains("daysOfWeek=1%2C7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 200 })))
        .expect(1)
        .mount(&server)
        .await;

    let plan = PlanRecord {
        id: None,
        hour: 6,
        minute: 5,
        serving: 1,
        enable: false,
        days_of_week: vec![1, 7],
        remark: Some("weekend".into()),
    };
    client
        .update_plan(&session(), "336704", "42", &plan)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_plan_accepts_empty_body() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/app/terminal/feeder/plan/42"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.delete_plan(&session(), "42").await.unwrap();
}
