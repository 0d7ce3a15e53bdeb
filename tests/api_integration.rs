//! Integration tests for the HTTP API.
//!
//! Each test spins up an Axum server on a random port backed by a fresh
//! store and drives the real REST contract with reqwest.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use axum::Router;

use ig_engage::api::{AppState, app_routes, build_router};
use ig_engage::config::{OptOutSource, ServerConfig, WebhookConfig};
use ig_engage::diagnostics::ConfiguredDatabase;
use ig_engage::engage::verify::{SIGNATURE_HEADER, sign_payload};
use ig_engage::store::{DocumentStore, LibSqlStore, MemoryStore};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Start the bare routes on a random port, return the base URL.
async fn start_server(store: Arc<dyn DocumentStore>, webhook: WebhookConfig) -> String {
    let configured = ConfiguredDatabase {
        url_set: true,
        name_set: false,
    };
    serve_app(app_routes(AppState::new(store, webhook, configured))).await
}

/// Start the production router (timeout + CORS) built from environment-style
/// settings, return the base URL.
async fn start_configured_server(allowed_origins: &str) -> String {
    let config = ServerConfig::from_lookup(|key| match key {
        "DATABASE_URL" => Some(":memory:".to_string()),
        "ALLOWED_ORIGINS" => Some(allowed_origins.to_string()),
        _ => None,
    })
    .unwrap();
    let store: Arc<dyn DocumentStore> = Arc::new(LibSqlStore::new_memory().await.unwrap());
    serve_app(build_router(AppState::from_config(store, &config), &config)).await
}

async fn serve_app(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}")
}

async fn libsql_server(webhook: WebhookConfig) -> String {
    let store: Arc<dyn DocumentStore> = Arc::new(LibSqlStore::new_memory().await.unwrap());
    start_server(store, webhook).await
}

async fn post_json(base: &str, path: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{base}{path}"))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn get_json(base: &str, path: &str) -> (u16, Value) {
    let resp = reqwest::get(format!("{base}{path}")).await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

/// Connect an account, create a flow with the given keywords, and assign it
/// to `media`. Returns the account id.
async fn seed_flow(base: &str, media: &str, keywords: &[&str]) -> String {
    let (_, connected) = post_json(base, "/connect", json!({ "account_name": "shop" })).await;
    let account_id = connected["accountId"].as_str().unwrap().to_string();

    let (status, flow) = post_json(
        base,
        "/flows",
        json!({ "accountId": account_id, "name": "Giveaway", "keywords": keywords }),
    )
    .await;
    assert_eq!(status, 200);
    let flow_id = flow["id"].as_str().unwrap();

    let (status, _) = post_json(
        base,
        "/assign",
        json!({ "accountId": account_id, "igMediaId": media, "flowId": flow_id }),
    )
    .await;
    assert_eq!(status, 200);
    account_id
}

// ── Basic routes ─────────────────────────────────────────────────────────

#[tokio::test]
async fn root_reports_running() {
    timeout(TEST_TIMEOUT, async {
        let base = libsql_server(WebhookConfig::default()).await;
        let (status, body) = get_json(&base, "/").await;
        assert_eq!(status, 200);
        assert_eq!(body["message"], "IG Automation Backend Running");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn schema_lists_collections_and_models() {
    timeout(TEST_TIMEOUT, async {
        let base = libsql_server(WebhookConfig::default()).await;
        let (status, body) = get_json(&base, "/schema").await;
        assert_eq!(status, 200);
        assert_eq!(
            body["collections"],
            json!(["account", "flow", "assignment", "iguser", "conversation", "event"])
        );
        let models = body["models"].as_object().unwrap();
        for name in ["Account", "Flow", "Assignment", "IGUser", "Conversation", "Event"] {
            assert!(models.contains_key(name), "missing schema for {name}");
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn diagnostics_reports_connected_store() {
    timeout(TEST_TIMEOUT, async {
        let base = libsql_server(WebhookConfig::default()).await;
        post_json(&base, "/connect", json!({ "account_name": "shop" })).await;

        let (status, body) = get_json(&base, "/test").await;
        assert_eq!(status, 200);
        assert_eq!(body["backend"], "✅ Running");
        assert_eq!(body["database"], "✅ Connected & Working");
        assert_eq!(body["connection_status"], "Connected");
        assert_eq!(body["database_url"], "✅ Set");
        assert_eq!(body["database_name"], "❌ Not Set");
        assert_eq!(body["collections"], json!(["account"]));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn diagnostics_survives_offline_store() {
    timeout(TEST_TIMEOUT, async {
        let store = Arc::new(MemoryStore::new());
        store.set_offline(true);
        let base = start_server(store, WebhookConfig::default()).await;

        let (status, body) = get_json(&base, "/test").await;
        assert_eq!(status, 200);
        assert_eq!(body["connection_status"], "Not Connected");
        assert!(body["database"].as_str().unwrap().starts_with("❌ Error:"));
    })
    .await
    .expect("test timed out");
}

// ── Flows ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn flows_are_listed_with_string_ids() {
    timeout(TEST_TIMEOUT, async {
        let base = libsql_server(WebhookConfig::default()).await;
        let account_id = seed_flow(&base, "m1", &["love"]).await;
        post_json(&base, "/flows", json!({ "accountId": "other", "name": "Other" })).await;

        let (status, all) = get_json(&base, "/flows").await;
        assert_eq!(status, 200);
        assert_eq!(all.as_array().unwrap().len(), 2);

        let (_, scoped) = get_json(&base, &format!("/flows?accountId={account_id}")).await;
        let scoped = scoped.as_array().unwrap();
        assert_eq!(scoped.len(), 1);
        assert!(scoped[0]["_id"].is_string());
        assert_eq!(scoped[0]["name"], "Giveaway");
        assert_eq!(scoped[0]["status"], "active");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn flow_without_name_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let base = libsql_server(WebhookConfig::default()).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/flows"))
            .json(&json!({ "accountId": "a1" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
        let body: Value = resp.json().await.unwrap();
        assert!(body["detail"].as_str().unwrap().contains("name"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn malformed_rest_bodies_use_detail_shape() {
    timeout(TEST_TIMEOUT, async {
        let base = libsql_server(WebhookConfig::default()).await;
        let (status, body) = post_json(&base, "/connect", json!({})).await;
        assert_eq!(status, 400);
        assert!(body["detail"].is_string());

        let (status, body) = post_json(&base, "/assign", json!({ "accountId": "a1" })).await;
        assert_eq!(status, 400);
        assert!(body["detail"].is_string());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn blank_account_scope_means_all_accounts() {
    timeout(TEST_TIMEOUT, async {
        let base = libsql_server(WebhookConfig::default()).await;
        post_json(&base, "/flows", json!({ "accountId": "a1", "name": "Promo" })).await;
        post_json(
            &base,
            "/webhook/dm",
            json!({ "accountId": "a1", "igUserId": "u1", "text": "STOP" }),
        )
        .await;

        let (status, flows) = get_json(&base, "/flows?accountId=").await;
        assert_eq!(status, 200);
        assert_eq!(flows.as_array().unwrap().len(), 1);

        let (status, summary) = get_json(&base, "/analytics/summary?accountId=").await;
        assert_eq!(status, 200);
        assert_eq!(summary["opt_outs"], 1);
    })
    .await
    .expect("test timed out");
}

// ── Webhook handshake ────────────────────────────────────────────────────

#[tokio::test]
async fn handshake_echoes_challenge() {
    timeout(TEST_TIMEOUT, async {
        let base = libsql_server(WebhookConfig::default()).await;
        let (status, body) = get_json(
            &base,
            "/webhook?hub.mode=subscribe&hub.verify_token=abc&hub.challenge=12345",
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body, json!(12345));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn handshake_without_mode_is_forbidden() {
    timeout(TEST_TIMEOUT, async {
        let base = libsql_server(WebhookConfig::default()).await;
        let (status, body) =
            get_json(&base, "/webhook?hub.verify_token=abc&hub.challenge=1").await;
        assert_eq!(status, 403);
        assert_eq!(body["detail"], "Verification failed");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn handshake_checks_configured_token() {
    timeout(TEST_TIMEOUT, async {
        let webhook = WebhookConfig {
            verify_token: Some(SecretString::from("expected")),
            ..WebhookConfig::default()
        };
        let base = libsql_server(webhook).await;

        let (status, _) = get_json(
            &base,
            "/webhook?hub.mode=subscribe&hub.verify_token=wrong&hub.challenge=7",
        )
        .await;
        assert_eq!(status, 403);

        let (status, body) = get_json(
            &base,
            "/webhook?hub.mode=subscribe&hub.verify_token=expected&hub.challenge=7",
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body, json!(7));
    })
    .await
    .expect("test timed out");
}

// ── Comment → DM flow ────────────────────────────────────────────────────

#[tokio::test]
async fn comment_on_unassigned_media_is_not_processed() {
    timeout(TEST_TIMEOUT, async {
        let base = libsql_server(WebhookConfig::default()).await;
        let (status, body) = post_json(
            &base,
            "/webhook/comment",
            json!({ "accountId": "a1", "igMediaId": "m1", "igUserId": "u1", "text": "hi" }),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({ "processed": false, "reason": "No flow assigned" }));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn keyword_comment_then_follow_delivers_asset() {
    timeout(TEST_TIMEOUT, async {
        let base = libsql_server(WebhookConfig::default()).await;
        let account_id = seed_flow(&base, "m1", &["love", "discount"]).await;

        let (_, miss) = post_json(
            &base,
            "/webhook/comment",
            json!({
                "accountId": account_id,
                "igMediaId": "m1",
                "igUserId": "u1",
                "text": "nice pic"
            }),
        )
        .await;
        assert_eq!(miss, json!({ "processed": false, "reason": "Keyword not matched" }));

        let (status, hit) = post_json(
            &base,
            "/webhook/comment",
            json!({
                "accountId": account_id,
                "igMediaId": "m1",
                "igUserId": "u1",
                "username": "fan",
                "text": "I love this!"
            }),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(
            hit,
            json!({ "processed": true, "action": "asked_follow", "next": "wait_for_dm_reply" })
        );

        let (_, dm) = post_json(
            &base,
            "/webhook/dm",
            json!({ "accountId": account_id, "igUserId": "u1", "text": "  I Followed " }),
        )
        .await;
        assert_eq!(dm, json!({ "delivered": true }));

        let (_, other) = post_json(
            &base,
            "/webhook/dm",
            json!({ "accountId": account_id, "igUserId": "u1", "text": "what?" }),
        )
        .await;
        assert_eq!(other["ack"], true);

        let (_, summary) =
            get_json(&base, &format!("/analytics/summary?accountId={account_id}")).await;
        assert_eq!(
            summary,
            json!({
                "comments_processed": 1,
                "assets_delivered": 1,
                "opt_outs": 0,
                "conversations": 2
            })
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn stop_opts_out() {
    timeout(TEST_TIMEOUT, async {
        let base = libsql_server(WebhookConfig::default()).await;
        let (status, body) = post_json(
            &base,
            "/webhook/dm",
            json!({ "accountId": "a1", "igUserId": "u1", "text": "STOP" }),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({ "opted_out": true }));

        let (_, summary) = get_json(&base, "/analytics/summary").await;
        assert_eq!(summary["opt_outs"], 1);
        assert_eq!(summary["conversations"], 0);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn account_opt_out_keywords_are_used_when_configured() {
    timeout(TEST_TIMEOUT, async {
        let webhook = WebhookConfig {
            opt_out_source: OptOutSource::Account,
            ..WebhookConfig::default()
        };
        let base = libsql_server(webhook).await;
        let (_, connected) = post_json(&base, "/connect", json!({ "account_name": "shop" })).await;
        let account_id = connected["accountId"].as_str().unwrap();

        let (_, body) = post_json(
            &base,
            "/webhook/dm",
            json!({ "accountId": account_id, "igUserId": "u1", "text": "unsubscribe" }),
        )
        .await;
        assert_eq!(body, json!({ "opted_out": true }));
    })
    .await
    .expect("test timed out");
}

// ── Signatures and failures ──────────────────────────────────────────────

#[tokio::test]
async fn signed_webhooks_require_valid_signature() {
    timeout(TEST_TIMEOUT, async {
        let webhook = WebhookConfig {
            app_secret: Some(SecretString::from("app-secret")),
            ..WebhookConfig::default()
        };
        let base = libsql_server(webhook).await;
        let client = reqwest::Client::new();
        let body = json!({ "accountId": "a1", "igUserId": "u1", "text": "STOP" }).to_string();

        let unsigned = client
            .post(format!("{base}/webhook/dm"))
            .header("content-type", "application/json")
            .body(body.clone())
            .send()
            .await
            .unwrap();
        assert_eq!(unsigned.status().as_u16(), 403);

        let signature = sign_payload("app-secret", body.as_bytes()).unwrap();
        let signed = client
            .post(format!("{base}/webhook/dm"))
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(signed.status().as_u16(), 200);
        assert_eq!(signed.json::<Value>().await.unwrap(), json!({ "opted_out": true }));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn malformed_webhook_payload_is_bad_request() {
    timeout(TEST_TIMEOUT, async {
        let base = libsql_server(WebhookConfig::default()).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/webhook/comment"))
            .header("content-type", "application/json")
            .body(r#"{"accountId": "a1"}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn store_failure_is_internal_error() {
    timeout(TEST_TIMEOUT, async {
        let store = Arc::new(MemoryStore::new());
        store.set_offline(true);
        let base = start_server(store, WebhookConfig::default()).await;

        let (status, body) = post_json(
            &base,
            "/webhook/comment",
            json!({ "accountId": "a1", "igMediaId": "m1", "igUserId": "u1", "text": "hi" }),
        )
        .await;
        assert_eq!(status, 500);
        assert!(body["detail"].is_string());
    })
    .await
    .expect("test timed out");
}

// ── Middleware ───────────────────────────────────────────────────────────

async fn allow_origin_for(base: &str, origin: &str) -> Option<String> {
    let resp = reqwest::Client::new()
        .get(format!("{base}/"))
        .header("origin", origin)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    resp.headers()
        .get("access-control-allow-origin")
        .map(|v| v.to_str().unwrap().to_string())
}

#[tokio::test]
async fn cors_echoes_only_allowed_origins() {
    timeout(TEST_TIMEOUT, async {
        let base = start_configured_server("https://a.example").await;
        assert_eq!(
            allow_origin_for(&base, "https://a.example").await.as_deref(),
            Some("https://a.example")
        );
        assert_eq!(allow_origin_for(&base, "https://b.example").await, None);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn cors_wildcard_allows_any_origin() {
    timeout(TEST_TIMEOUT, async {
        let base = start_configured_server("*").await;
        assert_eq!(
            allow_origin_for(&base, "https://b.example").await.as_deref(),
            Some("*")
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn no_cors_headers_without_allowed_origins() {
    timeout(TEST_TIMEOUT, async {
        let base = start_configured_server("").await;
        assert_eq!(allow_origin_for(&base, "https://a.example").await, None);

        let (status, body) = get_json(&base, "/test").await;
        assert_eq!(status, 200);
        assert_eq!(body["database_url"], "✅ Set");
    })
    .await
    .expect("test timed out");
}
