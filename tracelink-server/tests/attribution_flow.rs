//! End-to-end attribution flow over a real listener

mod common;

use std::net::{IpAddr, Ipv4Addr};

use reqwest::StatusCode;
use serde_json::{Value, json};
use tracelink_server::AccessConfig;

#[tokio::test]
async fn click_then_conversion_is_attributed_by_peer_ip() {
    let (_state, addr) = common::create_test_server().await;
    let client = reqwest::Client::new();
    let base = format!("http://{addr}");

    // Peer address of the test client is loopback, which the click inherits
    let click: Value = client
        .post(format!("{base}/api/clicks"))
        .json(&json!({ "linkId": "spring-sale" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(click["success"], true);

    let submitted: Value = client
        .post(format!("{base}/api/attributions"))
        .json(&json!({
            "pageUrl": "https://example.com/signup",
            "email": "lead@example.com"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(submitted["attributed"], true);
    assert_eq!(submitted["linkId"], "spring-sale");
    // ip fallback 0.25 plus the 30 minute bonus
    assert_eq!(submitted["confidence"].as_f64(), Some(0.45));

    let id = submitted["id"].as_str().unwrap();
    let detail: Value = client
        .get(format!("{base}/api/attributions/{id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["signals"], json!(["ip_fallback"]));
    assert_eq!(detail["elapsedMinutes"], 0);
}

#[tokio::test]
async fn explicit_link_outranks_ip_fallback() {
    let (_state, addr) = common::create_test_server().await;
    let client = reqwest::Client::new();
    let base = format!("http://{addr}");

    for link in ["from-ip", "explicit"] {
        let status = client
            .post(format!("{base}/api/clicks"))
            .json(&json!({ "linkId": link, "ipAddress": "127.0.0.1" }))
            .send()
            .await
            .unwrap()
            .status();
        assert_eq!(status, StatusCode::OK);
    }

    let submitted: Value = client
        .post(format!("{base}/api/attributions"))
        .json(&json!({
            "pageUrl": "https://example.com/signup",
            "linkId": "explicit"
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(submitted["linkId"], "explicit");
    assert_eq!(submitted["confidence"].as_f64(), Some(0.55));
}

#[tokio::test]
async fn feedback_requires_owner_key() {
    let access = AccessConfig::with_keys([
        ("alpha-key".to_string(), "alpha".to_string()),
        ("beta-key".to_string(), "beta".to_string()),
    ]);
    let (_state, addr) = common::create_test_server_with_access(access).await;
    let client = reqwest::Client::new();
    let base = format!("http://{addr}");

    let unauthenticated = client
        .post(format!("{base}/api/attributions"))
        .json(&json!({ "pageUrl": "https://example.com/signup" }))
        .send()
        .await
        .unwrap();
    assert_eq!(unauthenticated.status(), StatusCode::UNAUTHORIZED);
    let body: Value = unauthenticated.json().await.unwrap();
    assert_eq!(body["code"], "UNAUTHORIZED");

    let submitted: Value = client
        .post(format!("{base}/api/attributions"))
        .bearer_auth("alpha-key")
        .json(&json!({ "pageUrl": "https://example.com/signup" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(submitted["attributed"], false);
    let feedback_url = format!("{base}/api/attributions/{}/feedback", submitted["id"].as_str().unwrap());

    let foreign = client
        .post(&feedback_url)
        .header("x-api-key", "beta-key")
        .json(&json!({ "confirmed": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(foreign.status(), StatusCode::NOT_FOUND);

    let confirmed: Value = client
        .post(&feedback_url)
        .header("x-api-key", "alpha-key")
        .json(&json!({ "confirmed": true }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(confirmed["feedbackStatus"], "confirmed");

    let flipped = client
        .post(&feedback_url)
        .header("x-api-key", "alpha-key")
        .json(&json!({ "confirmed": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(flipped.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn ip_fallback_stays_within_the_callers_account() {
    let mut access = AccessConfig::with_keys([
        ("key-a".to_string(), "owner-a".to_string()),
        ("key-b".to_string(), "owner-b".to_string()),
    ]);
    access.trusted_proxies = vec![IpAddr::V4(Ipv4Addr::LOCALHOST)];
    let (_state, addr) = common::create_test_server_with_access(access).await;
    let client = reqwest::Client::new();
    let base = format!("http://{addr}");

    let status = client
        .post(format!("{base}/api/clicks"))
        .header("x-api-key", "key-b")
        .header("x-forwarded-for", "203.0.113.77")
        .json(&json!({ "linkId": "owner-b-secret-link" }))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, StatusCode::OK);

    let submit = |key: &'static str| {
        client
            .post(format!("{base}/api/attributions"))
            .header("x-api-key", key)
            .header("x-forwarded-for", "203.0.113.77")
            .json(&json!({ "pageUrl": "https://example.com/signup" }))
            .send()
    };

    let foreign: Value = submit("key-a").await.unwrap().json().await.unwrap();
    assert_eq!(foreign["attributed"], false);
    assert_eq!(foreign["linkId"], Value::Null);

    let own: Value = submit("key-b").await.unwrap().json().await.unwrap();
    assert_eq!(own["attributed"], true);
    assert_eq!(own["linkId"], "owner-b-secret-link");
    assert_eq!(own["confidence"].as_f64(), Some(0.45));
}

#[tokio::test]
async fn forwarding_headers_ignored_unless_peer_is_trusted() {
    let (state, addr) = common::create_test_server().await;
    let client = reqwest::Client::new();

    let recorded: Value = client
        .post(format!("http://{addr}/api/clicks"))
        .header("x-forwarded-for", "203.0.113.77")
        .header("x-real-ip", "203.0.113.77")
        .json(&json!({ "linkId": "spring-sale" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let id = recorded["id"].as_str().unwrap().parse().unwrap();
    let click = state.store.get_click(id).await.unwrap().unwrap();
    assert_eq!(click.ip_address, IpAddr::V4(Ipv4Addr::LOCALHOST));
}

#[tokio::test]
async fn health_is_public() {
    let access = AccessConfig::with_keys([("k".to_string(), "o".to_string())]);
    let (_state, addr) = common::create_test_server_with_access(access).await;

    let response = reqwest::get(format!("http://{addr}/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}
