//! Integration tests for token acquisition and caching

use super::*;
use chrono::Utc;
use oauth2_service_client::{CacheStore, OAuth2Error, RequestOptions, TokenManager};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_token_fetched_once_and_cached() {
    let mock_server = setup_mock_server().await;

    token_endpoint("tok1", 3600)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(header("Authorization", "Bearer tok1"))
        .respond_with(success_response(json!({"invoices": []})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let (client, cache) = client_for(&mock_server);

    let first = client.get(&api_url(&mock_server), RequestOptions::new()).await;
    let second = client.get(&api_url(&mock_server), RequestOptions::new()).await;

    assert_eq!(first.unwrap().status, 200);
    assert_eq!(second.unwrap().status, 200);
    assert_eq!(
        cache.get("oauth2_billing_access_token").await.unwrap(),
        Some("tok1".to_string())
    );

    let expires_at: i64 = cache
        .get("oauth2_billing_expires_at")
        .await
        .unwrap()
        .expect("expiry cached")
        .parse()
        .expect("expiry is a unix timestamp");
    let remaining = expires_at - Utc::now().timestamp();
    assert!((3590..=3600).contains(&remaining));
}

#[tokio::test]
async fn test_token_request_is_form_encoded() {
    let mock_server = setup_mock_server().await;

    token_endpoint("tok1", 3600).mount(&mock_server).await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(success_response(json!({})))
        .mount(&mock_server)
        .await;

    let mut entry = service_entry(&mock_server);
    entry["scope"] = json!("invoices:read");
    let client = client_with_cache(entry, Arc::new(InMemoryCacheStore::new()));

    client
        .get(&api_url(&mock_server), RequestOptions::new())
        .await
        .unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    let token_request = requests
        .iter()
        .find(|r| r.url.path() == TOKEN_PATH)
        .expect("token endpoint called");
    let body = String::from_utf8_lossy(&token_request.body);

    assert_eq!(
        token_request
            .headers
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("application/x-www-form-urlencoded")
    );
    assert!(body.contains("grant_type=client_credentials"));
    assert!(body.contains("client_id=billing-client"));
    assert!(body.contains("client_secret=billing-secret"));
    assert!(body.contains("scope=invoices%3Aread"));
}

#[tokio::test]
async fn test_empty_scope_is_omitted() {
    let mock_server = setup_mock_server().await;

    token_endpoint("tok1", 3600).mount(&mock_server).await;

    let (client, _cache) = client_for(&mock_server);
    client.token_manager().ensure_valid_token().await.unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!String::from_utf8_lossy(&requests[0].body).contains("scope"));
}

#[tokio::test]
async fn test_clients_share_cached_token() {
    let mock_server = setup_mock_server().await;

    token_endpoint("shared", 3600)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(header("Authorization", "Bearer shared"))
        .respond_with(success_response(json!({})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let cache = Arc::new(InMemoryCacheStore::new());
    let first = client_with_cache(service_entry(&mock_server), cache.clone());
    let second = client_with_cache(service_entry(&mock_server), cache);

    first
        .get(&api_url(&mock_server), RequestOptions::new())
        .await
        .unwrap();
    second
        .get(&api_url(&mock_server), RequestOptions::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_expiring_token_is_replaced() {
    let mock_server = setup_mock_server().await;

    token_endpoint("fresh", 3600)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(header("Authorization", "Bearer fresh"))
        .respond_with(success_response(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, cache) = client_for(&mock_server);
    let soon = Utc::now().timestamp() + 10;
    cache
        .put("oauth2_billing_access_token", "stale", Duration::from_secs(10))
        .await
        .unwrap();
    cache
        .put("oauth2_billing_expires_at", &soon.to_string(), Duration::from_secs(10))
        .await
        .unwrap();

    let response = client
        .get(&api_url(&mock_server), RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(client.token_manager().current_state().access_token, "fresh");
}

#[tokio::test]
async fn test_token_endpoint_rejection() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(error_response(
            401,
            json!({"error": "invalid_client", "error_description": "Unknown client"}),
        ))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(success_response(json!({})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (client, cache) = client_for(&mock_server);

    let error = client
        .get(&api_url(&mock_server), RequestOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(error, OAuth2Error::TokenFetch { .. }));
    assert_eq!(error.status_code(), 401);
    assert_eq!(error.clean_message(), "invalid_client: Unknown client");
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_token_endpoint_non_json_error() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&mock_server)
        .await;

    let (client, _cache) = client_for(&mock_server);

    let error = client
        .token_manager()
        .ensure_valid_token()
        .await
        .unwrap_err();

    assert_eq!(error.status_code(), 503);
    assert_eq!(error.clean_message(), "upstream unavailable");
    assert_eq!(error.response_data(), Some(json!("upstream unavailable")));
}

#[tokio::test]
async fn test_token_response_missing_fields() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(success_response(json!({"foo": "bar"})))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(success_response(json!({})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (client, cache) = client_for(&mock_server);

    let error = client
        .get(&api_url(&mock_server), RequestOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(error, OAuth2Error::InvalidTokenResponse { .. }));
    assert_eq!(error.response_data(), Some(json!({"foo": "bar"})));
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_unreachable_token_endpoint() {
    let mock_server = setup_mock_server().await;
    let entry = json!({
        "token_url": "http://127.0.0.1:9/oauth/token",
        "client_id": "billing-client",
        "client_secret": "billing-secret"
    });
    let client = client_with_cache(entry, Arc::new(InMemoryCacheStore::new()));

    let error = client
        .get(&api_url(&mock_server), RequestOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(error, OAuth2Error::TokenFetch { status: None, .. }));
    assert_eq!(error.status_code(), 0);
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_out_of_range_expires_in_is_rejected() {
    let mock_server = setup_mock_server().await;

    token_endpoint("tok1", 100_000_000_000_000_000)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(success_response(json!({})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (client, cache) = client_for(&mock_server);

    let error = client
        .get(&api_url(&mock_server), RequestOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(error, OAuth2Error::InvalidTokenResponse { .. }));
    assert!(error.clean_message().contains("out of range"));
    assert!(cache.is_empty());
}
