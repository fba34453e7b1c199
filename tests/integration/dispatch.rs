//! Integration tests for authenticated request dispatch

use super::*;
use oauth2_service_client::{
    CacheStore, MultipartField, OAuth2Error, RequestOptions, TokenManager, TransportError,
    REDACTED,
};
use std::time::Duration;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

async fn seed_token(cache: &InMemoryCacheStore, token: &str) {
    let expires_at = chrono::Utc::now().timestamp() + 3600;
    cache
        .put("oauth2_billing_access_token", token, Duration::from_secs(3600))
        .await
        .unwrap();
    cache
        .put(
            "oauth2_billing_expires_at",
            &expires_at.to_string(),
            Duration::from_secs(3600),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unauthorized_response_triggers_single_refresh() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(header("Authorization", "Bearer revoked"))
        .respond_with(error_response(401, json!({"message": "token revoked"})))
        .expect(1)
        .mount(&mock_server)
        .await;
    token_endpoint("tok2", 3600)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(header("Authorization", "Bearer tok2"))
        .respond_with(success_response(json!({"invoices": [1]})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, cache) = client_for(&mock_server);
    seed_token(&cache, "revoked").await;

    let response = client
        .get(&api_url(&mock_server), RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.json_value(), Some(json!({"invoices": [1]})));
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 3);
    assert_eq!(
        cache.get("oauth2_billing_access_token").await.unwrap(),
        Some("tok2".to_string())
    );
}

#[tokio::test]
async fn test_repeated_unauthorized_is_raised() {
    let mock_server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(error_response(401, json!({"message": "forbidden scope"})))
        .expect(2)
        .mount(&mock_server)
        .await;
    token_endpoint("tok2", 3600)
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, cache) = client_for(&mock_server);
    seed_token(&cache, "tok1").await;

    let error = client
        .get(&api_url(&mock_server), RequestOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(error, OAuth2Error::Request { .. }));
    assert!(error.is_unauthorized());
    assert_eq!(error.clean_message(), "forbidden scope");
}

#[tokio::test]
async fn test_json_body_and_query_are_sent() {
    let mock_server = setup_mock_server().await;

    token_endpoint("tok1", 3600).mount(&mock_server).await;
    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(header("Authorization", "Bearer tok1"))
        .and(header("Accept", "application/json"))
        .and(header("X-Request-Id", "req-42"))
        .and(query_param("draft", "true"))
        .and(body_json(json!({"amount": 120, "currency": "EUR"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "inv_1"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, _cache) = client_for(&mock_server);

    let options = RequestOptions::new()
        .header("X-Request-Id", "req-42")
        .query("draft", "true");
    let response = client
        .post_json(
            &api_url(&mock_server),
            json!({"amount": 120, "currency": "EUR"}),
            options,
        )
        .await
        .unwrap();

    assert_eq!(response.status, 201);
    assert_eq!(response.header("content-type"), Some("application/json"));
}

#[tokio::test]
async fn test_form_and_multipart_bodies() {
    let mock_server = setup_mock_server().await;

    token_endpoint("tok1", 3600).mount(&mock_server).await;
    Mock::given(method("PUT"))
        .and(path(API_PATH))
        .and(body_string_contains("status=paid"))
        .respond_with(success_response(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(body_string_contains("filename=\"invoice.csv\""))
        .and(body_string_contains("id,amount"))
        .respond_with(success_response(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, _cache) = client_for(&mock_server);
    let url = api_url(&mock_server);

    client
        .put(
            &url,
            RequestOptions::new().form_params(vec![("status".to_string(), "paid".to_string())]),
        )
        .await
        .unwrap();

    let upload = MultipartField::bytes("file", b"id,amount\n1,120\n".to_vec())
        .file_name("invoice.csv")
        .content_type("text/csv");
    client
        .post(&url, RequestOptions::new().multipart(vec![upload]))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_server_error_context_is_sanitized() {
    let mock_server = setup_mock_server().await;

    token_endpoint("tok1", 3600).mount(&mock_server).await;
    Mock::given(method("PATCH"))
        .and(path(API_PATH))
        .respond_with(error_response(422, json!({"error": "validation_failed"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, _cache) = client_for(&mock_server);

    let error = client
        .patch_json(
            &api_url(&mock_server),
            json!({"card_number": "4111111111111111"}),
            RequestOptions::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(error.status_code(), 422);
    assert_eq!(error.clean_message(), "validation_failed");

    let context = error.context();
    assert_eq!(context.get("service"), Some(&json!(SERVICE)));
    assert_eq!(context.get("method"), Some(&json!("PATCH")));
    assert_eq!(context.get("status"), Some(&json!(422)));
    assert_eq!(context.get("options"), Some(&json!({"json": REDACTED})));
    assert!(!serde_json::to_string(&context).unwrap().contains("4111"));
}

#[tokio::test]
async fn test_request_timeout() {
    let mock_server = setup_mock_server().await;

    token_endpoint("tok1", 3600).mount(&mock_server).await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(success_response(json!({})).set_delay(Duration::from_secs(2)))
        .mount(&mock_server)
        .await;

    let (client, _cache) = client_for(&mock_server);

    let error = client
        .get(
            &api_url(&mock_server),
            RequestOptions::new().timeout(Duration::from_millis(200)),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        OAuth2Error::Request {
            status: None,
            source: Some(TransportError::Timeout { .. }),
            ..
        }
    ));
    assert_eq!(error.status_code(), 0);
}

#[tokio::test]
async fn test_response_size_limit() {
    let mock_server = setup_mock_server().await;

    token_endpoint("tok1", 3600).mount(&mock_server).await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
        .mount(&mock_server)
        .await;

    let transport = Arc::new(
        ReqwestHttpTransport::with_options(Duration::from_secs(5), 1024).expect("transport builds"),
    );
    let client = OAuth2Client::for_service(
        SERVICE,
        &settings_for(service_entry(&mock_server)),
        transport,
        Arc::new(InMemoryCacheStore::new()),
    )
    .unwrap();

    let error = client
        .get(&api_url(&mock_server), RequestOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        OAuth2Error::Request {
            source: Some(TransportError::ResponseTooLarge { size: 4096 }),
            ..
        }
    ));
}

#[tokio::test]
async fn test_verify_disabled_still_succeeds() {
    let mock_server = setup_mock_server().await;

    token_endpoint("tok1", 3600)
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(header("Authorization", "Bearer tok1"))
        .respond_with(success_response(json!({})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut entry = service_entry(&mock_server);
    entry["verify"] = json!(false);
    let cache = Arc::new(InMemoryCacheStore::new());
    let client = client_with_cache(entry, cache.clone());

    assert!(!client.token_manager().service_config().verify_tls);

    let response = client
        .get(&api_url(&mock_server), RequestOptions::new())
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(
        cache.get("oauth2_billing_access_token").await.unwrap(),
        Some("tok1".to_string())
    );
}
