//! Integration tests for the rendered error surface

use super::*;
use oauth2_service_client::{
    debug_requested, oauth2_client, render_error, ConfigurationError, OAuth2Error, RequestOptions,
};
use std::collections::HashMap;
use wiremock::matchers::{method, path};
use wiremock::Mock;

#[tokio::test]
async fn test_render_request_failure() {
    let mock_server = setup_mock_server().await;

    token_endpoint("tok1", 3600).mount(&mock_server).await;
    Mock::given(method("DELETE"))
        .and(path(API_PATH))
        .respond_with(error_response(404, json!({"message": "invoice not found"})))
        .mount(&mock_server)
        .await;

    let (client, _cache) = client_for(&mock_server);
    let error = client
        .delete(&api_url(&mock_server), RequestOptions::new())
        .await
        .unwrap_err();

    let rendered = render_error(&error, false);

    assert_eq!(rendered.status, 404);
    assert_eq!(rendered.body["code"], 404);
    assert_eq!(rendered.body["context"]["service"], SERVICE);
    assert_eq!(
        rendered.body["response_data"],
        json!({"message": "invoice not found"})
    );
    assert!(rendered.body["message"]
        .as_str()
        .unwrap()
        .ends_with("with status 404: invoice not found"));
    assert!(rendered.body.get("exception").is_none());
    assert!(rendered.body.get("trace").is_none());
}

#[tokio::test]
async fn test_render_transport_failure_with_debug() {
    let mock_server = setup_mock_server().await;

    token_endpoint("tok1", 3600).mount(&mock_server).await;

    let (client, _cache) = client_for(&mock_server);
    let error = client
        .get("http://127.0.0.1:9/v1/invoices", RequestOptions::new())
        .await
        .unwrap_err();

    let mut headers = HashMap::new();
    headers.insert("X-Debug".to_string(), "1".to_string());
    let rendered = render_error(&error, debug_requested(&headers, None));

    assert_eq!(rendered.status, 500);
    assert_eq!(rendered.body["code"], 0);
    assert_eq!(rendered.body["exception"], "RequestError");
    assert_eq!(rendered.body["trace"].as_array().map(Vec::len), Some(1));
}

#[test]
fn test_configuration_failure_renders_without_network() {
    let settings = settings_for(json!({"token_url": "https://auth.example.com/token"}));

    let error = oauth2_client(SERVICE, &settings).err().expect("configuration error");
    assert!(matches!(
        &error,
        OAuth2Error::Configuration(ConfigurationError::InvalidFormat { field, .. })
            if field == "client_id"
    ));

    let rendered = render_error(&error, debug_requested(&HashMap::new(), Some("?debug=1")));
    assert_eq!(rendered.status, 500);
    assert_eq!(rendered.body["exception"], "ConfigurationError");
    assert_eq!(rendered.body["context"]["service"], SERVICE);
}
