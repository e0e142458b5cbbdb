//! Wire-contract tests for the origin-CA HTTP gateway against a mocked
//! server, in the same style as the teacher crate's wiremock-backed
//! endpoint tests.

use dynia::providers::{CertificateRequest, HttpOriginCaProvider, OriginCaProvider};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

/// Matches only when the request body's `requested_validity` is the JSON
/// integer `90`, not a stringified number — pins spec §4.5's "the validity
/// must be encoded as a JSON integer" requirement.
struct RequestedValidityIsInteger(u16);

impl Match for RequestedValidityIsInteger {
    fn matches(&self, request: &Request) -> bool {
        let Ok(body) = serde_json::from_slice::<serde_json::Value>(&request.body) else {
            return false;
        };
        body.get("requested_validity") == Some(&json!(self.0))
            && body.get("request_type") == Some(&json!("origin-rsa"))
    }
}

#[tokio::test]
async fn issues_a_certificate_with_the_documented_wire_shape() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("X-Auth-User-Service-Key", "ca-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "certificate": "-----BEGIN CERTIFICATE-----\nfake\n-----END CERTIFICATE-----\n"
        })))
        .mount(&mock_server)
        .await;

    let provider = HttpOriginCaProvider::builder("ca-key")
        .base_url(mock_server.uri())
        .build()
        .unwrap();

    let request = CertificateRequest::for_wildcard("example.com", 365, "csr-pem".to_string()).unwrap();
    let cert = provider.issue(request).await.unwrap();
    assert!(cert.contains("BEGIN CERTIFICATE"));
}

#[tokio::test]
async fn encodes_requested_validity_as_a_json_integer() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .and(RequestedValidityIsInteger(90))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"certificate": "cert-pem"})))
        .mount(&mock_server)
        .await;

    let provider = HttpOriginCaProvider::builder("ca-key")
        .base_url(mock_server.uri())
        .build()
        .unwrap();

    let request = CertificateRequest::for_wildcard("example.com", 90, "csr-pem".to_string()).unwrap();
    provider.issue(request).await.unwrap();
}

#[tokio::test]
async fn server_errors_are_marked_retryable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let provider = HttpOriginCaProvider::builder("ca-key")
        .base_url(mock_server.uri())
        .build()
        .unwrap();

    let request = CertificateRequest::for_wildcard("example.com", 365, "csr-pem".to_string()).unwrap();
    let err = provider.issue(request).await.unwrap_err();
    assert!(err.is_retryable());
}

#[tokio::test]
async fn client_errors_are_not_retryable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&mock_server)
        .await;

    let provider = HttpOriginCaProvider::builder("ca-key")
        .base_url(mock_server.uri())
        .build()
        .unwrap();

    let request = CertificateRequest::for_wildcard("example.com", 365, "csr-pem".to_string()).unwrap();
    let err = provider.issue(request).await.unwrap_err();
    assert!(!err.is_retryable());
}
