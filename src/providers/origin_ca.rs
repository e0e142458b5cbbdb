//! Origin CA provider gateway (spec §4.2, §4.5, §6.1 `originCA:` block).
//!
//! This is the one provider with a fully specified wire contract, so unlike
//! compute and DNS it gets a concrete HTTP implementation here rather than
//! staying trait-only; the reqwest/builder shape follows the same pattern
//! as the rest of this crate's HTTP clients.

use crate::error::{DyniaError, ProviderError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Validities the origin CA accepts, in days (spec §4.5).
pub const ALLOWED_VALIDITY_DAYS: &[u16] = &[7, 30, 90, 365, 730, 1095, 5475];

/// A certificate request for `*.baseDomain` (spec §4.5 step 3).
#[derive(Debug, Clone)]
pub struct CertificateRequest {
    pub hostnames: Vec<String>,
    pub requested_validity_days: u16,
    pub csr_pem: String,
}

impl CertificateRequest {
    pub fn for_wildcard(base_domain: &str, validity_days: u16, csr_pem: String) -> Result<Self> {
        if !ALLOWED_VALIDITY_DAYS.contains(&validity_days) {
            return Err(DyniaError::validation(format!(
                "requested validity {validity_days} is not one of {ALLOWED_VALIDITY_DAYS:?}"
            )));
        }
        Ok(CertificateRequest {
            hostnames: vec![format!("*.{base_domain}")],
            requested_validity_days: validity_days,
            csr_pem,
        })
    }
}

#[derive(Serialize)]
struct IssueRequestBody {
    hostnames: Vec<String>,
    request_type: &'static str,
    requested_validity: u16,
    csr: String,
}

#[derive(Deserialize)]
struct IssueResponseBody {
    certificate: String,
}

/// The origin-CA capability the certificate service depends on.
#[async_trait]
pub trait OriginCaProvider: Send + Sync {
    async fn issue(&self, request: CertificateRequest) -> Result<String>;
}

/// Builder for [`HttpOriginCaProvider`].
#[derive(Debug, Clone)]
pub struct HttpOriginCaProviderBuilder {
    base_url: String,
    user_service_key: String,
    timeout: Duration,
}

impl HttpOriginCaProviderBuilder {
    pub fn new(user_service_key: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.cloudflare.com/client/v4/certificates".to_string(),
            user_service_key: user_service_key.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<HttpOriginCaProvider> {
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| DyniaError::Transport(e.to_string()))?;
        Ok(HttpOriginCaProvider {
            base_url: self.base_url,
            user_service_key: self.user_service_key,
            client: Arc::new(client),
        })
    }
}

/// Concrete origin-CA gateway. Authenticates with a user-service key header
/// rather than basic auth, per the provider's own convention.
#[derive(Clone)]
pub struct HttpOriginCaProvider {
    base_url: String,
    user_service_key: String,
    client: Arc<Client>,
}

impl HttpOriginCaProvider {
    pub fn builder(user_service_key: impl Into<String>) -> HttpOriginCaProviderBuilder {
        HttpOriginCaProviderBuilder::new(user_service_key)
    }

    fn map_reqwest_error(&self, error: reqwest::Error, url: &str) -> DyniaError {
        if error.is_connect() {
            DyniaError::Provider(ProviderError::transient(format!(
                "failed to connect to {url}: {error}"
            )))
        } else if error.is_timeout() {
            DyniaError::Provider(ProviderError::transient(format!(
                "request to {url} timed out: {error}"
            )))
        } else if let Some(status) = error.status() {
            DyniaError::Provider(ProviderError {
                message: format!("HTTP {} from {url}: {error}", status.as_u16()),
                retryable: status.is_server_error(),
            })
        } else {
            DyniaError::Provider(ProviderError::permanent(error.to_string()))
        }
    }
}

#[async_trait]
impl OriginCaProvider for HttpOriginCaProvider {
    async fn issue(&self, request: CertificateRequest) -> Result<String> {
        let body = IssueRequestBody {
            hostnames: request.hostnames,
            request_type: "origin-rsa",
            requested_validity: request.requested_validity_days,
            csr: request.csr_pem,
        };

        debug!(url = %self.base_url, "issuing origin CA certificate");

        let response = self
            .client
            .post(&self.base_url)
            .header("X-Auth-User-Service-Key", &self.user_service_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e, &self.base_url))?;

        if response.status().is_success() {
            let bytes = response.bytes().await.map_err(DyniaError::from)?;
            let deserializer = &mut serde_json::Deserializer::from_slice(&bytes);
            let parsed: IssueResponseBody = serde_path_to_error::deserialize(deserializer)
                .map_err(|e| DyniaError::Schema(format!("origin CA response: {e}")))?;
            Ok(parsed.certificate)
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            Err(DyniaError::Provider(ProviderError {
                message: format!("origin CA returned HTTP {}: {text}", status.as_u16()),
                retryable: status.is_server_error(),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_allowed_validity() {
        let request = CertificateRequest::for_wildcard("example.com", 42, "csr".into());
        assert!(request.is_err());
    }

    #[test]
    fn accepts_allowed_validity() {
        let request = CertificateRequest::for_wildcard("example.com", 365, "csr".into()).unwrap();
        assert_eq!(request.hostnames, vec!["*.example.com".to_string()]);
    }
}
