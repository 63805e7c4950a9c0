//! JSON-over-HTTP login backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::backend::{LoginBackend, LoginCode, LoginError, StatusReport};

/// Login backend talking to a code-exchange service.
///
/// Endpoints, relative to the base URL:
/// - `POST code` → `{code, url}`
/// - `GET status/{code}` → `{status, ticket?}`
/// - `POST exchange` with `{ticket}` → `{credential}`
#[derive(Debug, Clone)]
pub struct HttpLoginBackend {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct ExchangeRequest<'a> {
    ticket: &'a str,
}

#[derive(Deserialize)]
struct ExchangeResponse {
    credential: String,
}

impl HttpLoginBackend {
    /// Create a backend rooted at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a backend with a preconfigured client.
    #[must_use]
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

async fn read_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, String> {
    let status = response.status();
    if !status.is_success() {
        return Err(format!("remote returned {status}"));
    }
    response.json::<T>().await.map_err(|e| e.to_string())
}

#[async_trait]
impl LoginBackend for HttpLoginBackend {
    async fn request_code(&self) -> Result<LoginCode, LoginError> {
        let response = self
            .client
            .post(self.url("code"))
            .send()
            .await
            .map_err(|e| LoginError::Issuance(e.to_string()))?;
        read_json(response).await.map_err(LoginError::Issuance)
    }

    async fn query_status(&self, code: &str) -> Result<StatusReport, LoginError> {
        let response = self
            .client
            .get(self.url(&format!("status/{code}")))
            .send()
            .await
            .map_err(|e| LoginError::Poll(e.to_string()))?;
        read_json(response).await.map_err(LoginError::Poll)
    }

    async fn exchange(&self, ticket: &str) -> Result<String, LoginError> {
        let response = self
            .client
            .post(self.url("exchange"))
            .json(&ExchangeRequest { ticket })
            .send()
            .await
            .map_err(|e| LoginError::Exchange(e.to_string()))?;
        read_json::<ExchangeResponse>(response)
            .await
            .map(|r| r.credential)
            .map_err(LoginError::Exchange)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, method, path},
    };

    use super::*;
    use crate::backend::LoginStatus;

    #[tokio::test]
    async fn test_request_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": "abc",
                "url": "https://example.test/scan?code=abc"
            })))
            .mount(&server)
            .await;

        let backend = HttpLoginBackend::new(format!("{}/login/", server.uri()));
        let issued = backend.request_code().await.unwrap();
        assert_eq!(issued.code, "abc");
        assert_eq!(issued.url, "https://example.test/scan?code=abc");
    }

    #[tokio::test]
    async fn test_query_status_ok_carries_ticket() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status/abc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "OK", "ticket": "t-9"})),
            )
            .mount(&server)
            .await;

        let backend = HttpLoginBackend::new(server.uri());
        let report = backend.query_status("abc").await.unwrap();
        assert_eq!(report.status, LoginStatus::Ok);
        assert_eq!(report.ticket.as_deref(), Some("t-9"));
    }

    #[tokio::test]
    async fn test_exchange() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/exchange"))
            .and(body_json(serde_json::json!({"ticket": "t-9"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"credential": "auth-code"})),
            )
            .mount(&server)
            .await;

        let backend = HttpLoginBackend::new(server.uri());
        assert_eq!(backend.exchange("t-9").await.unwrap(), "auth-code");
    }

    #[tokio::test]
    async fn test_rejected_ticket_is_exchange_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/exchange"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;

        let backend = HttpLoginBackend::new(server.uri());
        let err = backend.exchange("stale").await.unwrap_err();
        assert!(matches!(err, LoginError::Exchange(_)));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_issuance_error() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let backend = HttpLoginBackend::new(uri);
        let err = backend.request_code().await.unwrap_err();
        assert!(matches!(err, LoginError::Issuance(_)));
    }
}
