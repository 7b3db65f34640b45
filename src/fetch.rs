//! Busca genérica de dados pela rede, exposta à interface pela ponte.
//!
//! A verificação de certificados TLS fica ligada por padrão; desligá-la é uma
//! opção explícita de inicialização e gera um aviso no log.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Erros que podem ocorrer numa busca de dados.
///
/// - [`InvalidUrl`](FetchError::InvalidUrl): URL malformada ou esquema diferente de http(s)
/// - [`Status`](FetchError::Status): o servidor respondeu com status fora de 2xx
/// - [`Network`](FetchError::Network): falha na camada de rede
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),

    /// Contém o código de status HTTP e o corpo da resposta.
    #[error("request failed (status {status}): {body}")]
    Status { status: u16, body: String },

    /// Falha de rede subjacente (DNS, conexão recusada, timeout, TLS).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Parâmetros do cliente HTTP, fixados na inicialização.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSettings {
    pub accept_invalid_certs: bool,
    pub connect_timeout: Duration,
    pub timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            accept_invalid_certs: false,
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Resposta entregue à interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        if settings.accept_invalid_certs {
            warn!("TLS certificate verification is disabled for data fetches");
        }
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()?;
        Ok(Self { client })
    }

    /// GET `url` and return its body as text.
    pub async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }

        debug!(%parsed, "fetching data");
        let response = self.client.get(parsed).send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        Ok(FetchResponse {
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> Fetcher {
        Fetcher::new(FetchSettings::default()).unwrap()
    }

    #[tokio::test]
    async fn fetch_returns_body_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cep/01001000"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"{"localidade":"São Paulo"}"#, "application/json"),
            )
            .mount(&server)
            .await;

        let resp = fetcher()
            .fetch(&format!("{}/cep/01001000", server.uri()))
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.content_type.as_deref(), Some("application/json"));
        assert_eq!(resp.body, r#"{"localidade":"São Paulo"}"#);
    }

    #[tokio::test]
    async fn fetch_maps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let err = fetcher().fetch(&server.uri()).await.unwrap_err();
        match err {
            FetchError::Status { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "not found");
            }
            other => panic!("expected Status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_rejects_invalid_urls() {
        for url in ["not a url", "file:///etc/passwd", "ftp://example.com/x"] {
            let err = fetcher().fetch(url).await.unwrap_err();
            assert!(matches!(err, FetchError::InvalidUrl(_)), "{url}");
        }
    }

    #[tokio::test]
    async fn fetch_reports_network_errors() {
        // Porta 9 (discard) normalmente recusa conexões locais.
        let err = fetcher().fetch("http://127.0.0.1:9/").await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }

    #[test]
    fn secure_by_default() {
        assert!(!FetchSettings::default().accept_invalid_certs);
    }

    #[test]
    fn status_error_display() {
        let err = FetchError::Status {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(err.to_string(), "request failed (status 500): boom");
    }
}
