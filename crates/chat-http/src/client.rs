//! Minimal REST client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::{GatewayUrlProvider, HttpError};

/// `GET /gateway/bot` response
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayBotInfo {
    pub url: String,
    /// Recommended shard count
    pub shards: u32,
    #[serde(default)]
    pub session_start_limit: Option<SessionStartLimit>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SessionStartLimit {
    pub total: u32,
    pub remaining: u32,
    pub reset_after: u64,
}

/// Bot-authenticated REST client
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("chat-gateway-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Gateway URL plus the recommended shard count
    pub async fn gateway_bot(&self) -> Result<GatewayBotInfo, HttpError> {
        let url = format!("{}/gateway/bot", self.base_url);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            StatusCode::UNAUTHORIZED => Err(HttpError::Unauthorized),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(HttpError::Status {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

#[async_trait]
impl GatewayUrlProvider for RestClient {
    async fn gateway_url(&self) -> Result<String, HttpError> {
        let info = self.gateway_bot().await?;
        tracing::debug!(url = %info.url, shards = info.shards, "resolved gateway endpoint");
        Ok(info.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one canned HTTP response and hand back the request head
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let mut read = 0;
            while !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf[read..]).await.unwrap();
                if n == 0 {
                    break;
                }
                read += n;
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf[..read]).to_string()
        });
        (format!("http://{addr}/api/v6/"), handle)
    }

    #[test]
    fn test_gateway_bot_payload() {
        let info: GatewayBotInfo = serde_json::from_str(
            r#"{"url":"wss://gateway.example","shards":2,
                "session_start_limit":{"total":1000,"remaining":998,"reset_after":3600}}"#,
        )
        .unwrap();
        assert_eq!(info.shards, 2);
        assert_eq!(info.session_start_limit.unwrap().remaining, 998);
    }

    #[tokio::test]
    async fn test_gateway_url_over_http() {
        let (base, server) = serve_once("200 OK", r#"{"url":"wss://gateway.example","shards":1}"#).await;
        let client = RestClient::new(base, "secret").unwrap();

        assert_eq!(client.gateway_url().await.unwrap(), "wss://gateway.example");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/v6/gateway/bot "));
        assert!(request.to_lowercase().contains("authorization: bot secret"));
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let (base, _server) = serve_once("401 Unauthorized", r#"{"message":"401: Unauthorized"}"#).await;
        let client = RestClient::new(base, "bad").unwrap();
        assert!(matches!(client.gateway_bot().await, Err(HttpError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_server_error_keeps_body() {
        let (base, _server) = serve_once("502 Bad Gateway", "upstream down").await;
        let client = RestClient::new(base, "t").unwrap();
        match client.gateway_bot().await {
            Err(HttpError::Status { status, body }) => {
                assert_eq!(status, 502);
                assert_eq!(body, "upstream down");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
