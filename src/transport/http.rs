//! HTTP transport
//!
//! Talks to the session host's REST endpoints with `reqwest` and opens the
//! streaming channel over WebSocket.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::{websocket, Endpoint, FailureBody, ProvisionReply, StreamingChannel, Transport, TransportResult};
use crate::session::{Geometry, SessionHandle};

/// `Transport` backed by the session host's HTTP and WebSocket endpoints
#[derive(Debug, Clone)]
pub struct HttpTransport {
    endpoint: Endpoint,
    client: Client,
}

impl HttpTransport {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            client: Client::new(),
        }
    }
}

/// A success body is JSON when it parses as JSON, otherwise raw text
fn parse_accepted(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn provision(&self, body: &Value) -> TransportResult<ProvisionReply> {
        let url = self.endpoint.terminals_url();
        debug!("Provisioning terminal at {}", url);

        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            Ok(ProvisionReply::Accepted(parse_accepted(&text)))
        } else {
            debug!("Provisioning rejected with {}", status);
            Ok(ProvisionReply::Rejected(FailureBody::parse(&text)))
        }
    }

    async fn resize(&self, handle: &SessionHandle, geometry: Geometry) -> TransportResult<()> {
        let url = self.endpoint.resize_url(handle, geometry);
        self.client.post(&url).send().await?.error_for_status()?;
        Ok(())
    }

    fn open_channel(&self, handle: &SessionHandle) -> StreamingChannel {
        websocket::open(self.endpoint.socket_url(handle), handle.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn transport_for(server: &mockito::ServerGuard) -> HttpTransport {
        let host_with_port = server.host_with_port();
        let (host, port) = host_with_port.rsplit_once(':').unwrap();
        HttpTransport::new(Endpoint::new(host, port.parse().unwrap()))
    }

    #[tokio::test]
    async fn test_provision_accepted_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/terminals")
            .match_body(Matcher::PartialJson(json!({"cols": 80, "type": "local"})))
            .with_status(200)
            .with_body("31337")
            .create_async()
            .await;

        let transport = transport_for(&server);
        let reply = transport
            .provision(&json!({"cols": 80, "rows": 24, "type": "local"}))
            .await
            .unwrap();

        assert_eq!(reply, ProvisionReply::Accepted(json!(31337)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_provision_accepted_non_json_text() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/terminals")
            .with_status(200)
            .with_body("pty-abc")
            .create_async()
            .await;

        let reply = transport_for(&server).provision(&json!({})).await.unwrap();
        assert_eq!(reply, ProvisionReply::Accepted(json!("pty-abc")));
    }

    #[tokio::test]
    async fn test_provision_rejected_keeps_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/terminals")
            .with_status(500)
            .with_body("All configured authentication methods failed")
            .create_async()
            .await;

        let reply = transport_for(&server).provision(&json!({})).await.unwrap();
        assert_eq!(
            reply,
            ProvisionReply::Rejected(FailureBody::Text(
                "All configured authentication methods failed".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_provision_rejected_json() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/terminals")
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":"ECONNREFUSED"}"#)
            .create_async()
            .await;

        let reply = transport_for(&server).provision(&json!({})).await.unwrap();
        assert_eq!(
            reply,
            ProvisionReply::Rejected(FailureBody::Json(json!({"message": "ECONNREFUSED"})))
        );
    }

    #[tokio::test]
    async fn test_resize_posts_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/terminals/99/size")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("cols".into(), "120".into()),
                Matcher::UrlEncoded("rows".into(), "40".into()),
            ]))
            .with_status(200)
            .create_async()
            .await;

        transport_for(&server)
            .resize(&SessionHandle::new("99"), Geometry::new(120, 40))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_host_is_an_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let transport = HttpTransport::new(Endpoint::new("127.0.0.1", port));
        assert!(transport.provision(&json!({})).await.is_err());
    }
}
