//! Minimal JSON-over-HTTP/1.1 client.
//!
//! One TCP connection per call, driven by hyper's low-level connection
//! API. Callers bound the whole exchange with their own timeout.

use bytes::Bytes;
use http::Uri;
use http_body_util::{BodyExt, Full};
use serde::Serialize;
use tracing::debug;

use crate::error::{SignalError, SignalResult};

const USER_AGENT: &str = concat!("sipdrain/", env!("CARGO_PKG_VERSION"));

/// Response status and body of a completed exchange.
#[derive(Debug, Clone)]
pub struct JsonResponse {
    pub status: u16,
    pub body: Bytes,
}

impl JsonResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// POST `body` as JSON to `url` and return the raw response.
pub async fn post_json<B: Serialize + ?Sized>(url: &str, body: &B) -> SignalResult<JsonResponse> {
    let uri: Uri = url
        .parse()
        .map_err(|_| SignalError::InvalidEndpoint(url.to_string()))?;
    match uri.scheme_str() {
        Some("http") => {}
        Some(other) => return Err(SignalError::UnsupportedScheme(other.to_string())),
        None => return Err(SignalError::InvalidEndpoint(url.to_string())),
    }
    let authority = uri
        .authority()
        .ok_or_else(|| SignalError::InvalidEndpoint(url.to_string()))?
        .clone();
    let host = authority.host();
    let port = authority.port_u16().unwrap_or(80);
    let payload = serde_json::to_vec(body).map_err(|e| SignalError::Encode(e.to_string()))?;

    let stream = tokio::net::TcpStream::connect((host, port))
        .await
        .map_err(|e| SignalError::Transport(format!("connect {authority}: {e}")))?;

    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| SignalError::Transport(format!("handshake {authority}: {e}")))?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let path = uri
        .path_and_query()
        .map(|p| p.as_str())
        .unwrap_or("/")
        .to_string();
    let req = http::Request::builder()
        .method(http::Method::POST)
        .uri(path)
        .header(http::header::HOST, authority.as_str())
        .header(http::header::USER_AGENT, USER_AGENT)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(payload)))
        .map_err(|e| SignalError::Encode(e.to_string()))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| SignalError::Transport(format!("request {url}: {e}")))?;
    let status = resp.status().as_u16();
    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| SignalError::Transport(format!("read body {url}: {e}")))?
        .to_bytes();

    debug!(%url, status, "http exchange complete");
    Ok(JsonResponse { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_https() {
        let err = post_json("https://media.internal/drain/start", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, SignalError::UnsupportedScheme(s) if s == "https"));
    }

    #[tokio::test]
    async fn rejects_relative_url() {
        let err = post_json("/drain/start", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, SignalError::InvalidEndpoint(_)));
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = post_json(&format!("http://{addr}/x"), &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, SignalError::Transport(_)));
    }
}
