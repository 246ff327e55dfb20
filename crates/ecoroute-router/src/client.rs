//! HTTP transport for prediction services.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use serde_json::Value;
use tracing::debug;

use crate::error::ServiceError;

/// Boxed future alias for service calls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Fetches a JSON document with a bounded wait.
///
/// Injected into the router so tests can script downstream behaviour.
pub trait ServiceClient: Send + Sync {
    fn get_json<'a>(&'a self, url: &'a str, timeout: Duration) -> BoxFuture<'a, Result<Value, ServiceError>>;
}

/// Plain HTTP/1.1 client built on hyper, one connection per call.
#[derive(Debug, Clone, Default)]
pub struct HttpServiceClient;

impl HttpServiceClient {
    pub fn new() -> Self {
        Self
    }
}

impl ServiceClient for HttpServiceClient {
    fn get_json<'a>(&'a self, url: &'a str, timeout: Duration) -> BoxFuture<'a, Result<Value, ServiceError>> {
        Box::pin(async move {
            match tokio::time::timeout(timeout, fetch(url)).await {
                Ok(result) => result,
                Err(_) => {
                    debug!(%url, ?timeout, "service call timed out");
                    Err(ServiceError::unreachable(url, format!("timed out after {timeout:?}")))
                }
            }
        })
    }
}

async fn fetch(url: &str) -> Result<Value, ServiceError> {
    let uri: http::Uri = url
        .parse()
        .map_err(|e| ServiceError::unreachable(url, format!("invalid url: {e}")))?;

    if uri.scheme_str() != Some("http") {
        return Err(ServiceError::unreachable(url, "only http:// is supported"));
    }
    let authority = uri
        .authority()
        .ok_or_else(|| ServiceError::unreachable(url, "missing host"))?
        .clone();
    let port = authority.port_u16().unwrap_or(80);

    let stream = tokio::net::TcpStream::connect((authority.host(), port))
        .await
        .map_err(|e| ServiceError::unreachable(url, e))?;

    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| ServiceError::unreachable(url, format!("handshake failed: {e}")))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "service connection closed with error");
        }
    });

    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let req = http::Request::builder()
        .method("GET")
        .uri(path)
        .header("host", authority.as_str())
        .header("accept", "application/json")
        .header("user-agent", "ecoroute-router/0.1")
        .body(Empty::<Bytes>::new())
        .map_err(|e| ServiceError::unreachable(url, e))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| ServiceError::unreachable(url, e))?;

    let status = resp.status();
    if !status.is_success() {
        debug!(%status, %url, "service returned non-2xx");
        return Err(ServiceError::unreachable(url, format!("HTTP status {status}")));
    }

    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| ServiceError::unreachable(url, format!("reading body: {e}")))?
        .to_bytes();

    serde_json::from_slice(&body).map_err(|e| ServiceError::malformed(url, e))
}
