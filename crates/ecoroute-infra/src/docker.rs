//! Docker Engine control plane over the local unix socket.
//!
//! Speaks just enough of the Engine API to manage one container:
//!
//! ```text
//! GET  /_ping
//! GET  /containers/json?all=true
//! POST /containers/{id}/start
//! POST /containers/{id}/stop
//! GET  /containers/{id}/json
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Empty};
use serde::Deserialize;
use tokio::net::UnixStream;
use tracing::{debug, info};

use ecoroute_core::{ManagedTarget, TargetState};

use crate::control_plane::{BoxFuture, ControlPlane};
use crate::error::{InfraResult, InfrastructureError};

/// Docker's own stop grace period is 10s; leave room above it.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Control plane backed by the Docker Engine API.
#[derive(Debug, Clone)]
pub struct DockerControlPlane {
    socket: PathBuf,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ContainerSummary {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Names", default)]
    names: Vec<String>,
    #[serde(rename = "State", default)]
    state: String,
}

#[derive(Debug, Deserialize)]
struct ContainerInspect {
    #[serde(rename = "State")]
    state: InspectState,
}

#[derive(Debug, Deserialize)]
struct InspectState {
    #[serde(rename = "Status", default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message: String,
}

impl DockerControlPlane {
    /// Create a client without checking the daemon.
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create a client and ping the daemon once.
    ///
    /// Fails with `Unavailable` when the socket is missing or the daemon
    /// does not answer, so the caller can fall back to degraded mode.
    pub async fn connect(socket: impl Into<PathBuf>) -> InfraResult<Self> {
        let client = Self::new(socket);
        client.ping().await?;
        info!(socket = %client.socket.display(), "connected to docker daemon");
        Ok(client)
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    pub async fn ping(&self) -> InfraResult<()> {
        let (status, body) = self.request(Method::GET, "/_ping").await?;
        check_status(status, &body)
    }

    async fn request(&self, method: Method, path: &str) -> InfraResult<(StatusCode, Bytes)> {
        match tokio::time::timeout(self.timeout, self.send(method, path)).await {
            Ok(result) => result,
            Err(_) => Err(InfrastructureError::Request(format!(
                "{path} timed out after {:?}",
                self.timeout
            ))),
        }
    }

    async fn send(&self, method: Method, path: &str) -> InfraResult<(StatusCode, Bytes)> {
        let stream = UnixStream::connect(&self.socket).await.map_err(|e| {
            InfrastructureError::Unavailable(format!("{}: {e}", self.socket.display()))
        })?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| InfrastructureError::Request(format!("handshake: {e}")))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "docker connection closed with error");
            }
        });

        let req = http::Request::builder()
            .method(method)
            .uri(path)
            .header("host", "docker")
            .header("user-agent", "ecoroute-infra/0.1")
            .body(Empty::<Bytes>::new())
            .map_err(|e| InfrastructureError::Request(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| InfrastructureError::Request(format!("{path}: {e}")))?;

        let status = resp.status();
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| InfrastructureError::Request(format!("{path}: reading body: {e}")))?
            .to_bytes();

        Ok((status, body))
    }

    async fn lifecycle(&self, id: &str, verb: &str) -> InfraResult<()> {
        let path = format!("/containers/{id}/{verb}");
        let (status, body) = self.request(Method::POST, &path).await?;
        match status {
            // 304: already in the requested state.
            StatusCode::NOT_MODIFIED => {
                debug!(container = id, verb, "container already in requested state");
                Ok(())
            }
            StatusCode::NOT_FOUND => Err(InfrastructureError::TargetNotFound(id.to_string())),
            _ => check_status(status, &body),
        }
    }
}

impl ControlPlane for DockerControlPlane {
    fn list_targets(&self) -> BoxFuture<'_, InfraResult<Vec<ManagedTarget>>> {
        Box::pin(async move {
            let (status, body) = self.request(Method::GET, "/containers/json?all=true").await?;
            check_status(status, &body)?;
            parse_container_list(&body)
        })
    }

    fn start<'a>(&'a self, id: &'a str) -> BoxFuture<'a, InfraResult<()>> {
        Box::pin(self.lifecycle(id, "start"))
    }

    fn stop<'a>(&'a self, id: &'a str) -> BoxFuture<'a, InfraResult<()>> {
        Box::pin(self.lifecycle(id, "stop"))
    }

    fn status<'a>(&'a self, id: &'a str) -> BoxFuture<'a, InfraResult<TargetState>> {
        Box::pin(async move {
            let (status, body) = self.request(Method::GET, &format!("/containers/{id}/json")).await?;
            if status == StatusCode::NOT_FOUND {
                return Ok(TargetState::NotFound);
            }
            check_status(status, &body)?;
            let inspect: ContainerInspect = serde_json::from_slice(&body)
                .map_err(|e| InfrastructureError::Decode(e.to_string()))?;
            Ok(map_state(&inspect.state.status))
        })
    }
}

fn check_status(status: StatusCode, body: &[u8]) -> InfraResult<()> {
    if status.is_success() {
        return Ok(());
    }
    let message = serde_json::from_slice::<ApiMessage>(body)
        .map(|m| m.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).trim().to_string());
    Err(InfrastructureError::Api {
        status: status.as_u16(),
        message,
    })
}

fn parse_container_list(body: &[u8]) -> InfraResult<Vec<ManagedTarget>> {
    let containers: Vec<ContainerSummary> =
        serde_json::from_slice(body).map_err(|e| InfrastructureError::Decode(e.to_string()))?;

    Ok(containers
        .into_iter()
        .map(|c| ManagedTarget {
            name: c
                .names
                .first()
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_else(|| c.id.clone()),
            state: map_state(&c.state),
            id: c.id,
        })
        .collect())
}

/// Map a Docker container state string onto [`TargetState`].
pub fn map_state(state: &str) -> TargetState {
    match state {
        "running" => TargetState::Running,
        "created" | "exited" | "dead" => TargetState::Stopped,
        _ => TargetState::Unknown,
    }
}
