use std::io;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use aiimg_types::{DeliveryConfig, DeliveryError};

use super::wire::{self, PushReply};
use super::{is_local_host, DeliveredReference};
use crate::artifact::ArtifactHandle;

/// Hands an artifact to its consumer, pushing it when the consumer is remote.
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    host: Option<String>,
    port: Option<u16>,
    timeout: Duration,
}

impl DeliveryClient {
    pub fn new(config: &DeliveryConfig) -> Self {
        Self {
            host: config.host.clone().filter(|h| !h.trim().is_empty()),
            port: config.port,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn is_local(&self) -> bool {
        is_local_host(self.host.as_deref())
    }

    /// Local path for same-host consumers, otherwise push to the receiver.
    pub async fn deliver(&self, handle: &ArtifactHandle) -> Result<DeliveredReference, DeliveryError> {
        let host = match self.host.as_deref() {
            Some(host) if !is_local_host(Some(host)) => host,
            _ => {
                debug!(artifact = %handle.id, "Consumer is local, returning path");
                return Ok(DeliveredReference::Local(handle.path.clone()));
            },
        };
        let port = self.port.ok_or_else(|| DeliveryError::MissingPort { host: host.to_string() })?;
        self.push(host, port, handle).await
    }

    /// Push `handle` to the receiver at `host:port`, regardless of locality.
    pub async fn push(
        &self,
        host: &str,
        port: u16,
        handle: &ArtifactHandle,
    ) -> Result<DeliveredReference, DeliveryError> {
        let payload = tokio::fs::read(&handle.path)
            .await
            .map_err(|e| DeliveryError::Io { message: e.to_string() })?;

        let target = format!("{}:{}", host, port);
        info!(artifact = %handle.id, target = %target, bytes = payload.len(), "Pushing artifact");

        let exchange = push_bytes(&target, &handle.id, &payload);
        let reply = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| DeliveryError::Timeout { secs: self.timeout.as_secs() })??;

        match reply {
            PushReply::Stored { path } => {
                info!(artifact = %handle.id, target = %target, "Receiver stored artifact at {}", path);
                Ok(DeliveredReference::Remote { host: host.to_string(), path })
            },
            PushReply::Rejected { reason } => {
                warn!(artifact = %handle.id, target = %target, "Receiver rejected artifact: {}", reason);
                Err(DeliveryError::Rejected { reason })
            },
        }
    }
}

async fn push_bytes(target: &str, name: &str, payload: &[u8]) -> Result<PushReply, DeliveryError> {
    let mut stream = TcpStream::connect(target).await.map_err(|e| DeliveryError::ConnectionFailed {
        target: target.to_string(),
        message: e.to_string(),
    })?;

    let sent = wire::write_push(&mut stream, name, payload).await;

    // A receiver that rejects early may reset the stream mid-write but
    // still leave its reply readable.
    match (sent, wire::read_reply(&mut stream).await) {
        (_, Ok(PushReply::Rejected { reason })) => Ok(PushReply::Rejected { reason }),
        (Ok(()), Ok(reply)) => Ok(reply),
        (Err(e), _) => Err(DeliveryError::Transmission { message: e.to_string() }),
        (Ok(()), Err(e)) => Err(reply_error(e)),
    }
}

fn reply_error(e: io::Error) -> DeliveryError {
    match e.kind() {
        io::ErrorKind::InvalidData => DeliveryError::Protocol { message: e.to_string() },
        io::ErrorKind::UnexpectedEof => {
            DeliveryError::Transmission { message: "receiver closed the connection without a reply".to_string() }
        },
        _ => DeliveryError::Transmission { message: e.to_string() },
    }
}
