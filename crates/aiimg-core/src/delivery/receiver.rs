use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use aiimg_types::DeliveryError;

use super::wire::{self, PushReply, DEFAULT_MAX_PAYLOAD};
use crate::artifact::{is_artifact_name, ArtifactStore, PARTIAL_SUFFIX};
use crate::error::AppResult;

const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Push-protocol server writing received artifacts into an [`ArtifactStore`]
/// directory. Each connection carries one file and is handled on its own task.
pub struct PushReceiver {
    listener: TcpListener,
    store: ArtifactStore,
    max_payload: u64,
    timeout: Duration,
}

impl PushReceiver {
    pub async fn bind<A: ToSocketAddrs>(addr: A, store: ArtifactStore) -> AppResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            store,
            max_payload: DEFAULT_MAX_PAYLOAD,
            timeout: DEFAULT_CONNECTION_TIMEOUT,
        })
    }

    pub fn with_max_payload(mut self, max_payload: u64) -> Self {
        self.max_payload = max_payload;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn local_addr(&self) -> AppResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) -> AppResult<()> {
        tokio::fs::create_dir_all(self.store.dir()).await?;
        info!(
            addr = %self.local_addr()?,
            dir = %self.store.dir().display(),
            "Push receiver listening"
        );

        loop {
            let (stream, peer) = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Push receiver shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
            };

            let store = self.store.clone();
            let max_payload = self.max_payload;
            let timeout = self.timeout;
            tokio::spawn(async move {
                match tokio::time::timeout(timeout, handle_connection(stream, &store, max_payload)).await {
                    Ok(Ok(path)) => {
                        info!(peer = %peer, "Received artifact {}", path.display());
                        store.cleanup(SystemTime::now()).await;
                    },
                    Ok(Err(e)) => warn!(peer = %peer, "Push failed: {}", e),
                    Err(_) => warn!(peer = %peer, "Push timed out after {}s", timeout.as_secs()),
                }
            });
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    store: &ArtifactStore,
    max_payload: u64,
) -> Result<PathBuf, DeliveryError> {
    let header = wire::read_header(&mut stream)
        .await
        .map_err(|e| DeliveryError::Protocol { message: e.to_string() })?;
    debug!(name = %header.name, bytes = header.payload_len, "Push header received");

    let path = store.dir().join(&header.name);
    let verdict = wire::validate_name(&header.name).and_then(|()| {
        if !is_artifact_name(&header.name) {
            return Err(format!("{} is not an artifact name", header.name));
        }
        if header.payload_len > max_payload {
            return Err(format!(
                "payload of {} bytes exceeds limit of {} bytes",
                header.payload_len, max_payload
            ));
        }
        Ok(())
    });
    if let Err(reason) = verdict {
        reject(&mut stream, &reason, header.payload_len).await;
        return Err(DeliveryError::Rejected { reason });
    }
    if tokio::fs::try_exists(&path).await.unwrap_or(true) {
        let reason = format!("{} already exists", header.name);
        reject(&mut stream, &reason, header.payload_len).await;
        return Err(DeliveryError::Rejected { reason });
    }

    let partial = partial_path(&path);
    let file = match OpenOptions::new().write(true).create_new(true).open(&partial).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            let reason = format!("{} is already being received", header.name);
            reject(&mut stream, &reason, header.payload_len).await;
            return Err(DeliveryError::Rejected { reason });
        },
        Err(e) => return Err(store_failed(&mut stream, &header.name, e).await),
    };

    match receive_file(&mut stream, file, &partial, &path, header.payload_len).await {
        Ok(()) => {
            let reply = PushReply::Stored { path: path.display().to_string() };
            wire::write_reply(&mut stream, &reply)
                .await
                .map_err(|e| DeliveryError::Transmission { message: e.to_string() })?;
            Ok(path)
        },
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            let reason = format!("{} already exists", header.name);
            warn!("Rejecting push: {}", reason);
            let _ = wire::write_reply(&mut stream, &PushReply::Rejected { reason: reason.clone() }).await;
            Err(DeliveryError::Rejected { reason })
        },
        Err(e) => Err(store_failed(&mut stream, &header.name, e).await),
    }
}

async fn store_failed(stream: &mut TcpStream, name: &str, e: io::Error) -> DeliveryError {
    error!(name = %name, "Failed to store pushed artifact: {}", e);
    let reply = PushReply::Rejected { reason: format!("receiver could not store file: {}", e) };
    let _ = wire::write_reply(stream, &reply).await;
    DeliveryError::Transmission { message: e.to_string() }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut partial_name = path.as_os_str().to_owned();
    partial_name.push(PARTIAL_SUFFIX);
    PathBuf::from(partial_name)
}

/// Stream exactly `len` bytes into `partial`, then link it in as `path`.
/// Linking fails with `AlreadyExists` rather than replacing a stored file.
async fn receive_file(
    stream: &mut TcpStream,
    mut file: tokio::fs::File,
    partial: &Path,
    path: &Path,
    len: u64,
) -> io::Result<()> {
    let result = async {
        let copied = tokio::io::copy(&mut (&mut *stream).take(len), &mut file).await?;
        if copied != len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("connection closed after {} of {} bytes", copied, len),
            ));
        }
        file.sync_all().await?;
        drop(file);
        tokio::fs::hard_link(partial, path).await
    }
    .await;

    let _ = tokio::fs::remove_file(partial).await;
    result
}

/// Reply with a rejection, then discard the announced payload so the client
/// can finish writing and read the reply. Bounded by the connection timeout.
async fn reject(stream: &mut TcpStream, reason: &str, drain: u64) {
    warn!("Rejecting push: {}", reason);
    let reply = PushReply::Rejected { reason: reason.to_string() };
    if wire::write_reply(stream, &reply).await.is_err() {
        return;
    }
    let _ = stream.shutdown().await;
    let _ = tokio::io::copy(&mut (&mut *stream).take(drain), &mut tokio::io::sink()).await;
}
