use std::net::SocketAddr;

use thiserror::Error;

/// Start-up failures of the network receiver. Steady-state read errors are
/// absorbed by the read loop and never surface here.
#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("receiver already started")]
    AlreadyStarted,
    #[error("failed to spawn receive thread: {0}")]
    Spawn(std::io::Error),
}
