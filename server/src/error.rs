use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Every slot is occupied; the connection gets `Server full` and is closed.
    #[error("server full ({0} players connected)")]
    CapacityExceeded(usize),

    /// A read or write on a peer failed or timed out, or its send queue overflowed.
    #[error("peer disconnected: {0}")]
    PeerDisconnected(#[source] io::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ServerError {
    /// Write to a peer did not finish in time.
    pub fn write_timeout() -> Self {
        ServerError::PeerDisconnected(io::Error::new(
            io::ErrorKind::TimedOut,
            "write to peer timed out",
        ))
    }

    /// Peer's outbound queue is full; it has fallen too far behind.
    pub fn queue_full() -> Self {
        ServerError::PeerDisconnected(io::Error::new(
            io::ErrorKind::Other,
            "send queue full",
        ))
    }
}
