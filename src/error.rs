use thiserror::Error;

/// Typed failures surfaced through the RPC dispatcher.
///
/// Every operation returns either a typed payload or one of these, so
/// callers branch on the kind rather than parsing message strings.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("refusing to connect to own listen address")]
    SelfConnection,
    #[error("peer {0} is already connected")]
    AlreadyConnected(String),
    #[error("unknown peer {0}")]
    UnknownPeer(String),
    #[error("dial failed: {0}")]
    Dial(String),
    #[error("payload exceeds the configured cap of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },
    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),
    #[error("ingress queue is full")]
    QueueFull,
    #[error("unknown method")]
    UnknownMethod,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl NodeError {
    /// Stable wire identifier for this error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            NodeError::InvalidAddress(_) => "invalid-address",
            NodeError::SelfConnection => "self-connection",
            NodeError::AlreadyConnected(_) => "already-connected",
            NodeError::UnknownPeer(_) => "unknown-peer",
            NodeError::Dial(_) => "dial-error",
            NodeError::PayloadTooLarge { .. } => "payload-too-large",
            NodeError::MalformedTransaction(_) => "malformed-transaction",
            NodeError::QueueFull => "queue-full",
            NodeError::UnknownMethod => "unknown-method",
            NodeError::Transport(_) => "transport-error",
            NodeError::Internal(_) => "internal-error",
        }
    }
}
