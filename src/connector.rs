use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{event, Level};

use crate::error::NodeError;

/// Performs outbound dials on behalf of the peer table.
///
/// No retries happen at this layer. A failed or timed-out dial is
/// reported to the caller, which records the failure; any reconnection
/// policy belongs to a higher-level loop.
#[derive(Clone)]
pub struct Connector {
    dial_timeout: Duration,
}

impl Connector {
    pub fn new(dial_timeout: Duration) -> Connector {
        Connector { dial_timeout }
    }

    pub fn get_dial_timeout(&self) -> Duration {
        self.dial_timeout
    }

    /// Attempt a TCP connection to `address`, bounded by the configured
    /// timeout. The stream is dropped on success; the dial only proves
    /// the peer is accepting connections.
    pub async fn dial(&self, address: SocketAddr) -> std::result::Result<(), NodeError> {
        match timeout(self.dial_timeout, TcpStream::connect(address)).await {
            Ok(Ok(_stream)) => {
                event!(Level::INFO, "dialed {}", address);
                Ok(())
            }
            Ok(Err(err)) => Err(NodeError::Dial(format!("{}: {}", address, err))),
            Err(_) => Err(NodeError::Dial(format!(
                "{}: timed out after {:?}",
                address, self.dial_timeout
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn dial_with_nothing_listening_fails() {
        let connector = Connector::new(Duration::from_millis(500));
        let result = connector.dial("127.0.0.1:13321".parse().unwrap()).await;
        assert!(matches!(result, Err(NodeError::Dial(_))));
    }

    #[tokio::test]
    async fn dial_to_live_listener_succeeds() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connector = Connector::new(Duration::from_millis(500));
        assert!(connector.dial(addr).await.is_ok());
    }
}
