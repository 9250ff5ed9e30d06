use async_trait::async_trait;

use crate::error::FeedError;

/// Opens streaming connections to a market-data endpoint.
///
/// The connection manager owns exactly one transport and calls `open` for
/// the initial connect and for every reconnect attempt. The returned future
/// may be dropped mid-handshake when the caller disconnects.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Stream: FeedStream + 'static;

    /// Establish a new connection to `url`
    async fn open(&self, url: &str) -> Result<Self::Stream, FeedError>;
}

/// One live connection delivering text payloads in arrival order.
#[async_trait]
pub trait FeedStream: Send {
    /// Next text payload.
    ///
    /// `Ok(None)` means the peer closed the connection. Must be cancel-safe:
    /// the driver polls it inside `select!` next to its timers.
    async fn recv(&mut self) -> Result<Option<String>, FeedError>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), FeedError>;
}
