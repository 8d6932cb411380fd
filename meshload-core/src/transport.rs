//! ## meshload-core::transport
//! **Boundary to the network**
//!
//! The interpreter only needs to "send a sized request with these headers and
//! tell me the status". Everything about connections, timeouts and URLs lives
//! behind [`Transport`].

use async_trait::async_trait;
use thiserror::Error;

use crate::headers::HeaderSet;

/// Status code treated as a successful call.
pub const STATUS_OK: u16 = 200;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid header '{0}'")]
    InvalidHeader(String),

    #[error("request failed: {0}")]
    Request(#[source] BoxError),

    #[error("failed to read response body: {0}")]
    Body(#[source] BoxError),
}

/// A response whose body must be drained before the connection is reused.
#[async_trait]
pub trait TransportResponse: Send {
    fn status(&self) -> u16;

    /// Reads the remaining body to the end and releases it.
    /// Returns the number of bytes discarded.
    async fn drain(self: Box<Self>) -> Result<u64, TransportError>;
}

/// Performs one outbound call on behalf of a request command.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        destination: &str,
        size: u64,
        headers: &HeaderSet,
    ) -> Result<Box<dyn TransportResponse>, TransportError>;
}
