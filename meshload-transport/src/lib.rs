//! ## meshload-transport
//! **HTTP adapter for the interpreter**
//!
//! Every simulated service is reachable as `{scheme}://{name}:{port}/`, with
//! name resolution left to DNS. A request is a `POST` whose body is `size`
//! zero bytes, carrying the forwarded trace headers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use meshload_core::{HeaderSet, Transport, TransportError, TransportResponse};
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::trace;

/// Zero-filled buffer that every request body is sliced from.
///
/// It only ever grows, to the largest size requested so far. Bodies in
/// flight keep the buffer they were sliced from alive.
#[derive(Debug, Default)]
pub struct ZeroPayload {
    zeros: Mutex<Bytes>,
}

impl ZeroPayload {
    pub fn body(&self, len: usize) -> Bytes {
        let mut zeros = self.zeros.lock();
        if zeros.len() < len {
            *zeros = Bytes::from(vec![0u8; len]);
        }
        zeros.slice(..len)
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    scheme: String,
    port: u16,
    payload: Arc<ZeroPayload>,
}

impl HttpTransport {
    pub fn new(scheme: &str, port: u16, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(Box::new(e)))?;
        Ok(Self {
            client,
            scheme: scheme.to_string(),
            port,
            payload: Arc::new(ZeroPayload::default()),
        })
    }

    pub fn url_for(&self, destination: &str) -> String {
        format!("{}://{}:{}/", self.scheme, destination, self.port)
    }
}

fn header_map(headers: &HeaderSet) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| TransportError::InvalidHeader(name.to_string()))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| TransportError::InvalidHeader(name.to_string()))?;
        map.append(header_name, header_value);
    }
    Ok(map)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        destination: &str,
        size: u64,
        headers: &HeaderSet,
    ) -> Result<Box<dyn TransportResponse>, TransportError> {
        let headers = header_map(headers)?;
        let len = usize::try_from(size).map_err(|e| TransportError::Request(Box::new(e)))?;
        let url = self.url_for(destination);
        trace!(%url, size, "sending request");

        let response = self
            .client
            .post(url)
            .headers(headers)
            .body(self.payload.body(len))
            .send()
            .await
            .map_err(|e| TransportError::Request(Box::new(e)))?;

        Ok(Box::new(HttpResponse { inner: response }))
    }
}

/// Response whose body has not been read yet.
pub struct HttpResponse {
    inner: reqwest::Response,
}

#[async_trait]
impl TransportResponse for HttpResponse {
    fn status(&self) -> u16 {
        self.inner.status().as_u16()
    }

    async fn drain(mut self: Box<Self>) -> Result<u64, TransportError> {
        let mut discarded = 0u64;
        while let Some(chunk) = self
            .inner
            .chunk()
            .await
            .map_err(|e| TransportError::Body(Box::new(e)))?
        {
            discarded += chunk.len() as u64;
        }
        Ok(discarded)
    }
}
