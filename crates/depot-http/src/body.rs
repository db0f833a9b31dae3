//! Response bodies.
//!
//! Downloads are read whole from the blob store, so every Depot body is either
//! a complete buffer (file bytes or a JSON document) or nothing at all (the 204
//! preflight).

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::Full;

/// Body of every response the service writes.
#[derive(Debug, Default)]
pub enum DepotResponseBody {
    /// File bytes or a serialized JSON document.
    Buffered(Full<Bytes>),
    /// Preflight and other bodiless replies.
    #[default]
    Empty,
}

impl DepotResponseBody {
    /// Wrap downloaded file bytes.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::Buffered(Full::new(data.into()))
    }

    /// No body.
    #[must_use]
    pub fn empty() -> Self {
        Self::Empty
    }

    /// Wrap output of `serde_json::to_vec`.
    #[must_use]
    pub fn from_json(json: Vec<u8>) -> Self {
        Self::Buffered(Full::new(Bytes::from(json)))
    }
}

impl http_body::Body for DepotResponseBody {
    type Data = Bytes;
    type Error = std::io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        match self.get_mut() {
            Self::Buffered(full) => Pin::new(full)
                .poll_frame(cx)
                .map_err(|never| match never {}),
            Self::Empty => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Self::Buffered(full) => full.is_end_stream(),
            Self::Empty => true,
        }
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match self {
            Self::Buffered(full) => full.size_hint(),
            Self::Empty => http_body::SizeHint::with_exact(0),
        }
    }
}
