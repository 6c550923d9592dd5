//! Request body plumbing for the dispatcher's hyper client.

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The body type dispatched requests carry. Callers with streaming bodies
/// box them via [`BodyExt::boxed`]; complete bodies use the helpers below.
pub type DispatchBody = BoxBody<Bytes, BoxError>;

/// An empty request body.
pub fn empty() -> DispatchBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}

/// A complete in-memory request body.
pub fn from_bytes(bytes: impl Into<Bytes>) -> DispatchBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed()
}
