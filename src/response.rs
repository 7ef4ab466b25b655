use std::borrow::Cow;

use crate::headers::HeaderMap;
use crate::version::Version;

/// A single pull from a [`Body`] producer.
///
/// A tagged signal rather than a null-vs-empty-buffer distinction (see
/// `DESIGN.md`'s Open Question decisions): `Data(vec![])` is a legitimate
/// non-terminal chunk the serializer must immediately re-request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Data(Vec<u8>),
    End,
}

/// A finite, non-restartable, lazily-pulled response body.
///
/// `len()` must be stable for the lifetime of the producer: the serializer
/// reads it exactly once, before the first call to `next_chunk`, to build
/// the `Content-Length` header. Each call to `next_chunk` may invalidate
/// whatever the previous call returned; there is no aliasing requirement
/// across calls.
pub trait Body {
    /// Total byte length this body will yield before signalling `Chunk::End`.
    fn len(&self) -> u64;

    /// Pull the next chunk. Once this returns `Chunk::End` it must keep
    /// returning `Chunk::End` on any further call.
    fn next_chunk(&mut self) -> Chunk;
}

/// A body that is already fully materialised in memory.
pub struct FixedBody {
    data: Vec<u8>,
    offset: usize,
}

impl FixedBody {
    pub fn new(data: Vec<u8>) -> FixedBody {
        FixedBody { data, offset: 0 }
    }
}

impl Body for FixedBody {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn next_chunk(&mut self) -> Chunk {
        if self.offset >= self.data.len() {
            Chunk::End
        } else {
            let chunk = self.data[self.offset..].to_vec();
            self.offset = self.data.len();
            Chunk::Data(chunk)
        }
    }
}

/// The zero-length body, used by default and for responses with no entity.
pub struct EmptyBody;

impl Body for EmptyBody {
    fn len(&self) -> u64 {
        0
    }

    fn next_chunk(&mut self) -> Chunk {
        Chunk::End
    }
}

/// An owned, application-supplied response.
///
/// Produced by the handler at `headers-complete` (for `SkipBody`) or at
/// `message-complete`, and handed to the engine's response queue. The
/// engine is responsible for computing `Content-Length` from `body.len()`
/// and for emitting the `Connection` header; neither should be set here.
pub struct Response {
    pub version: Version,
    pub status: u16,
    pub message: Cow<'static, str>,
    pub headers: HeaderMap,
    pub body: Box<dyn Body + Send>,
}

impl Response {
    pub fn new(version: Version, status: u16, message: impl Into<Cow<'static, str>>) -> Response {
        Response {
            version,
            status,
            message: message.into(),
            headers: HeaderMap::new(),
            body: Box::new(EmptyBody),
        }
    }

    pub fn with_body(mut self, body: impl Body + Send + 'static) -> Response {
        self.body = Box::new(body);
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Response {
        self.headers.insert_or_fold(name, &value.into());
        self
    }
}
