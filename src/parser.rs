use std::str;

use httparse;

use crate::error::Error;
use crate::headers::{self, HeaderMap};
use crate::request::Request;

/// Maximum number of header fields accepted on one request.
pub const MAX_HEADERS: usize = 64;

/// A parsed request line plus header block, plus everything the engine
/// needs to drive the body phase and compose the eventual response.
pub struct ParsedHead {
    pub request: Request,
    /// Bytes of the accumulation buffer this head consumed; the caller must
    /// `consume` them before looking for body bytes.
    pub consumed: usize,
    pub content_length: u64,
    pub keep_alive: bool,
}

/// Result of attempting to parse a header block from the front of a buffer.
pub enum HeadResult {
    /// Not enough bytes buffered yet.
    Partial,
    Complete(ParsedHead),
}

/// Per-connection parsing state: are we between messages, or part-way
/// through a request body whose length we already know?
enum State {
    Idle,
    InBody { remaining: u64 },
}

/// Incremental HTTP/1.x request parser.
///
/// Wraps `httparse::Request` for the header block and tracks a
/// `Content-Length`-driven countdown for the body across however many
/// reads it takes to arrive. Chunked request bodies are rejected outright
/// (see `DESIGN.md`): this crate carries no chunked decoder.
pub struct ByteParser {
    state: State,
}

impl ByteParser {
    pub fn new() -> ByteParser {
        ByteParser { state: State::Idle }
    }

    /// `true` once the previous message's body (if any) has been fully
    /// accounted for and the parser is ready to read a new request line.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    pub fn body_remaining(&self) -> u64 {
        match self.state {
            State::Idle => 0,
            State::InBody { remaining } => remaining,
        }
    }

    /// Parse a request line and header block from the front of `data`.
    ///
    /// Must only be called while `is_idle()`.
    pub fn parse_head(&mut self, data: &[u8]) -> Result<HeadResult, Error> {
        debug_assert!(self.is_idle());
        let mut raw_headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Request::new(&mut raw_headers);
        let consumed = match parsed.parse(data) {
            Ok(httparse::Status::Complete(n)) => n,
            Ok(httparse::Status::Partial) => return Ok(HeadResult::Partial),
            Err(e) => return Err(Error::Parse(e)),
        };

        let method = parsed.method.unwrap_or("").to_string();
        let target = parsed.path.unwrap_or("").to_string();
        let minor = parsed.version.unwrap_or(1);
        let version = if minor == 0 { "1.0".to_string() } else { "1.1".to_string() };

        let mut folded = HeaderMap::new();
        let mut content_length: Option<u64> = None;
        let mut saw_transfer_encoding = false;
        let mut saw_content_length_lines = 0usize;

        for h in parsed.headers.iter() {
            let value = str::from_utf8(h.value).unwrap_or("").trim();
            if h.name.eq_ignore_ascii_case("Content-Length") {
                saw_content_length_lines += 1;
                let parsed_len: u64 = value.parse().map_err(|_| Error::BadContentLength)?;
                match content_length {
                    None => content_length = Some(parsed_len),
                    Some(existing) if existing == parsed_len => {}
                    Some(_) => return Err(Error::DuplicateContentLength),
                }
            }
            if h.name.eq_ignore_ascii_case("Transfer-Encoding") {
                saw_transfer_encoding = true;
                if headers::is_chunked(h.value) {
                    return Err(Error::ChunkedRequestBody);
                }
            }
            folded.insert_or_fold(h.name, value);
        }
        let _ = saw_transfer_encoding;
        let _ = saw_content_length_lines;

        let keep_alive = keep_alive_eligible(minor == 0, folded.get("Connection"));
        let content_length = content_length.unwrap_or(0);

        let request = Request::new(method, target, version, folded);
        Ok(HeadResult::Complete(ParsedHead {
            request,
            consumed,
            content_length,
            keep_alive,
        }))
    }

    /// Enter the body-reading state for a message with the given
    /// `Content-Length`. Called right after `parse_head` returns `Complete`.
    pub fn begin_body(&mut self, content_length: u64) {
        self.state = State::InBody { remaining: content_length };
    }

    /// Finalize parsing once the peer's read side is known to have reached
    /// end-of-stream. A message still `InBody` at this point can never be
    /// completed (no more bytes are coming): that is a truncated request,
    /// reported the same way any other malformed input would be.
    pub fn finish(&self) -> Result<(), Error> {
        if self.is_idle() {
            Ok(())
        } else {
            Err(Error::TruncatedRequest)
        }
    }

    /// Account for `n` bytes of body having been delivered to the handler.
    ///
    /// Returns `true` once the body (and therefore the message) is
    /// complete, in which case the parser returns to `is_idle()`.
    ///
    /// # Panics
    /// Panics if called while idle, or with more bytes than remain.
    pub fn consume_body(&mut self, n: u64) -> bool {
        match self.state {
            State::InBody { ref mut remaining } => {
                assert!(n <= *remaining, "consumed more body bytes than declared");
                *remaining -= n;
                let done = *remaining == 0;
                if done {
                    self.state = State::Idle;
                }
                done
            }
            State::Idle => panic!("consume_body called while parser is idle"),
        }
    }
}

impl Default for ByteParser {
    fn default() -> ByteParser {
        ByteParser::new()
    }
}

/// HTTP/1.1 defaults to keep-alive absent `Connection: close`; HTTP/1.0
/// defaults to close absent `Connection: keep-alive`.
fn keep_alive_eligible(is_http10: bool, connection_header: Option<&str>) -> bool {
    match connection_header {
        Some(v) if headers::is_close(v.as_bytes()) => false,
        Some(v) if v.trim().eq_ignore_ascii_case("keep-alive") => true,
        _ => !is_http10,
    }
}
