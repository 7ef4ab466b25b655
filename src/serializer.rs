use std::io::{self, Write};

use log::warn;
use netbuf::Buf;

use crate::connection::Connection;
use crate::error::Error;
use crate::response::{Chunk, Response};

/// Explicit phases a [`PendingResponse`] moves through. Modeled as a loop
/// with `continue` on transition (see `DESIGN.md`) rather than the
/// `match`-fall-through the teacher's C ancestor relied on.
#[derive(Debug, PartialEq, Eq)]
enum Phase {
    New,
    Header,
    Body,
}

/// What happened after one call into [`ResponseSerializer::advance`].
#[derive(Debug, PartialEq, Eq)]
pub enum Progress {
    /// The connection reported would-block; call again once writable.
    Pending,
    /// The response has been fully written to the wire.
    Done,
}

/// A response the application has handed off, plus the cursor tracking how
/// much of it has reached the wire.
pub struct PendingResponse {
    response: Response,
    is_head: bool,
    keep_alive: bool,
    phase: Phase,
    header_buf: Buf,
    header_sent: usize,
    body_chunk: Option<Vec<u8>>,
    body_sent: usize,
    /// Total body bytes actually written to the wire so far, checked against
    /// `response.body.len()` once the body producer signals `Chunk::End`.
    body_written: u64,
}

impl PendingResponse {
    pub fn new(response: Response, is_head: bool, keep_alive: bool) -> PendingResponse {
        PendingResponse {
            response,
            is_head,
            keep_alive,
            phase: Phase::New,
            header_buf: Buf::new(),
            header_sent: 0,
            body_chunk: None,
            body_sent: 0,
            body_written: 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Body && self.body_chunk.is_none()
    }
}

/// Builds the header block in the exact order spec.md §4.3 requires, and
/// drives one `PendingResponse` through `New -> Header -> Body` against a
/// non-blocking `Connection`.
pub struct ResponseSerializer;

impl ResponseSerializer {
    /// Advance `pending` as far as it will go without blocking.
    ///
    /// Writes at most until the connection reports would-block or the
    /// response is fully sent. A write error is fatal: it is logged and
    /// the connection is fully shut down before the error is returned.
    pub fn advance(pending: &mut PendingResponse, conn: &mut dyn Connection) -> Result<Progress, Error> {
        loop {
            match pending.phase {
                Phase::New => {
                    build_header_block(pending);
                    pending.phase = Phase::Header;
                    continue;
                }
                Phase::Header => {
                    if pending.header_sent < pending.header_buf.len() {
                        match write_some(conn, &pending.header_buf[pending.header_sent..]) {
                            Ok(Some(n)) => {
                                pending.header_sent += n;
                                continue;
                            }
                            Ok(None) => return Ok(Progress::Pending),
                            Err(e) => {
                                fail(conn, &e);
                                return Err(e);
                            }
                        }
                    }
                    start_body(pending);
                    pending.phase = Phase::Body;
                    continue;
                }
                Phase::Body => {
                    match pending.body_chunk.take() {
                        None => {
                            // A producer that over- or under-delivers bytes
                            // relative to its declared `len()` would break
                            // the `Content-Length` already written to the
                            // wire; HEAD suppresses the body outright, so
                            // the count never advances past zero there.
                            if !pending.is_head {
                                debug_assert_eq!(
                                    pending.body_written,
                                    pending.response.body.len(),
                                    "body producer wrote {} bytes but declared len() == {}",
                                    pending.body_written,
                                    pending.response.body.len(),
                                );
                            }
                            return Ok(Progress::Done);
                        }
                        Some(chunk) => {
                            if pending.body_sent >= chunk.len() {
                                // Fully-sent chunk (including legitimately
                                // empty ones): pull the next one.
                                pending.body_sent = 0;
                                request_next_chunk(pending);
                                continue;
                            }
                            match write_some(conn, &chunk[pending.body_sent..]) {
                                Ok(Some(n)) => {
                                    pending.body_sent += n;
                                    pending.body_written += n as u64;
                                    let done = pending.body_sent >= chunk.len();
                                    pending.body_chunk = Some(chunk);
                                    if done {
                                        pending.body_sent = 0;
                                        request_next_chunk(pending);
                                    }
                                    continue;
                                }
                                Ok(None) => {
                                    pending.body_chunk = Some(chunk);
                                    return Ok(Progress::Pending);
                                }
                                Err(e) => {
                                    pending.body_chunk = Some(chunk);
                                    fail(conn, &e);
                                    return Err(e);
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn start_body(pending: &mut PendingResponse) {
    if pending.is_head {
        pending.body_chunk = None;
    } else {
        request_next_chunk(pending);
    }
}

fn request_next_chunk(pending: &mut PendingResponse) {
    match pending.response.body.next_chunk() {
        Chunk::Data(data) => pending.body_chunk = Some(data),
        Chunk::End => pending.body_chunk = None,
    }
}

fn build_header_block(pending: &mut PendingResponse) {
    let buf = &mut pending.header_buf;
    write!(buf, "{} {} {}\r\n",
        pending.response.version, pending.response.status, pending.response.message).unwrap();
    if pending.keep_alive {
        buf.write_all(b"Connection: keep-alive\r\n").unwrap();
    } else {
        buf.write_all(b"Connection: close\r\n").unwrap();
    }
    write!(buf, "Content-Length: {}\r\n", pending.response.body.len()).unwrap();
    for (name, value) in pending.response.headers.iter() {
        buf.write_all(name.as_bytes()).unwrap();
        buf.write_all(b": ").unwrap();
        buf.write_all(value.as_bytes()).unwrap();
        buf.write_all(b"\r\n").unwrap();
    }
    buf.write_all(b"\r\n").unwrap();
}

/// Attempt one write. `Ok(None)` means would-block; any other error is
/// wrapped as a fatal `Error::Io`.
fn write_some(conn: &mut dyn Connection, data: &[u8]) -> Result<Option<usize>, Error> {
    match conn.write(data) {
        Ok(n) => Ok(Some(n)),
        Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(e) => Err(Error::Io(e)),
    }
}

fn fail(conn: &mut dyn Connection, err: &Error) {
    warn!("write error, closing connection: {}", err);
    conn.shutdown(true, true);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::response::{EmptyBody, FixedBody};
    use crate::version::Version;
    use std::collections::VecDeque;

    struct MockConn {
        written: Vec<u8>,
        write_caps: VecDeque<usize>,
        shutdown_read: bool,
        shutdown_write: bool,
    }

    impl MockConn {
        fn unbounded() -> MockConn {
            MockConn { written: Vec::new(), write_caps: VecDeque::new(), shutdown_read: false, shutdown_write: false }
        }

        fn capped(caps: Vec<usize>) -> MockConn {
            MockConn { written: Vec::new(), write_caps: caps.into(), shutdown_read: false, shutdown_write: false }
        }
    }

    impl Connection for MockConn {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::WouldBlock, "no data"))
        }

        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let cap = match self.write_caps.pop_front() {
                Some(0) => return Err(io::Error::new(io::ErrorKind::WouldBlock, "full")),
                Some(c) => c,
                None => buf.len(),
            };
            let n = cap.min(buf.len());
            self.written.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn set_read_interest(&mut self, _interest: bool) {}
        fn set_write_interest(&mut self, _interest: bool) {}

        fn shutdown(&mut self, read: bool, write: bool) {
            self.shutdown_read |= read;
            self.shutdown_write |= write;
        }

        fn is_read_closed(&self) -> bool { self.shutdown_read }
        fn is_write_closed(&self) -> bool { self.shutdown_write }
    }

    fn response(body: impl crate::response::Body + Send + 'static) -> Response {
        Response::new(Version::Http11, 200, "OK").with_body(body)
    }

    #[test]
    fn header_block_order_and_empty_body() {
        let mut pending = PendingResponse::new(response(EmptyBody), false, true);
        let mut conn = MockConn::unbounded();
        assert_eq!(ResponseSerializer::advance(&mut pending, &mut conn).unwrap(), Progress::Done);
        assert_eq!(
            String::from_utf8(conn.written).unwrap(),
            "HTTP/1.1 200 OK\r\nConnection: keep-alive\r\nContent-Length: 0\r\n\r\n");
    }

    #[test]
    fn close_connection_header() {
        let mut pending = PendingResponse::new(response(EmptyBody), false, false);
        let mut conn = MockConn::unbounded();
        ResponseSerializer::advance(&mut pending, &mut conn).unwrap();
        assert!(String::from_utf8(conn.written).unwrap().contains("Connection: close\r\n"));
    }

    #[test]
    fn head_suppresses_body_bytes() {
        let body = FixedBody::new(vec![b'x'; 128]);
        let mut pending = PendingResponse::new(response(body), true, true);
        let mut conn = MockConn::unbounded();
        assert_eq!(ResponseSerializer::advance(&mut pending, &mut conn).unwrap(), Progress::Done);
        let out = String::from_utf8(conn.written).unwrap();
        assert!(out.contains("Content-Length: 128\r\n"));
        assert!(out.ends_with("\r\n\r\n"));
    }

    #[test]
    fn content_length_matches_bytes_written() {
        let body = FixedBody::new(b"hello world".to_vec());
        let mut pending = PendingResponse::new(response(body), false, true);
        let mut conn = MockConn::unbounded();
        ResponseSerializer::advance(&mut pending, &mut conn).unwrap();
        let out = conn.written;
        let text = String::from_utf8(out.clone()).unwrap();
        let idx = text.find("\r\n\r\n").unwrap() + 4;
        assert_eq!(&out[idx..], b"hello world");
    }

    #[test]
    fn partial_writes_eventually_complete() {
        let body = FixedBody::new(b"0123456789".to_vec());
        let mut pending = PendingResponse::new(response(body), false, true);
        let mut conn = MockConn::capped(vec![5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5, 5]);
        let mut iterations = 0;
        loop {
            iterations += 1;
            assert!(iterations < 100, "serializer failed to make progress");
            if ResponseSerializer::advance(&mut pending, &mut conn).unwrap() == Progress::Done {
                break;
            }
        }
        let text = String::from_utf8(conn.written).unwrap();
        assert!(text.ends_with("0123456789"));
    }

    #[test]
    fn would_block_yields_pending_without_losing_progress() {
        let body = FixedBody::new(b"abc".to_vec());
        let mut pending = PendingResponse::new(response(body), false, true);
        let mut conn = MockConn::capped(vec![0]);
        assert_eq!(ResponseSerializer::advance(&mut pending, &mut conn).unwrap(), Progress::Pending);
        assert_eq!(conn.written.len(), 0);
    }

    /// A body whose `len()` lies about how many bytes `next_chunk` actually
    /// yields before signalling `Chunk::End`.
    struct LyingBody {
        declared_len: u64,
        chunk: Option<Vec<u8>>,
    }

    impl crate::response::Body for LyingBody {
        fn len(&self) -> u64 {
            self.declared_len
        }

        fn next_chunk(&mut self) -> Chunk {
            match self.chunk.take() {
                Some(data) => Chunk::Data(data),
                None => Chunk::End,
            }
        }
    }

    #[test]
    #[should_panic(expected = "body producer wrote")]
    #[cfg(debug_assertions)]
    fn a_producer_that_under_delivers_trips_the_length_assertion() {
        let body = LyingBody { declared_len: 10, chunk: Some(b"short".to_vec()) };
        let mut pending = PendingResponse::new(response(body), false, true);
        let mut conn = MockConn::unbounded();
        let _ = ResponseSerializer::advance(&mut pending, &mut conn);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn a_producer_that_under_delivers_is_only_caught_in_debug_builds() {
        let body = LyingBody { declared_len: 10, chunk: Some(b"short".to_vec()) };
        let mut pending = PendingResponse::new(response(body), false, true);
        let mut conn = MockConn::unbounded();
        assert_eq!(ResponseSerializer::advance(&mut pending, &mut conn).unwrap(), Progress::Done);
    }
}
