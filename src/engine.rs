use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use log::warn;
use netbuf::Buf;

use crate::config::Config;
use crate::connection::Connection;
use crate::error::Error;
use crate::handler::{Event, RequestHandler, ResponseSlot};
use crate::parser::{ByteParser, HeadResult};
use crate::request::HeaderAction;
use crate::response::Response;
use crate::serializer::{PendingResponse, Progress, ResponseSerializer};

/// The per-connection HTTP/1.x state machine.
///
/// Owns the [`ByteParser`], the FIFO of [`PendingResponse`]s, and the
/// interest-bit discipline described in spec §4.4: while any response is
/// queued, the engine never reads, so pipelined requests can never pile up
/// ahead of the responses they triggered.
pub struct StreamEngine<C, H> {
    conn: C,
    handler: H,
    config: Arc<Config>,
    parser: ByteParser,
    /// Bytes read from the connection but not yet consumed by the parser.
    accum: Buf,
    read_scratch: Vec<u8>,
    queue: VecDeque<PendingResponse>,
    /// `true` for the request currently being parsed, used when the
    /// eventual response (if any) is enqueued.
    current_is_head: bool,
    /// Keep-alive eligibility of the request currently being parsed.
    current_keep_alive: bool,
    /// Entered on `HeaderAction::SkipBody`: read side shut down, draining
    /// the queue before a full close.
    skip: bool,
    /// Set on a parser error or `HeaderAction::Close`; forces a full
    /// shutdown once the queue (if any) drains.
    closing: bool,
    /// `true` once a read has reported end-of-stream (`Ok(0)`); used to
    /// finalize the parser and catch a request truncated by the peer.
    eof: bool,
    /// The error that caused `closing` to be set, if any, for callers that
    /// want to know which rejection ended the connection.
    last_error: Option<Error>,
}

impl<C, H> StreamEngine<C, H>
where
    C: Connection,
    H: RequestHandler,
{
    pub fn new(conn: C, handler: H, config: Arc<Config>) -> StreamEngine<C, H> {
        let read_scratch = vec![0u8; config.buffer_size()];
        StreamEngine {
            conn,
            handler,
            config,
            parser: ByteParser::new(),
            accum: Buf::new(),
            read_scratch,
            queue: VecDeque::new(),
            current_is_head: false,
            current_keep_alive: false,
            skip: false,
            closing: false,
            eof: false,
            last_error: None,
        }
    }

    /// Arm the connection for the engine's initial state: read-interest
    /// only, as `AcceptLoop` does for every freshly accepted connection.
    pub fn arm_initial(&mut self) {
        self.conn.set_read_interest(true);
        self.conn.set_write_interest(false);
    }

    pub fn is_finished(&self) -> bool {
        self.conn.is_read_closed() && self.conn.is_write_closed()
    }

    /// Borrow the underlying connection, e.g. to query close state from
    /// outside an event-loop callback.
    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// Mutably borrow the underlying connection.
    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    /// The error that caused this connection to start closing, if any.
    /// `None` for a clean close (peer went idle and away with nothing in
    /// flight) or while the connection is still open.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// The reactor's single entry point: dispatch as far as possible without
    /// blocking, then recompute interest bits and the shutdown decision.
    pub fn handle_events(&mut self, readable: bool, writable: bool) {
        let mut may_read = readable;
        let mut may_write = writable;

        loop {
            let mut progressed = false;

            if may_write && !self.queue.is_empty() {
                match self.serve_queue() {
                    Ok(Progress::Pending) => may_write = false,
                    Ok(Progress::Done) => {}
                    Err(e) => {
                        self.last_error = Some(e);
                        self.closing = true;
                    }
                }
                progressed = true;
            }

            if !self.queue.is_empty() {
                // Still waiting for writable; nothing else to attempt.
                break;
            }

            if self.skip || self.closing {
                break;
            }

            if !self.accum.is_empty() {
                match self.process_buffered() {
                    Ok(true) => {
                        progressed = true;
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("parse error, closing connection: {}", e);
                        self.last_error = Some(e);
                        self.closing = true;
                        break;
                    }
                }
            }

            if may_read {
                match self.fill_buffer() {
                    Ok(true) => {
                        progressed = true;
                        continue;
                    }
                    Ok(false) => may_read = false,
                    Err(e) => {
                        self.last_error = Some(e);
                        self.closing = true;
                        break;
                    }
                }
            }

            if !progressed {
                self.check_eof();
                break;
            }
        }

        self.update_interest();
        self.decide_shutdown();
    }

    /// If the peer's read side has reached end-of-stream and a request was
    /// left incomplete (a partial header block still sitting in `accum`, or
    /// a body the parser never finished accounting for), that is a
    /// truncated request: log it and close the connection the same way any
    /// other fatal parse error would, per spec.md §4.4's "call the parser's
    /// finish once to flush any trailing message".
    fn check_eof(&mut self) {
        if !self.eof || self.closing {
            return;
        }
        let result = if self.accum.is_empty() {
            self.parser.finish()
        } else {
            Err(Error::TruncatedRequest)
        };
        if let Err(e) = result {
            warn!("connection closed with a request in flight: {}", e);
            self.closing = true;
            self.last_error = Some(e);
        }
    }

    /// Advance the head of the response queue as far as writability allows,
    /// popping completed responses and moving on to the next one.
    fn serve_queue(&mut self) -> Result<Progress, Error> {
        loop {
            let done = match self.queue.front_mut() {
                None => return Ok(Progress::Done),
                Some(pending) => ResponseSerializer::advance(pending, &mut self.conn)?,
            };
            match done {
                Progress::Done => {
                    self.queue.pop_front();
                    if self.queue.is_empty() {
                        return Ok(Progress::Done);
                    }
                }
                Progress::Pending => return Ok(Progress::Pending),
            }
        }
    }

    /// Read as much as is immediately available (classic edge-triggered
    /// drain): loop while full reads keep arriving, stop on would-block,
    /// short read, or EOF. Returns whether any bytes were appended.
    fn fill_buffer(&mut self) -> Result<bool, Error> {
        let mut any = false;
        loop {
            match self.conn.read(&mut self.read_scratch) {
                Ok(0) => {
                    // Peer half-closed for writes (our reads); nothing more
                    // will ever arrive. `check_eof` decides whether a
                    // request was left incomplete.
                    self.eof = true;
                    break;
                }
                Ok(n) => {
                    self.accum.extend(&self.read_scratch[..n]);
                    any = true;
                    if n < self.read_scratch.len() {
                        break;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!("read error, closing connection: {}", e);
                    self.conn.shutdown(true, true);
                    return Err(Error::Io(e));
                }
            }
        }
        Ok(any)
    }

    /// Drive the parser over whatever is buffered in `accum`, dispatching
    /// handler events as messages complete. Stops (without erroring) as
    /// soon as a response is enqueued or the engine enters `skip`/`closing`,
    /// per the "don't interleave dispatch with serialization" invariant.
    /// Returns whether it made any state-changing progress.
    fn process_buffered(&mut self) -> Result<bool, Error> {
        let mut progressed = false;
        loop {
            if self.parser.is_idle() {
                let head = match self.parser.parse_head(&self.accum)? {
                    HeadResult::Partial => return Ok(progressed),
                    HeadResult::Complete(head) => head,
                };
                self.accum.consume(head.consumed);
                self.current_is_head = head.request.is_head();
                self.current_keep_alive = head.keep_alive;

                let mut request = head.request;
                let mut response: ResponseSlot = None;
                self.handler.handle(Event::Headers {
                    request: &mut request,
                    response: &mut response,
                });
                progressed = true;

                match request.result {
                    HeaderAction::Ok => {
                        self.parser.begin_body(head.content_length);
                    }
                    HeaderAction::SkipBody => {
                        match response {
                            Some(response) => {
                                self.enqueue(response, false);
                                self.skip = true;
                                self.conn.shutdown(true, false);
                            }
                            None => {
                                // The handler chose SkipBody but never
                                // supplied the response it promised: treat
                                // it the same as a dropped request at
                                // message-complete rather than panicking
                                // the whole connection-driving call.
                                self.last_error = Some(Error::HandlerDroppedRequest);
                                self.closing = true;
                            }
                        }
                        return Ok(true);
                    }
                    HeaderAction::Close => {
                        self.last_error = Some(Error::HandlerClosed);
                        self.closing = true;
                        return Ok(true);
                    }
                }
            } else {
                let remaining = self.parser.body_remaining() as usize;
                let avail = remaining.min(self.accum.len());
                if avail > 0 {
                    let chunk = self.accum[..avail].to_vec();
                    let mut response: ResponseSlot = None;
                    self.handler.handle(Event::Body {
                        chunk: &chunk,
                        response: &mut response,
                    });
                    self.accum.consume(avail);
                    progressed = true;
                }

                if !self.parser.consume_body(avail as u64) {
                    // Body not yet complete; need more bytes than we have.
                    return Ok(progressed);
                }

                let mut response: ResponseSlot = None;
                self.handler.handle(Event::End { response: &mut response });
                progressed = true;
                match response {
                    Some(response) => {
                        self.enqueue(response, self.current_keep_alive);
                        return Ok(true);
                    }
                    None => {
                        self.last_error = Some(Error::HandlerDroppedRequest);
                        self.closing = true;
                        return Ok(true);
                    }
                }
            }
        }
    }

    fn enqueue(&mut self, response: Response, keep_alive: bool) {
        let keep_alive = keep_alive && !self.skip && !self.closing;
        self.queue.push_back(PendingResponse::new(response, self.current_is_head, keep_alive));
    }

    fn update_interest(&mut self) {
        let write_interest = !self.queue.is_empty();
        let read_interest = self.queue.is_empty() && !self.skip && !self.closing;
        self.conn.set_write_interest(write_interest);
        self.conn.set_read_interest(read_interest);
    }

    fn decide_shutdown(&mut self) {
        if self.skip {
            self.conn.shutdown(true, false);
        }
        if self.closing
            || self.conn.is_write_closed()
            || (self.conn.is_read_closed() && self.queue.is_empty())
        {
            self.conn.shutdown(true, true);
        }
    }
}
