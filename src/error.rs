use std::io;

use httparse;

quick_error! {
    /// Everything that can go wrong while driving a single connection.
    ///
    /// All variants are fatal for the connection on which they occur; one
    /// misbehaving client never affects another connection's state.
    #[derive(Debug)]
    pub enum Error {
        /// A read or write against the `Connection` collaborator failed.
        Io(err: io::Error) {
            description("I/O error")
            display("I/O error: {}", err)
            from()
        }
        /// `httparse` rejected the request as malformed.
        Parse(err: httparse::Error) {
            description("parse error")
            display("parse error: {:?}", err)
            from()
        }
        /// The peer closed its write side (or the connection errored out)
        /// while a request's header block or body was still incomplete.
        TruncatedRequest {
            description("connection closed with an incomplete request")
        }
        /// `Content-Length` did not parse as an integer.
        BadContentLength {
            description("invalid Content-Length header")
        }
        /// `Content-Length` appeared more than once with different values.
        DuplicateContentLength {
            description("duplicate Content-Length header")
        }
        /// The request declared `Transfer-Encoding: chunked`.
        ///
        /// Chunked request bodies are out of scope for this engine; any
        /// such request is rejected rather than silently misparsed.
        ChunkedRequestBody {
            description("chunked request bodies are not supported")
        }
        /// The application handler signalled `Close` at headers-complete.
        HandlerClosed {
            description("handler rejected the request")
        }
        /// `message-complete` fired but the handler produced no response.
        HandlerDroppedRequest {
            description("handler produced no response")
        }
    }
}
