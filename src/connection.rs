use std::io;

/// The non-blocking socket-like collaborator a [`StreamEngine`] drives.
///
/// This crate ships no implementation of this trait: wire it up to `mio`,
/// `rotor`, or any other reactor's stream type. `read`/`write` follow
/// ordinary non-blocking `io::Read`/`io::Write` conventions: a
/// `WouldBlock` error means "nothing happened, try again once the reactor
/// says this is ready".
///
/// [`StreamEngine`]: crate::engine::StreamEngine
pub trait Connection {
    /// Non-blocking read. Returns `Err(WouldBlock)` if no data is available.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Non-blocking write. Returns `Err(WouldBlock)` if the socket buffer is
    /// full.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Toggle whether the reactor should report readable events.
    fn set_read_interest(&mut self, interest: bool);

    /// Toggle whether the reactor should report writable events.
    fn set_write_interest(&mut self, interest: bool);

    /// Half- or fully-close the connection. Idempotent.
    fn shutdown(&mut self, read: bool, write: bool);

    /// `true` once the read half has been shut down (by us or by the peer).
    fn is_read_closed(&self) -> bool;

    /// `true` once the write half has been shut down.
    fn is_write_closed(&self) -> bool;
}

/// The collaborator that hands `StreamEngine`s their `Connection`s.
///
/// Like `Connection`, this crate ships no concrete implementation; the
/// `AcceptLoop` is generic over any `Listener`.
pub trait Listener {
    type Conn: Connection;

    /// Non-blocking accept. Returns `Err(WouldBlock)` when no connection is
    /// waiting.
    fn accept(&mut self) -> io::Result<Self::Conn>;

    /// Stop accepting new connections (used as file-descriptor backpressure
    /// and on graceful shutdown).
    fn stop(&mut self);
}
