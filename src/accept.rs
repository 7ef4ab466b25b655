use std::io;
use std::sync::Arc;

use log::warn;

use crate::config::Config;
use crate::connection::{Connection, Listener};
use crate::engine::StreamEngine;
use crate::handler::{NewClientHandler, RequestHandler};

/// Drains a [`Listener`] under edge-triggered semantics, minting a fresh
/// [`StreamEngine`] per accepted connection.
///
/// This crate ships no reactor binding: `handle_events` is meant to be
/// called whenever the embedder's event loop reports the listener as
/// readable, and the engines it returns are the caller's to register for
/// their own read/write readiness going forward.
pub struct AcceptLoop<L, F> {
    listener: L,
    factory: F,
    config: Arc<Config>,
}

impl<L, F> AcceptLoop<L, F>
where
    L: Listener,
    F: NewClientHandler,
{
    pub fn new(listener: L, factory: F, config: Arc<Config>) -> AcceptLoop<L, F> {
        AcceptLoop { listener, factory, config }
    }

    /// Accept connections until the listener reports would-block, minting
    /// one armed [`StreamEngine`] per connection.
    ///
    /// On file-descriptor exhaustion (EMFILE/ENFILE), the listener is
    /// stopped as a backpressure measure and the burst ends early. Other
    /// accept errors are logged and end the current burst without stopping
    /// the listener.
    pub fn handle_events(&mut self) -> Vec<StreamEngine<L::Conn, F::Handler>> {
        let mut accepted = Vec::new();
        loop {
            match self.listener.accept() {
                Ok(conn) => {
                    let handler = self.factory.new_handler();
                    let mut engine = StreamEngine::new(conn, handler, self.config.clone());
                    engine.arm_initial();
                    accepted.push(engine);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if is_fd_exhaustion(e) => {
                    warn!("accept: file descriptors exhausted, stopping listener: {}", e);
                    self.listener.stop();
                    break;
                }
                Err(e) => {
                    warn!("accept error: {}", e);
                    break;
                }
            }
        }
        accepted
    }
}

/// `true` for the raw OS errno values `EMFILE` (24) and `ENFILE` (23) on
/// Linux; other platforms' `Listener` implementations should translate
/// their own out-of-descriptor error into one of these, or report it
/// through a dedicated error type if this heuristic does not fit.
fn is_fd_exhaustion(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(23) | Some(24))
}
