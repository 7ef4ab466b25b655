//! An embeddable HTTP/1.x server core: incremental request parsing,
//! streaming request callbacks, and pipelined response serialization over a
//! non-blocking, reactor-agnostic `Connection` collaborator.
//!
//! This crate implements the per-connection engine only. Wiring it to an
//! actual event loop (`mio`, `rotor`, or anything else), a TCP listener, and
//! concrete request handling is left to the embedder; see [`connection`] for
//! the collaborator traits this crate expects, and [`handler`] for the
//! application-facing callback surface.
#[macro_use]
extern crate quick_error;
#[macro_use]
extern crate matches;

pub mod accept;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod handler;
pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod serializer;
pub mod version;

pub use accept::AcceptLoop;
pub use config::Config;
pub use connection::{Connection, Listener};
pub use engine::StreamEngine;
pub use error::Error;
pub use handler::{Event, NewClientHandler, RequestHandler, ResponseSlot};
pub use request::{HeaderAction, Request};
pub use response::{Body, Chunk, EmptyBody, FixedBody, Response};
pub use version::Version;
