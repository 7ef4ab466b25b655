use crate::request::Request;
use crate::response::Response;

/// One response slot, written into by the application during
/// `Event::Headers` (only when it also sets `HeaderAction::SkipBody`) or
/// `Event::End`. Left `None` on `Event::Body`, and on `Event::Headers` with
/// `HeaderAction::Ok`.
pub type ResponseSlot = Option<Response>;

/// The tagged variant over the three request-lifecycle events a
/// `StreamEngine` dispatches to the application handler.
///
/// This replaces the source's single callback overloaded by two nullable
/// pointers (see `DESIGN.md`'s redesign notes): each event carries exactly
/// the data that is actually available at that point in the message.
pub enum Event<'a> {
    /// Headers have fully arrived. `response` must be set if and only if
    /// `request.result` is set to `HeaderAction::SkipBody`.
    Headers {
        request: &'a mut Request,
        response: &'a mut ResponseSlot,
    },
    /// A chunk of the request body has arrived. Any write to `response`
    /// here is ignored by the engine; the slot is provided only so the
    /// signature is uniform.
    Body {
        chunk: &'a [u8],
        response: &'a mut ResponseSlot,
    },
    /// The message is complete. The handler should set `response` unless it
    /// wants the connection dropped once the queue drains.
    End {
        response: &'a mut ResponseSlot,
    },
}

/// Per-connection application logic.
///
/// A fresh handler is minted per accepted connection by a
/// [`NewClientHandler`]; it may hold state across the events of many
/// pipelined requests on that one connection, but `handle` must never
/// block — suspension is purely the engine's concern (would-block read or
/// write), not the handler's.
pub trait RequestHandler {
    fn handle(&mut self, event: Event);
}

/// A factory invoked once per accepted connection to mint that connection's
/// `RequestHandler`.
pub trait NewClientHandler {
    type Handler: RequestHandler;

    fn new_handler(&self) -> Self::Handler;
}

impl<F, H> NewClientHandler for F
where
    F: Fn() -> H,
    H: RequestHandler,
{
    type Handler = H;

    fn new_handler(&self) -> H {
        (self)()
    }
}
