use crate::error::TransportError;

/// A line-oriented channel to a running engine.
///
/// The transport treats the endpoint as opaque: anything that can forward a
/// command line and be closed satisfies the contract, whether it is a
/// subprocess pipe, a socket, or a scripted in-memory channel in tests.
/// Inbound lines travel the other way, from the channel driver into
/// [`Transport::handle_payload`](crate::Transport::handle_payload).
pub trait EngineChannel: Send {
    /// Forward one UCI command line to the engine.
    fn post_line(&mut self, line: &str) -> Result<(), TransportError>;

    /// Close the channel. Called once, from [`Transport::quit`](crate::Transport::quit).
    fn terminate(&mut self);
}
