//! Interaction session layer.
//!
//! The session owns one demultiplexer per channel, feeds their events into
//! a shared [`RuleEngine`](crate::rules::RuleEngine) and hands matches to
//! the [`Dispatcher`].

mod builder;
mod config;
mod dispatcher;
#[allow(clippy::module_inception)]
mod session;
mod state;

pub use builder::SessionBuilder;
pub use config::{LoggingMethod, SessionConfig};
pub use dispatcher::{Dispatcher, Outgoing};
pub use session::{EventObserver, InteractionSession, SessionHandle, SessionReport};
pub use state::SessionState;
