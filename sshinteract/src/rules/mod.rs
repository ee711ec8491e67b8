//! Pattern rules and the engine that evaluates them.
//!
//! A [`Rule`] binds a [`Matcher`] to a channel filter, an event-kind filter
//! and an [`Action`]. The [`RuleEngine`] evaluates events against the
//! active rules in priority order; the first match wins.

mod engine;
mod matcher;
mod rule;

pub use engine::{RuleEngine, RuleMatch};
pub use matcher::{Captures, Matcher, Predicate, Substring};
pub use rule::{
    Action, ChannelFilter, EventFilter, Handler, Persistence, Rule, RuleBuilder, RuleId,
};
