//! Interaction rules: what to look for, and what to do when it shows up.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use regex::bytes::Regex;

use super::matcher::{Captures, Matcher, Predicate, Substring};
use crate::channel::{Channel, Event, EventKind};
use crate::error::{HandlerError, RuleError};

/// Identifier assigned to a rule when it is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub(crate) u64);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which channel a rule listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelFilter {
    /// Either channel.
    #[default]
    Any,
    /// Only the given channel.
    Only(Channel),
}

impl ChannelFilter {
    fn accepts(self, channel: Channel) -> bool {
        match self {
            ChannelFilter::Any => true,
            ChannelFilter::Only(c) => c == channel,
        }
    }
}

/// Which kinds of events a rule considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventFilter {
    /// Complete lines only.
    Line,
    /// Partial fragments only (prompts without a trailing line break).
    Partial,
    /// Both lines and partial fragments.
    #[default]
    Both,
}

impl EventFilter {
    fn accepts(self, kind: EventKind) -> bool {
        match (self, kind) {
            (EventFilter::Both, _) => true,
            (EventFilter::Line, EventKind::Line) => true,
            (EventFilter::Partial, EventKind::Partial) => true,
            (EventFilter::Line, EventKind::Partial) | (EventFilter::Partial, EventKind::Line) => {
                false
            }
        }
    }
}

/// Whether a rule survives its first match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Persistence {
    /// Removed from the active set when it first matches.
    OneShot,
    /// Stays active for the whole session.
    #[default]
    Repeating,
}

/// Caller-supplied reaction to a matched event.
pub type Handler = Arc<dyn Fn(&Event, &Captures) -> Result<(), HandlerError> + Send + Sync>;

/// Action executed when a rule matches.
#[derive(Clone)]
pub enum Action {
    /// Write bytes to the remote input.
    Send(Bytes),
    /// Call a handler with the matched event and captures.
    Invoke(Handler),
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Send(data) => write!(f, "Send({} bytes)", data.len()),
            Action::Invoke(_) => f.write_str("Invoke(..)"),
        }
    }
}

/// A (channel filter, matcher, action, persistence, priority) tuple.
///
/// Built with [`Rule::contains`], [`Rule::regex`], [`Rule::predicate`] or
/// [`Rule::matching`], then finished with `send`/`send_hidden`/`invoke`.
///
/// # Example
///
/// ```rust
/// use sshinteract::rules::Rule;
///
/// let rule = Rule::contains("password:")
///     .partials()
///     .once()
///     .send_hidden("hunter2\n");
/// assert!(rule.is_one_shot());
/// ```
#[derive(Clone)]
pub struct Rule {
    /// Optional label used in logs.
    pub(crate) name: Option<String>,

    pub(crate) channel: ChannelFilter,

    pub(crate) events: EventFilter,

    pub(crate) matcher: Arc<dyn Matcher>,

    pub(crate) action: Action,

    pub(crate) persistence: Persistence,

    /// Higher priorities are evaluated first; ties fall back to
    /// registration order.
    pub(crate) priority: i32,

    /// Whether `Send` content is masked in logs (passwords).
    pub(crate) hidden: bool,
}

impl Rule {
    /// Start a rule that matches a plain substring.
    pub fn contains(needle: impl AsRef<[u8]>) -> RuleBuilder {
        RuleBuilder::new(Arc::new(Substring::new(needle)))
    }

    /// Start a rule that matches a regex pattern.
    pub fn regex(pattern: &str) -> Result<RuleBuilder, RuleError> {
        Ok(RuleBuilder::new(Arc::new(Regex::new(pattern)?)))
    }

    /// Start a rule that matches when `predicate` accepts the content.
    pub fn predicate<F>(predicate: F) -> RuleBuilder
    where
        F: Fn(&[u8]) -> bool + Send + Sync + 'static,
    {
        RuleBuilder::new(Arc::new(Predicate::new(predicate)))
    }

    /// Start a rule with a custom matcher.
    pub fn matching(matcher: Arc<dyn Matcher>) -> RuleBuilder {
        RuleBuilder::new(matcher)
    }

    /// Whether this rule considers `event` at all (channel and kind filters).
    pub fn accepts(&self, event: &Event) -> bool {
        self.channel.accepts(event.channel) && self.events.accepts(event.kind)
    }

    /// Run the matcher against the event content.
    pub fn match_event(&self, event: &Event) -> Option<Captures> {
        if !self.accepts(event) {
            return None;
        }
        self.matcher.match_content(&event.content)
    }

    /// The rule's label, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The rule's action.
    pub fn action(&self) -> &Action {
        &self.action
    }

    /// The rule's priority.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Whether the rule is removed after its first match.
    pub fn is_one_shot(&self) -> bool {
        self.persistence == Persistence::OneShot
    }

    /// Whether sent content is masked in logs.
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("channel", &self.channel)
            .field("events", &self.events)
            .field("matcher", &self.matcher)
            .field("action", &self.action)
            .field("persistence", &self.persistence)
            .field("priority", &self.priority)
            .finish()
    }
}

/// Builder for a [`Rule`]; finishing requires an action.
#[derive(Debug)]
pub struct RuleBuilder {
    name: Option<String>,
    channel: ChannelFilter,
    events: EventFilter,
    matcher: Arc<dyn Matcher>,
    persistence: Persistence,
    priority: i32,
}

impl RuleBuilder {
    fn new(matcher: Arc<dyn Matcher>) -> Self {
        Self {
            name: None,
            channel: ChannelFilter::Any,
            events: EventFilter::Both,
            matcher,
            persistence: Persistence::Repeating,
            priority: 0,
        }
    }

    /// Label the rule for logs.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Listen only on `channel`.
    pub fn on(mut self, channel: Channel) -> Self {
        self.channel = ChannelFilter::Only(channel);
        self
    }

    /// Listen only on standard output.
    pub fn on_stdout(self) -> Self {
        self.on(Channel::StandardOutput)
    }

    /// Listen only on standard error.
    pub fn on_stderr(self) -> Self {
        self.on(Channel::StandardError)
    }

    /// Consider complete lines only.
    pub fn lines(mut self) -> Self {
        self.events = EventFilter::Line;
        self
    }

    /// Consider partial fragments only.
    pub fn partials(mut self) -> Self {
        self.events = EventFilter::Partial;
        self
    }

    /// Set the event filter explicitly.
    pub fn events(mut self, events: EventFilter) -> Self {
        self.events = events;
        self
    }

    /// Fire at most once.
    pub fn once(mut self) -> Self {
        self.persistence = Persistence::OneShot;
        self
    }

    /// Set the priority (default 0, higher runs first).
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Finish with an action that writes `data` to the remote input.
    pub fn send(self, data: impl Into<Bytes>) -> Rule {
        self.finish(Action::Send(data.into()), false)
    }

    /// Like [`send`](Self::send), but the content is never logged.
    pub fn send_hidden(self, data: impl Into<Bytes>) -> Rule {
        self.finish(Action::Send(data.into()), true)
    }

    /// Finish with an action that calls `handler`.
    pub fn invoke<F>(self, handler: F) -> Rule
    where
        F: Fn(&Event, &Captures) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.finish(Action::Invoke(Arc::new(handler)), false)
    }

    /// Finish with an explicit action.
    pub fn action(self, action: Action) -> Rule {
        self.finish(action, false)
    }

    fn finish(self, action: Action, hidden: bool) -> Rule {
        Rule {
            name: self.name,
            channel: self.channel,
            events: self.events,
            matcher: self.matcher,
            action,
            persistence: self.persistence,
            priority: self.priority,
            hidden,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(channel: Channel, kind: EventKind, content: &'static [u8]) -> Event {
        Event::new(channel, kind, Bytes::from_static(content), 0)
    }

    #[test]
    fn test_channel_filter() {
        let rule = Rule::contains("err").on_stderr().send("x");
        assert!(rule.accepts(&event(Channel::StandardError, EventKind::Line, b"err")));
        assert!(!rule.accepts(&event(Channel::StandardOutput, EventKind::Line, b"err")));
    }

    #[test]
    fn test_event_filter() {
        let rule = Rule::contains("ok").lines().send("x");
        assert!(rule.match_event(&event(Channel::StandardOutput, EventKind::Line, b"ok")).is_some());
        assert!(rule.match_event(&event(Channel::StandardOutput, EventKind::Partial, b"ok")).is_none());

        let rule = Rule::contains("ok").partials().send("x");
        assert!(rule.match_event(&event(Channel::StandardOutput, EventKind::Line, b"ok")).is_none());
    }

    #[test]
    fn test_builder_defaults() {
        let rule = Rule::contains("$ ").send("exit\n");
        assert!(!rule.is_one_shot());
        assert!(!rule.is_hidden());
        assert_eq!(rule.priority(), 0);
        assert_eq!(rule.channel, ChannelFilter::Any);
        assert_eq!(rule.events, EventFilter::Both);
    }

    #[test]
    fn test_invalid_regex() {
        assert!(matches!(Rule::regex("(unclosed"), Err(RuleError::InvalidPattern(_))));
    }

    #[test]
    fn test_regex_captures_through_rule() {
        let rule = Rule::regex(r"exit code (\d+)").unwrap().invoke(|_, _| Ok(()));
        let caps = rule
            .match_event(&event(Channel::StandardOutput, EventKind::Line, b"exit code 42"))
            .unwrap();
        assert_eq!(caps.get(1), Some(&b"42"[..]));
    }
}
