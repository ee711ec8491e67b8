//! Builder for interaction sessions.

use std::sync::Arc;

use super::config::{LoggingMethod, SessionConfig};
use super::session::{EventObserver, InteractionSession};
use crate::channel::Event;
use crate::rules::Rule;

/// Builder for an [`InteractionSession`].
///
/// # Example
///
/// ```rust
/// use sshinteract::{InteractionSession, LoggingMethod, Rule};
///
/// let session = InteractionSession::builder()
///     .logging(LoggingMethod::None)
///     .strip_ansi(true)
///     .rule(Rule::contains("login:").partials().once().send("admin\n"))
///     .rule(Rule::contains("Password:").partials().once().send_hidden("secret\n"))
///     .build();
/// assert_eq!(session.state(), sshinteract::SessionState::Idle);
/// ```
#[derive(Default)]
pub struct SessionBuilder {
    config: SessionConfig,
    rules: Vec<Rule>,
    observer: Option<EventObserver>,
}

impl SessionBuilder {
    /// Create a builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Set where unmatched output goes.
    pub fn logging(mut self, logging: LoggingMethod) -> Self {
        self.config.logging = logging;
        self
    }

    /// Close the session on the first dispatch failure.
    pub fn abort_on_dispatch_failure(mut self, abort: bool) -> Self {
        self.config.abort_on_dispatch_failure = abort;
        self
    }

    /// Strip ANSI escape sequences before matching.
    pub fn strip_ansi(mut self, strip: bool) -> Self {
        self.config.strip_ansi = strip;
        self
    }

    /// Add a rule. Rules are evaluated in the order they are added, unless
    /// a priority says otherwise.
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Receive every event no rule consumed.
    pub fn on_event<F>(mut self, observer: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Build the idle session with all rules registered.
    pub fn build(self) -> InteractionSession {
        let session = InteractionSession::with_observer(self.config, self.observer);
        let handle = session.handle();
        for rule in self.rules {
            // A fresh session is idle, so registration cannot fail.
            let _ = handle.register(rule);
        }
        session
    }
}
