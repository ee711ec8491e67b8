//! Session configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::channel::DEFAULT_PARTIAL_WINDOW;

/// Where output that no rule consumed is sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoggingMethod {
    /// Through the `log` facade at info level.
    #[default]
    Log,
    /// Printed to this process's standard output or error, matching the
    /// channel it came from.
    Stdout,
    /// Not logged at all.
    None,
}

impl fmt::Display for LoggingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggingMethod::Log => write!(f, "log"),
            LoggingMethod::Stdout => write!(f, "stdout"),
            LoggingMethod::None => write!(f, "none"),
        }
    }
}

/// Configuration for an [`InteractionSession`](super::InteractionSession).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Destination of unmatched output.
    pub logging: LoggingMethod,

    /// Close the session on the first dispatch failure instead of
    /// reporting it and carrying on.
    pub abort_on_dispatch_failure: bool,

    /// Remove ANSI escape sequences before splitting lines.
    ///
    /// Stripping decodes output as UTF-8: malformed byte sequences come
    /// out as U+FFFD instead of raw bytes. Leave this off when rules must
    /// see binary or non-UTF-8 output unchanged.
    pub strip_ansi: bool,

    /// Most trailing bytes of unterminated output a `Partial` event
    /// carries. Complete lines are never cut.
    pub partial_window: usize,

    /// How long `wait` lets channel tasks and queued writes finish after
    /// `close` was requested, in milliseconds.
    pub cancel_timeout_ms: u64,
}

impl SessionConfig {
    /// The cancellation grace period.
    pub fn cancel_timeout(&self) -> Duration {
        Duration::from_millis(self.cancel_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            logging: LoggingMethod::Log,
            abort_on_dispatch_failure: false,
            strip_ansi: false,
            partial_window: DEFAULT_PARTIAL_WINDOW,
            cancel_timeout_ms: 5000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"logging":"stdout","strip_ansi":true}"#).unwrap();
        assert_eq!(config.logging, LoggingMethod::Stdout);
        assert!(config.strip_ansi);
        assert!(!config.abort_on_dispatch_failure);
        assert_eq!(config.cancel_timeout(), Duration::from_secs(5));
        assert_eq!(config.partial_window, 64 * 1024);
    }

    #[test]
    fn test_logging_method_names() {
        let method: LoggingMethod = serde_json::from_str(r#""none""#).unwrap();
        assert_eq!(method, LoggingMethod::None);
        assert_eq!(LoggingMethod::Log.to_string(), "log");
    }
}
