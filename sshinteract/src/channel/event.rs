//! Events produced by the demultiplexer.

use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::Channel;

/// Kind of an output event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A complete line, without its line break.
    Line,
    /// Output not yet terminated by a line break. Advisory only: a later
    /// `Partial` or the eventual `Line` supersedes it.
    Partial,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Line => write!(f, "line"),
            EventKind::Partial => write!(f, "partial"),
        }
    }
}

/// A unit of output observed on one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Channel the output arrived on.
    pub channel: Channel,

    /// Whether the content is a complete line.
    pub kind: EventKind,

    /// Raw content. Line events exclude the terminating line break.
    pub content: Bytes,

    /// Position of this event on its channel, starting at zero.
    pub sequence: u64,

    /// Set on the final `Partial` of a closed channel when it carries no
    /// output beyond the `Partial` delivered just before it.
    pub repeated: bool,
}

impl Event {
    /// Create a new event.
    pub fn new(channel: Channel, kind: EventKind, content: impl Into<Bytes>, sequence: u64) -> Self {
        Self {
            channel,
            kind,
            content: content.into(),
            sequence,
            repeated: false,
        }
    }

    /// Whether this is a complete line.
    pub fn is_line(&self) -> bool {
        self.kind == EventKind::Line
    }

    /// Whether this is a partial fragment.
    pub fn is_partial(&self) -> bool {
        self.kind == EventKind::Partial
    }

    /// Get the content as a string (lossy UTF-8).
    pub fn as_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{} {}: {:?}",
            self.channel,
            self.sequence,
            self.kind,
            self.as_str_lossy()
        )
    }
}
