//! Channel layer: output channels, events and stream demultiplexing.
//!
//! Each output channel of a remote command (standard output, standard
//! error) is fed through its own [`Demultiplexer`], which turns arbitrary
//! byte chunks into ordered [`Event`]s.

mod ansi;
mod demux;
mod event;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use ansi::AnsiStripper;
pub use demux::{DEFAULT_PARTIAL_WINDOW, Demultiplexer, Events};
pub use event::{Event, EventKind};

/// Output channel of a remote process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Standard output.
    StandardOutput,
    /// Standard error.
    StandardError,
}

impl Channel {
    /// Both channels, in a fixed order.
    pub const ALL: [Channel; 2] = [Channel::StandardOutput, Channel::StandardError];

    /// Stable index of this channel, for per-channel arrays.
    pub fn index(self) -> usize {
        match self {
            Channel::StandardOutput => 0,
            Channel::StandardError => 1,
        }
    }

    /// The opposite channel.
    pub fn other(self) -> Channel {
        match self {
            Channel::StandardOutput => Channel::StandardError,
            Channel::StandardError => Channel::StandardOutput,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::StandardOutput => write!(f, "stdout"),
            Channel::StandardError => write!(f, "stderr"),
        }
    }
}
