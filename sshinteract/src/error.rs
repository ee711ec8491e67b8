//! Error types for sshinteract.

use std::io;
use thiserror::Error;

use crate::channel::Channel;
use crate::rules::RuleId;

/// Boxed error returned by caller-supplied rule handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for sshinteract operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel stream errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Session lifecycle errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Invalid rule or matcher definition
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),
}

/// Transport layer errors (SSH connection, authentication, stream I/O).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host is not present in known_hosts and verification is strict
    #[error("Host key for {host}:{port} is not known")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// A proxy is configured but no tunnel stream was supplied
    #[error("Proxy {kind} configured for {host}:{port}; use connect_stream with an established tunnel")]
    ProxyRequired {
        kind: crate::transport::ProxyKind,
        host: String,
        port: u16,
    },

    /// The remote input channel is closed
    #[error("Remote input closed")]
    InputClosed,

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel stream errors.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Channel task ended abnormally
    #[error("{channel} task failed: {message}")]
    TaskFailed { channel: Channel, message: String },
}

/// Session lifecycle errors.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The session has not been started
    #[error("Session not started")]
    NotStarted,

    /// The session has already been started
    #[error("Session already started")]
    AlreadyStarted,

    /// The session is closed and no longer accepts rules
    #[error("Session closed")]
    Closed,

    /// The session was aborted after a dispatch failure
    #[error("Session aborted: {0}")]
    Aborted(DispatchError),
}

/// Failure executing the action of a matched rule.
///
/// Recoverable by default; the session keeps processing events.
#[derive(Error, Debug, Clone)]
#[error("rule {rule} failed: {message}")]
pub struct DispatchError {
    /// The rule whose action failed.
    pub rule: RuleId,

    /// What went wrong.
    pub message: String,
}

/// Rule definition errors.
#[derive(Error, Debug)]
pub enum RuleError {
    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// No rule with this id is registered
    #[error("Unknown rule id {0}")]
    UnknownRule(RuleId),
}

/// Result type alias using sshinteract's Error.
pub type Result<T> = std::result::Result<T, Error>;
