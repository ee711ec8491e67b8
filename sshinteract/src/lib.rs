//! # sshinteract
//!
//! Expect-style automation for remote commands.
//!
//! sshinteract watches the live output of a remote process on its two
//! channels (standard output and standard error), recognizes configured
//! patterns as they appear, and reacts by writing to the remote input or
//! calling back into your code.
//!
//! ## Features
//!
//! - Per-channel demultiplexing into complete lines and early partial
//!   fragments, so prompts without a trailing line break still match
//! - Substring, regex (with captures) and predicate matchers
//! - One-shot and repeating rules with deterministic priority ordering
//! - Queued remote writes that never stall output processing
//! - Async SSH transport via russh, plus an in-memory transport for tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sshinteract::{InteractionSession, Rule, SshConfig, SshTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sshinteract::Error> {
//!     let config = SshConfig::new("192.168.1.1", "admin").with_password("secret");
//!     let transport = SshTransport::connect(config).await?;
//!     let streams = transport.exec("passwd").await?;
//!
//!     let report = InteractionSession::builder()
//!         .rule(Rule::contains("Current password:").partials().once().send_hidden("old\n"))
//!         .rule(Rule::regex(r"(?i)new password:")?.partials().send_hidden("new\n"))
//!         .build()
//!         .run(streams)
//!         .await?;
//!
//!     println!("{} rules fired", report.fired.len());
//!     transport.close().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod error;
pub mod rules;
pub mod session;
pub mod transfer;
pub mod transport;

// Re-export main types for convenience
pub use channel::{Channel, Demultiplexer, Event, EventKind};
pub use error::{DispatchError, Error, Result};
pub use rules::{Action, Captures, Matcher, Rule, RuleEngine, RuleId};
pub use session::{
    InteractionSession, LoggingMethod, SessionBuilder, SessionConfig, SessionHandle,
    SessionReport, SessionState,
};
pub use transfer::{FileTransferMethod, SftpError};
pub use transport::{
    AuthMethod, InputSink, ProxyConfig, ProxyKind, SshConfig, SshTransport, TransportStreams,
    memory_transport,
};
