//! Transport interface consumed by the interaction engine.
//!
//! A transport supplies two byte sources (standard output and standard
//! error) and one byte sink (remote input). End-of-stream is the end of a
//! source; transmission errors are yielded as `Err` items rather than as a
//! silent truncation.

pub mod config;
mod memory;
mod ssh;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_core::Stream;
use futures_util::stream;
use tokio::sync::mpsc;

use crate::channel::Channel;
use crate::error::TransportError;

pub use config::{AuthMethod, HostKeyVerification, ProxyConfig, ProxyKind, SshConfig};
pub use memory::{MemoryInput, MemoryRemote, memory_transport};
pub use ssh::{SshInput, SshTransport};

/// Raw byte feed for one output channel.
pub type OutputSource = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Remote input of a running command.
pub trait InputSink: Send + 'static {
    /// Write bytes to the remote input. May wait on backpressure.
    fn write(&mut self, data: Bytes) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Signal end of input to the remote side.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send {
        async { Ok(()) }
    }
}

/// The byte streams of one remote command.
pub struct TransportStreams<W> {
    /// Standard output source.
    pub stdout: OutputSource,

    /// Standard error source.
    pub stderr: OutputSource,

    /// Remote input sink.
    pub stdin: W,
}

impl<W: InputSink> TransportStreams<W> {
    /// Bundle the three streams.
    pub fn new(stdout: OutputSource, stderr: OutputSource, stdin: W) -> Self {
        Self {
            stdout,
            stderr,
            stdin,
        }
    }

    /// Split into per-channel sources and the sink.
    pub fn into_parts(self) -> ([(Channel, OutputSource); 2], W) {
        (
            [
                (Channel::StandardOutput, self.stdout),
                (Channel::StandardError, self.stderr),
            ],
            self.stdin,
        )
    }
}

/// Adapt a channel receiver into an [`OutputSource`].
pub(crate) fn receiver_source(
    rx: mpsc::UnboundedReceiver<Result<Bytes, TransportError>>,
) -> OutputSource {
    Box::pin(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }))
}
