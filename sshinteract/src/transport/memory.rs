//! In-memory transport.
//!
//! Useful for driving a session locally and in tests: the [`MemoryRemote`]
//! half plays the remote command, writing output and reading what the
//! session sends back.

use bytes::Bytes;
use tokio::sync::mpsc;

use super::{InputSink, TransportStreams, receiver_source};
use crate::channel::Channel;
use crate::error::TransportError;

type OutputTx = mpsc::UnboundedSender<Result<Bytes, TransportError>>;

/// Create a connected pair of transport streams and remote handle.
pub fn memory_transport() -> (TransportStreams<MemoryInput>, MemoryRemote) {
    let (stdout_tx, stdout_rx) = mpsc::unbounded_channel();
    let (stderr_tx, stderr_rx) = mpsc::unbounded_channel();
    let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();

    let streams = TransportStreams::new(
        receiver_source(stdout_rx),
        receiver_source(stderr_rx),
        MemoryInput { tx: stdin_tx },
    );
    let remote = MemoryRemote {
        outputs: [Some(stdout_tx), Some(stderr_tx)],
        stdin: stdin_rx,
    };
    (streams, remote)
}

/// Remote input half of the in-memory transport.
#[derive(Debug)]
pub struct MemoryInput {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl InputSink for MemoryInput {
    async fn write(&mut self, data: Bytes) -> Result<(), TransportError> {
        self.tx.send(data).map_err(|_| TransportError::InputClosed)
    }
}

/// The "remote command" side of the in-memory transport.
#[derive(Debug)]
pub struct MemoryRemote {
    outputs: [Option<OutputTx>; 2],
    stdin: mpsc::UnboundedReceiver<Bytes>,
}

impl MemoryRemote {
    /// Emit output on `channel`. Returns false if the channel is closed.
    pub fn write(&self, channel: Channel, data: impl Into<Bytes>) -> bool {
        match &self.outputs[channel.index()] {
            Some(tx) => tx.send(Ok(data.into())).is_ok(),
            None => false,
        }
    }

    /// Signal end-of-stream on `channel`.
    pub fn close(&mut self, channel: Channel) {
        self.outputs[channel.index()] = None;
    }

    /// Report a transmission error on `channel`; the channel is closed
    /// afterwards.
    pub fn fail(&mut self, channel: Channel, error: TransportError) {
        if let Some(tx) = self.outputs[channel.index()].take() {
            let _ = tx.send(Err(error));
        }
    }

    /// Stop accepting remote input; further session writes fail.
    pub fn close_input(&mut self) {
        self.stdin.close();
    }

    /// Wait for the next chunk the session wrote to the remote input.
    pub async fn recv_input(&mut self) -> Option<Bytes> {
        self.stdin.recv().await
    }

    /// Take a chunk of remote input if one is already queued.
    pub fn try_recv_input(&mut self) -> Option<Bytes> {
        self.stdin.try_recv().ok()
    }
}
