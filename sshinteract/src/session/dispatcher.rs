//! Response dispatcher.
//!
//! `Send` actions are queued to a single writer task that owns the remote
//! input, so backpressure on the remote side never stalls event evaluation
//! on either channel. `Invoke` actions run synchronously on the channel
//! task that produced the event.

use bytes::Bytes;
use log::{debug, warn};
use tokio::sync::mpsc;

use crate::channel::Event;
use crate::error::DispatchError;
use crate::rules::{Action, RuleId, RuleMatch};
use crate::transport::InputSink;

/// Bytes queued for the remote input on behalf of a rule.
#[derive(Debug)]
pub struct Outgoing {
    /// Rule that produced the write.
    pub rule: RuleId,

    /// Content to write.
    pub data: Bytes,

    /// Whether the content must not be logged.
    pub hidden: bool,
}

/// Executes the action of matched rules.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    queue: mpsc::UnboundedSender<Outgoing>,
}

impl Dispatcher {
    /// Create a dispatcher and the receiving end of its write queue.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outgoing>) {
        let (queue, rx) = mpsc::unbounded_channel();
        (Self { queue }, rx)
    }

    /// Execute the action of `matched` for `event`.
    ///
    /// Writes are queued and never dropped while the writer is alive; a
    /// failure to queue or a handler error is returned attributed to the
    /// rule.
    pub fn dispatch(&self, matched: &RuleMatch, event: &Event) -> Result<(), DispatchError> {
        match matched.rule.action() {
            Action::Send(data) => {
                if matched.rule.is_hidden() {
                    debug!("rule {}: queueing {} hidden bytes", matched.id, data.len());
                } else {
                    debug!(
                        "rule {}: queueing {:?}",
                        matched.id,
                        String::from_utf8_lossy(data)
                    );
                }

                self.queue
                    .send(Outgoing {
                        rule: matched.id,
                        data: data.clone(),
                        hidden: matched.rule.is_hidden(),
                    })
                    .map_err(|_| DispatchError {
                        rule: matched.id,
                        message: "remote input writer has stopped".to_string(),
                    })
            }
            Action::Invoke(handler) => {
                debug!("rule {}: invoking handler for {}", matched.id, event);
                handler(event, &matched.captures).map_err(|e| DispatchError {
                    rule: matched.id,
                    message: e.to_string(),
                })
            }
        }
    }
}

/// Drain the write queue into `sink` until every dispatcher is dropped.
///
/// Each failed write is passed to `on_failure`; writing continues with the
/// next queued item.
pub(crate) async fn run_writer<W, F>(
    mut sink: W,
    mut queue: mpsc::UnboundedReceiver<Outgoing>,
    mut on_failure: F,
) where
    W: InputSink,
    F: FnMut(DispatchError) + Send,
{
    while let Some(outgoing) = queue.recv().await {
        let len = outgoing.data.len();
        match sink.write(outgoing.data).await {
            Ok(()) => debug!("rule {}: wrote {} bytes", outgoing.rule, len),
            Err(e) => {
                warn!("rule {}: write to remote input failed: {}", outgoing.rule, e);
                on_failure(DispatchError {
                    rule: outgoing.rule,
                    message: e.to_string(),
                });
            }
        }
    }

    if let Err(e) = sink.close().await {
        debug!("closing remote input: {}", e);
    }
}
