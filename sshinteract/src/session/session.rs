//! Interaction session: one remote command, two channels, one rule set.

use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::future::join_all;
use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};

use super::config::{LoggingMethod, SessionConfig};
use super::dispatcher::{Dispatcher, run_writer};
use super::state::SessionState;
use crate::channel::{Channel, Demultiplexer, Event};
use crate::error::{ChannelError, DispatchError, Error, Result, SessionError, TransportError};
use crate::rules::{Rule, RuleEngine, RuleId, RuleMatch};
use crate::transport::{InputSink, OutputSource, TransportStreams};

/// Callback receiving every event no rule consumed.
pub type EventObserver = Arc<dyn Fn(&Event) + Send + Sync>;

/// Summary of a finished session.
#[derive(Debug, Clone, Default)]
pub struct SessionReport {
    /// Complete lines observed per channel, indexed by [`Channel::index`].
    pub lines: [u64; 2],

    /// Rules that fired, in firing order.
    pub fired: Vec<RuleId>,

    /// Recoverable dispatch failures.
    pub dispatch_failures: Vec<DispatchError>,

    /// Unterminated output left when a channel closed that no rule matched.
    /// Informational, not an error.
    pub unmatched_tail: Vec<Event>,
}

impl SessionReport {
    /// Complete lines observed on `channel`.
    pub fn lines_on(&self, channel: Channel) -> u64 {
        self.lines[channel.index()]
    }
}

/// Mutable session state. Only touched under the session lock.
#[derive(Debug, Default)]
struct Core {
    state: SessionState,
    engine: RuleEngine,

    /// Latest partial content per channel, cleared by each line.
    pending: [Bytes; 2],

    /// Last partial event per channel if no rule took it.
    unmatched_partial: [Option<Event>; 2],

    report: SessionReport,

    /// Set when a dispatch failure closed the session.
    aborted: Option<DispatchError>,
}

struct Shared {
    core: Mutex<Core>,
    config: SessionConfig,
    observer: Option<EventObserver>,
    cancel: watch::Sender<bool>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Core> {
        // Handlers run outside the lock; a poisoned lock still holds
        // consistent state.
        self.core.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn request_cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Evaluate one event and dispatch the winning rule, if any.
    ///
    /// Once the session is closed, events are passed through without
    /// evaluation.
    fn handle(&self, event: Event, dispatcher: &Dispatcher) {
        let matched = {
            let mut core = self.lock();
            let idx = event.channel.index();
            if event.is_line() {
                core.report.lines[idx] += 1;
                core.pending[idx] = Bytes::new();
            } else {
                core.pending[idx] = event.content.clone();
            }

            if event.repeated {
                // The Partial this repeats was already evaluated; its
                // outcome stands.
                if core.unmatched_partial[idx].is_some() {
                    core.unmatched_partial[idx] = Some(event);
                }
                return;
            }

            let matched = if core.state.is_closed() {
                debug!("session closed, not evaluating {}", event);
                None
            } else {
                core.engine.evaluate(&event)
            };
            core.unmatched_partial[idx] = match (&matched, event.is_partial()) {
                (None, true) => Some(event.clone()),
                _ => None,
            };
            if let Some(m) = &matched {
                core.report.fired.push(m.id);
            }
            matched
        };

        match matched {
            Some(m) => self.dispatch(dispatcher, &m, &event),
            None => self.pass_through(&event),
        }
    }

    fn dispatch(&self, dispatcher: &Dispatcher, matched: &RuleMatch, event: &Event) {
        if let Err(e) = dispatcher.dispatch(matched, event) {
            warn!("{}", e);
            self.dispatch_failed(e);
        }
    }

    fn dispatch_failed(&self, error: DispatchError) {
        let abort = self.config.abort_on_dispatch_failure;
        {
            let mut core = self.lock();
            core.report.dispatch_failures.push(error.clone());
            if abort && core.aborted.is_none() {
                core.aborted = Some(error);
                core.state = SessionState::Closed;
            }
        }
        if abort {
            self.request_cancel();
        }
    }

    fn pass_through(&self, event: &Event) {
        if let Some(observer) = &self.observer {
            observer(event);
        }
        if event.is_line() {
            self.log_output(event);
        }
    }

    fn log_output(&self, event: &Event) {
        match self.config.logging {
            LoggingMethod::Log => info!("{}: {}", event.channel, event.as_str_lossy()),
            LoggingMethod::Stdout => match event.channel {
                Channel::StandardOutput => println!("{}", event.as_str_lossy()),
                Channel::StandardError => eprintln!("{}", event.as_str_lossy()),
            },
            LoggingMethod::None => {}
        }
    }

    fn channel_ended(&self, channel: Channel) {
        let (tail, state) = {
            let mut core = self.lock();
            let idx = channel.index();
            core.pending[idx] = Bytes::new();
            let tail = core.unmatched_partial[idx].take();
            if let Some(event) = &tail {
                core.report.unmatched_tail.push(event.clone());
            }
            core.state = core.state.channel_ended();
            (tail, core.state)
        };

        if let Some(event) = tail {
            info!(
                "{} closed with unmatched output: {:?}",
                channel,
                event.as_str_lossy()
            );
            self.log_output(&event);
        }
        debug!("{} ended, session {}", channel, state);
    }

    fn transport_failed(&self, channel: Channel, error: &TransportError) {
        {
            let mut core = self.lock();
            let idx = channel.index();
            core.unmatched_partial[idx] = None;
            core.pending[idx] = Bytes::new();
            core.state = SessionState::Closed;
        }
        warn!("{} failed, closing session: {}", channel, error);
        self.request_cancel();
    }
}

/// Cloneable handle for registering rules and closing a running session.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    /// Register a rule. Fails once the session is closed.
    pub fn register(&self, rule: Rule) -> Result<RuleId> {
        let mut core = self.shared.lock();
        if core.state.is_closed() {
            return Err(SessionError::Closed.into());
        }
        Ok(core.engine.register(rule))
    }

    /// Remove a rule from the active set.
    pub fn deregister(&self, id: RuleId) -> Result<()> {
        self.shared
            .lock()
            .engine
            .deregister(id)
            .map(|_| ())
            .map_err(Error::from)
    }

    /// Whether a rule is still active (one-shot rules disappear when fired).
    pub fn is_active(&self, id: RuleId) -> bool {
        self.shared.lock().engine.contains(id)
    }

    /// Request the session to stop. Channel tasks end promptly and the
    /// session moves through `Draining` to `Closed`.
    pub fn close(&self) {
        debug!("session close requested");
        self.shared.request_cancel();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    /// Complete lines seen so far on `channel`.
    pub fn lines_observed(&self, channel: Channel) -> u64 {
        self.shared.lock().report.lines[channel.index()]
    }

    /// Partial content buffered on `channel` since its last line.
    pub fn pending(&self, channel: Channel) -> Bytes {
        self.shared.lock().pending[channel.index()].clone()
    }

    /// Snapshot of the report so far.
    pub fn report(&self) -> SessionReport {
        self.shared.lock().report.clone()
    }
}

/// Automates one remote command: watches both output channels, fires
/// rules, and writes responses to the remote input.
///
/// # Example
///
/// ```rust,no_run
/// use sshinteract::{InteractionSession, Rule, SshConfig, SshTransport};
///
/// # async fn example() -> Result<(), sshinteract::Error> {
/// let transport = SshTransport::connect(SshConfig::new("db1", "deploy")).await?;
/// let streams = transport.exec("sudo systemctl restart app").await?;
///
/// let report = InteractionSession::builder()
///     .rule(Rule::contains("[sudo] password").partials().once().send_hidden("secret\n"))
///     .build()
///     .run(streams)
///     .await?;
/// println!("{} lines", report.lines_on(sshinteract::Channel::StandardOutput));
/// # Ok(())
/// # }
/// ```
pub struct InteractionSession {
    shared: Arc<Shared>,
    channels: Vec<JoinHandle<std::result::Result<(), TransportError>>>,
    writer: Option<JoinHandle<()>>,
}

impl InteractionSession {
    /// Create an idle session.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_observer(config, None)
    }

    /// Start building a session.
    pub fn builder() -> super::SessionBuilder {
        super::SessionBuilder::new()
    }

    pub(crate) fn with_observer(config: SessionConfig, observer: Option<EventObserver>) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                core: Mutex::new(Core::default()),
                config,
                observer,
                cancel,
            }),
            channels: Vec::new(),
            writer: None,
        }
    }

    /// A handle usable from other tasks and from rule handlers.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: self.shared.clone(),
        }
    }

    /// Register a rule. Fails once the session is closed.
    pub fn register(&self, rule: Rule) -> Result<RuleId> {
        self.handle().register(rule)
    }

    /// Remove a rule from the active set.
    pub fn deregister(&self, id: RuleId) -> Result<()> {
        self.handle().deregister(id)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    /// Request the session to stop.
    pub fn close(&self) {
        self.handle().close();
    }

    /// Subscribe to both channels of `streams` and start processing.
    ///
    /// Must be called within a tokio runtime.
    pub fn start<W: InputSink>(&mut self, streams: TransportStreams<W>) -> Result<()> {
        {
            let mut core = self.shared.lock();
            core.state = core.state.started().ok_or(SessionError::AlreadyStarted)?;
        }

        let (sources, sink) = streams.into_parts();
        let (dispatcher, queue) = Dispatcher::new();

        let shared = self.shared.clone();
        self.writer = Some(tokio::spawn(run_writer(sink, queue, move |e| {
            shared.dispatch_failed(e)
        })));

        for (channel, source) in sources {
            self.channels.push(tokio::spawn(run_channel(
                self.shared.clone(),
                channel,
                source,
                dispatcher.clone(),
            )));
        }

        debug!("session active");
        Ok(())
    }

    /// Wait for both channels to end.
    ///
    /// Returns the transport error if a channel failed, or
    /// [`SessionError::Aborted`] if a dispatch failure closed the session
    /// under `abort_on_dispatch_failure`. Once `close` has been requested,
    /// tasks still running after the configured grace period are aborted.
    pub async fn wait(&mut self) -> Result<SessionReport> {
        if self.state() == SessionState::Idle {
            return Err(SessionError::NotStarted.into());
        }

        let timeout = self.shared.config.cancel_timeout();
        let channels = std::mem::take(&mut self.channels);
        let aborts: Vec<AbortHandle> = channels.iter().map(|t| t.abort_handle()).collect();

        let joined = join_all(channels);
        tokio::pin!(joined);

        let mut cancelled = self.shared.cancel.subscribe();
        let grace = async move {
            let _ = cancelled.wait_for(|c| *c).await;
            tokio::time::sleep(timeout).await;
        };

        let finished = tokio::select! {
            results = &mut joined => Some(results),
            _ = grace => None,
        };
        let results = match finished {
            Some(results) => results,
            None => {
                warn!("channel tasks did not stop within {:?}; aborting", timeout);
                aborts.iter().for_each(AbortHandle::abort);
                joined.await
            }
        };

        if let Some(writer) = self.writer.take() {
            let abort = writer.abort_handle();
            if tokio::time::timeout(timeout, writer).await.is_err() {
                warn!("remote input writer did not finish within {:?}; aborting", timeout);
                abort.abort();
            }
        }

        let mut first_error: Option<Error> = None;
        for (channel, result) in Channel::ALL.iter().zip(results) {
            let error = match result {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => Error::from(e),
                Err(e) if e.is_cancelled() => continue,
                Err(e) => ChannelError::TaskFailed {
                    channel: *channel,
                    message: e.to_string(),
                }
                .into(),
            };
            first_error.get_or_insert(error);
        }

        let (report, aborted) = {
            let mut core = self.shared.lock();
            core.state = SessionState::Closed;
            (core.report.clone(), core.aborted.clone())
        };

        if let Some(e) = first_error {
            return Err(e);
        }
        if let Some(e) = aborted {
            return Err(SessionError::Aborted(e).into());
        }

        debug!(
            "session closed: {} stdout lines, {} stderr lines, {} rules fired",
            report.lines_on(Channel::StandardOutput),
            report.lines_on(Channel::StandardError),
            report.fired.len()
        );
        Ok(report)
    }

    /// Start the session on `streams` and wait for it to finish.
    pub async fn run<W: InputSink>(mut self, streams: TransportStreams<W>) -> Result<SessionReport> {
        self.start(streams)?;
        self.wait().await
    }
}

impl Drop for InteractionSession {
    fn drop(&mut self) {
        if !self.channels.is_empty() {
            warn!("InteractionSession dropped while running; cancelling");
            self.shared.request_cancel();
        }
    }
}

/// Drive one channel: demultiplex its source and evaluate every event.
async fn run_channel(
    shared: Arc<Shared>,
    channel: Channel,
    source: OutputSource,
    dispatcher: Dispatcher,
) -> std::result::Result<(), TransportError> {
    let mut cancelled = shared.cancel.subscribe();
    let stop = Box::pin(async move {
        let _ = cancelled.wait_for(|c| *c).await;
    });

    let demux = Demultiplexer::new(channel)
        .with_ansi_stripping(shared.config.strip_ansi)
        .with_partial_window(shared.config.partial_window);
    let mut events = Box::pin(demux.into_stream(source.take_until(stop)));

    while let Some(item) = events.next().await {
        match item {
            Ok(event) => shared.handle(event, &dispatcher),
            Err(e) => {
                shared.transport_failed(channel, &e);
                return Err(e);
            }
        }
    }

    shared.channel_ended(channel);
    Ok(())
}

impl std::fmt::Debug for InteractionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionSession")
            .field("state", &self.state())
            .field("running_channels", &self.channels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;
    use tokio_test::assert_ok;

    use super::*;
    use crate::channel::EventKind;
    use crate::transport::memory_transport;

    const STEP: Duration = Duration::from_secs(2);

    fn quiet() -> SessionConfig {
        SessionConfig {
            logging: LoggingMethod::None,
            cancel_timeout_ms: 200,
            ..SessionConfig::default()
        }
    }

    async fn wait_for_state(handle: &SessionHandle, state: SessionState) {
        for _ in 0..200 {
            if handle.state() == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("session never reached {}, stuck in {}", state, handle.state());
    }

    #[tokio::test]
    async fn test_login_prompt_fires_once() {
        let (streams, mut remote) = memory_transport();
        let mut session = InteractionSession::new(quiet());
        let id = session
            .register(Rule::contains("login:").on_stdout().partials().once().send("user\n"))
            .unwrap();

        session.start(streams).unwrap();
        assert_eq!(session.state(), SessionState::Active);

        remote.write(Channel::StandardOutput, "login: ");
        let input = timeout(STEP, remote.recv_input()).await.unwrap().unwrap();
        assert_eq!(&input[..], b"user\n");
        assert!(!session.handle().is_active(id));

        remote.close(Channel::StandardOutput);
        remote.close(Channel::StandardError);
        let report = session.wait().await.unwrap();

        assert_eq!(report.fired, vec![id]);
        assert!(report.unmatched_tail.is_empty());
        assert!(remote.try_recv_input().is_none());
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_repeating_prompt_rule_not_refired_on_close() {
        let (streams, mut remote) = memory_transport();
        let mut session = InteractionSession::new(quiet());
        let id = session
            .register(Rule::contains("login:").on_stdout().partials().send("user\n"))
            .unwrap();
        session.start(streams).unwrap();

        remote.write(Channel::StandardOutput, "login: ");
        let input = timeout(STEP, remote.recv_input()).await.unwrap().unwrap();
        assert_eq!(&input[..], b"user\n");

        remote.close(Channel::StandardOutput);
        remote.close(Channel::StandardError);
        let report = session.wait().await.unwrap();

        assert_eq!(report.fired, vec![id]);
        assert!(report.unmatched_tail.is_empty());
        assert!(remote.try_recv_input().is_none());
    }

    #[tokio::test]
    async fn test_close_with_pending_prompt_does_not_refire() {
        let (streams, mut remote) = memory_transport();
        let mut session = InteractionSession::new(quiet());
        let handle = session.handle();
        let id = session
            .register(Rule::contains("Password:").partials().send_hidden("secret\n"))
            .unwrap();
        session.start(streams).unwrap();

        remote.write(Channel::StandardError, "Password: ");
        timeout(STEP, remote.recv_input()).await.unwrap().unwrap();

        handle.close();
        let report = assert_ok!(timeout(STEP, session.wait()).await.unwrap());

        assert_eq!(report.fired, vec![id]);
        assert!(report.unmatched_tail.is_empty());
        assert!(remote.try_recv_input().is_none());
    }

    #[tokio::test]
    async fn test_line_rule_fires_on_complete_line() {
        let (streams, mut remote) = memory_transport();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let fired = Arc::new(Mutex::new(Vec::new()));

        let seen_by_observer = seen.clone();
        let fired_by_rule = fired.clone();
        let mut session = InteractionSession::builder()
            .config(quiet())
            .rule(Rule::contains("ok").lines().invoke(move |event, _| {
                fired_by_rule.lock().unwrap().push(event.clone());
                Ok(())
            }))
            .on_event(move |event| seen_by_observer.lock().unwrap().push(event.clone()))
            .build();

        session.start(streams).unwrap();
        remote.write(Channel::StandardOutput, "o");
        remote.write(Channel::StandardOutput, "k\n");
        remote.close(Channel::StandardOutput);
        remote.close(Channel::StandardError);
        let report = session.wait().await.unwrap();

        let fired = fired.lock().unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].kind, EventKind::Line);
        assert_eq!(&fired[0].content[..], b"ok");

        // Only the advisory partial went unmatched.
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, EventKind::Partial);
        assert_eq!(&seen[0].content[..], b"o");

        assert_eq!(report.lines_on(Channel::StandardOutput), 1);
        assert!(report.unmatched_tail.is_empty());
    }

    #[tokio::test]
    async fn test_draining_until_both_channels_close() {
        let (streams, mut remote) = memory_transport();
        let mut session = InteractionSession::new(quiet());
        let handle = session.handle();
        session.start(streams).unwrap();

        remote.write(Channel::StandardOutput, "done\n");
        remote.close(Channel::StandardOutput);
        wait_for_state(&handle, SessionState::Draining).await;

        remote.write(Channel::StandardError, "warning\n");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(handle.state(), SessionState::Draining);

        remote.close(Channel::StandardError);
        let report = session.wait().await.unwrap();

        assert_eq!(handle.state(), SessionState::Closed);
        assert_eq!(report.lines_on(Channel::StandardOutput), 1);
        assert_eq!(report.lines_on(Channel::StandardError), 1);
    }

    #[tokio::test]
    async fn test_unmatched_tail_is_reported() {
        let (streams, mut remote) = memory_transport();
        let mut session = InteractionSession::new(quiet());
        session.start(streams).unwrap();

        remote.write(Channel::StandardError, "line\n$ ");
        remote.close(Channel::StandardError);
        remote.close(Channel::StandardOutput);
        let report = session.wait().await.unwrap();

        assert_eq!(report.unmatched_tail.len(), 1);
        let tail = &report.unmatched_tail[0];
        assert_eq!(tail.channel, Channel::StandardError);
        assert_eq!(tail.kind, EventKind::Partial);
        assert_eq!(&tail.content[..], b"$ ");
    }

    #[tokio::test]
    async fn test_dispatch_failure_does_not_stop_processing() {
        let (streams, mut remote) = memory_transport();
        remote.close_input();

        let mut session = InteractionSession::new(quiet());
        let answer = session.register(Rule::contains("?").send("y\n")).unwrap();
        let broken = session
            .register(Rule::contains("boom").invoke(|_, _| Err("handler failed".into())))
            .unwrap();
        let last = session.register(Rule::contains("end").on_stderr().send("bye\n")).unwrap();
        session.start(streams).unwrap();

        remote.write(Channel::StandardOutput, "continue?\nboom\n");
        remote.write(Channel::StandardError, "end\n");
        remote.close(Channel::StandardOutput);
        remote.close(Channel::StandardError);
        let report = session.wait().await.unwrap();

        assert!(report.fired.contains(&answer));
        assert!(report.fired.contains(&broken));
        assert!(report.fired.contains(&last));
        assert_eq!(report.dispatch_failures.len(), 3);
        assert_eq!(report.lines_on(Channel::StandardOutput), 2);
    }

    #[tokio::test]
    async fn test_abort_on_dispatch_failure() {
        let (streams, remote) = memory_transport();
        let mut session = InteractionSession::new(SessionConfig {
            abort_on_dispatch_failure: true,
            ..quiet()
        });
        let id = session
            .register(Rule::contains("x").invoke(|_, _| Err("nope".into())))
            .unwrap();
        session.start(streams).unwrap();

        remote.write(Channel::StandardOutput, "x\n");
        let err = timeout(STEP, session.wait()).await.unwrap().unwrap_err();

        match err {
            Error::Session(SessionError::Aborted(e)) => assert_eq!(e.rule, id),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_no_rules_fire_after_abort() {
        let (streams, remote) = memory_transport();
        let mut session = InteractionSession::new(SessionConfig {
            abort_on_dispatch_failure: true,
            ..quiet()
        });
        let handle = session.handle();
        let failing = session
            .register(Rule::contains("x").lines().invoke(|_, _| Err("nope".into())))
            .unwrap();
        let later = Arc::new(Mutex::new(Vec::new()));
        let later_by_rule = later.clone();
        session
            .register(Rule::contains("y").invoke(move |event, _| {
                later_by_rule.lock().unwrap().push(event.clone());
                Ok(())
            }))
            .unwrap();
        session.start(streams).unwrap();

        // Both lines arrive in one chunk; the second is already queued
        // when the first aborts the session.
        remote.write(Channel::StandardOutput, "x\ny\npartial y");
        let err = timeout(STEP, session.wait()).await.unwrap().unwrap_err();

        assert!(matches!(err, Error::Session(SessionError::Aborted(_))));
        assert!(later.lock().unwrap().is_empty());
        assert_eq!(handle.report().fired, vec![failing]);
    }

    #[tokio::test]
    async fn test_no_rules_fire_after_transport_failure() {
        let (streams, mut remote) = memory_transport();
        let mut session = InteractionSession::new(quiet());
        let handle = session.handle();
        session
            .register(Rule::contains("login:").on_stdout().send("user\n"))
            .unwrap();
        session.start(streams).unwrap();

        remote.fail(Channel::StandardError, TransportError::Disconnected);
        wait_for_state(&handle, SessionState::Closed).await;
        remote.write(Channel::StandardOutput, "login: ");

        let err = timeout(STEP, session.wait()).await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Disconnected)));
        assert!(handle.report().fired.is_empty());
        assert!(remote.try_recv_input().is_none());
    }

    #[tokio::test]
    async fn test_transport_error_closes_session() {
        let (streams, mut remote) = memory_transport();
        let mut session = InteractionSession::new(quiet());
        session.start(streams).unwrap();

        remote.write(Channel::StandardError, "half a li");
        remote.fail(Channel::StandardError, TransportError::Disconnected);
        let err = timeout(STEP, session.wait()).await.unwrap().unwrap_err();

        assert!(matches!(err, Error::Transport(TransportError::Disconnected)));
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_close_unblocks_waiting_channels() {
        let (streams, _remote) = memory_transport();
        let mut session = InteractionSession::new(quiet());
        let handle = session.handle();
        session.start(streams).unwrap();

        handle.close();
        let report = assert_ok!(timeout(STEP, session.wait()).await.unwrap());

        assert!(report.fired.is_empty());
        assert_eq!(handle.state(), SessionState::Closed);
        assert!(matches!(
            handle.register(Rule::contains("late").send("x")),
            Err(Error::Session(SessionError::Closed))
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_misuse() {
        let mut session = InteractionSession::new(quiet());
        assert!(matches!(
            session.wait().await,
            Err(Error::Session(SessionError::NotStarted))
        ));

        let (streams, _remote) = memory_transport();
        assert_ok!(session.start(streams));
        let (again, _other) = memory_transport();
        assert!(matches!(
            session.start(again),
            Err(Error::Session(SessionError::AlreadyStarted))
        ));
        session.close();
        let _ = session.wait().await;
    }

    #[tokio::test]
    async fn test_pending_tracks_partial_content() {
        let (streams, mut remote) = memory_transport();
        let mut session = InteractionSession::new(quiet());
        let handle = session.handle();
        session.start(streams).unwrap();

        remote.write(Channel::StandardOutput, "Password: ");
        for _ in 0..200 {
            if !handle.pending(Channel::StandardOutput).is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(&handle.pending(Channel::StandardOutput)[..], b"Password: ");
        assert_eq!(handle.lines_observed(Channel::StandardOutput), 0);

        handle.close();
        assert_ok!(session.wait().await);
    }
}
