//! Stream demultiplexer: raw byte chunks to line and partial events.
//!
//! Bytes accumulate in a per-channel buffer. Every line break completes a
//! `Line` event and resets the buffer; bytes left over after the last break
//! of a chunk are exposed early as a `Partial` event carrying the whole
//! buffer. This is what lets a rule react to a prompt such as `password: `
//! that is never followed by a line break.

use std::borrow::Cow;
use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use futures_util::{StreamExt, stream};
use log::{debug, trace, warn};
use memchr::memchr;

use super::{AnsiStripper, Channel, Event, EventKind};
use crate::error::TransportError;

/// Default bound on the content of a `Partial` event.
pub const DEFAULT_PARTIAL_WINDOW: usize = 64 * 1024;

/// Line splitter for a single output channel.
#[derive(Debug)]
pub struct Demultiplexer {
    /// Channel every emitted event is tagged with.
    channel: Channel,

    /// Bytes received since the last line break.
    buffer: BytesMut,

    /// Sequence number of the next event.
    next_sequence: u64,

    /// Optional escape sequence stripper applied before splitting.
    stripper: Option<AnsiStripper>,

    /// Largest number of trailing bytes a `Partial` carries.
    partial_window: usize,

    /// Whether the buffer as it stands was already emitted as a `Partial`.
    advertised: bool,

    /// Set once end-of-stream has been processed.
    closed: bool,
}

impl Demultiplexer {
    /// Create a demultiplexer for `channel`.
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            buffer: BytesMut::with_capacity(1024),
            next_sequence: 0,
            stripper: None,
            partial_window: DEFAULT_PARTIAL_WINDOW,
            advertised: false,
            closed: false,
        }
    }

    /// Enable or disable ANSI escape stripping.
    pub fn with_ansi_stripping(mut self, enabled: bool) -> Self {
        self.stripper = enabled.then(AnsiStripper::new);
        self
    }

    /// Bound the content of `Partial` events to the last `window` bytes of
    /// the buffer. `Line` events and the final flush are never cut.
    ///
    /// Output that runs long without a line break (progress bars redrawn
    /// with `\r`) would otherwise be copied in full for every chunk.
    pub fn with_partial_window(mut self, window: usize) -> Self {
        self.partial_window = window.max(1);
        self
    }

    /// The channel this demultiplexer serves.
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Content received since the last line break.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Number of events emitted so far.
    pub fn emitted(&self) -> u64 {
        self.next_sequence
    }

    /// Whether end-of-stream has been processed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Feed one chunk of raw bytes and iterate over the resulting events.
    ///
    /// Events are produced lazily. Dropping the iterator early still
    /// consumes the rest of the chunk, so the buffer never holds a line
    /// break.
    pub fn feed<'a>(&'a mut self, chunk: &'a [u8]) -> Events<'a> {
        let data = if self.closed {
            debug!("{}: ignoring {} bytes after close", self.channel, chunk.len());
            Cow::Borrowed(&[][..])
        } else {
            match self.stripper.as_mut() {
                Some(stripper) => Cow::Owned(stripper.strip(chunk)),
                None => Cow::Borrowed(chunk),
            }
        };

        Events {
            demux: self,
            data,
            pos: 0,
        }
    }

    /// Process end-of-stream.
    ///
    /// Returns the unterminated remainder as a final `Partial` event, if
    /// any. No `Line` is synthesized for it. The event is marked
    /// [`repeated`](Event::repeated) when nothing arrived since the last
    /// `Partial`. Afterwards the demultiplexer emits nothing.
    pub fn finish(&mut self) -> Option<Event> {
        if self.closed {
            return None;
        }
        self.closed = true;

        if self.buffer.is_empty() {
            return None;
        }
        let content = self.buffer.split().freeze();
        let mut event = self.emit(EventKind::Partial, content);
        event.repeated = self.advertised;
        Some(event)
    }

    fn emit(&mut self, kind: EventKind, content: Bytes) -> Event {
        let event = Event::new(self.channel, kind, content, self.next_sequence);
        self.next_sequence += 1;
        trace!("demux: {}", event);
        event
    }

    /// Turn a transport byte source into a lazy stream of events.
    ///
    /// The stream ends after the source ends and the final partial, if any,
    /// has been yielded. A source error is yielded once and ends the stream;
    /// buffered content is then discarded with a warning.
    pub fn into_stream<S>(
        self,
        source: S,
    ) -> impl Stream<Item = Result<Event, TransportError>> + Send + 'static
    where
        S: Stream<Item = Result<Bytes, TransportError>> + Send + Unpin + 'static,
    {
        let state = Some((self, source, VecDeque::new()));

        stream::unfold(state, |state| async move {
            let (mut demux, mut source, mut queued) = state?;
            loop {
                if let Some(event) = queued.pop_front() {
                    return Some((Ok(event), Some((demux, source, queued))));
                }

                match source.next().await {
                    Some(Ok(chunk)) => queued.extend(demux.feed(&chunk)),
                    Some(Err(e)) => {
                        if !demux.pending().is_empty() {
                            warn!(
                                "{}: {} buffered bytes lost after transport error",
                                demux.channel,
                                demux.pending().len()
                            );
                        }
                        demux.closed = true;
                        return Some((Err(e), None));
                    }
                    None => return demux.finish().map(|event| (Ok(event), None)),
                }
            }
        })
    }
}

/// Lazy iterator over the events produced by one chunk.
#[derive(Debug)]
pub struct Events<'a> {
    demux: &'a mut Demultiplexer,
    data: Cow<'a, [u8]>,
    pos: usize,
}

impl Iterator for Events<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        let rest = &self.data[self.pos..];
        if rest.is_empty() {
            return None;
        }

        match memchr(b'\n', rest) {
            Some(i) => {
                self.demux.buffer.extend_from_slice(&rest[..i]);
                self.pos += i + 1;

                // CRLF terminals; the CR may have arrived in an earlier chunk
                if self.demux.buffer.last() == Some(&b'\r') {
                    let len = self.demux.buffer.len();
                    self.demux.buffer.truncate(len - 1);
                }

                let content = self.demux.buffer.split().freeze();
                self.demux.advertised = false;
                Some(self.demux.emit(EventKind::Line, content))
            }
            None => {
                self.demux.buffer.extend_from_slice(rest);
                self.pos = self.data.len();

                let buffer = &self.demux.buffer;
                let start = buffer.len().saturating_sub(self.demux.partial_window);
                let content = Bytes::copy_from_slice(&buffer[start..]);
                self.demux.advertised = true;
                Some(self.demux.emit(EventKind::Partial, content))
            }
        }
    }
}

impl Drop for Events<'_> {
    fn drop(&mut self) {
        for _ in self.by_ref() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(demux: &mut Demultiplexer, chunk: &[u8]) -> Vec<(EventKind, Vec<u8>)> {
        demux
            .feed(chunk)
            .map(|e| (e.kind, e.content.to_vec()))
            .collect()
    }

    #[test]
    fn test_one_line_per_break() {
        let mut demux = Demultiplexer::new(Channel::StandardOutput);
        let events = collect(&mut demux, b"one\ntwo\n\nthree\n");
        assert_eq!(
            events,
            vec![
                (EventKind::Line, b"one".to_vec()),
                (EventKind::Line, b"two".to_vec()),
                (EventKind::Line, b"".to_vec()),
                (EventKind::Line, b"three".to_vec()),
            ]
        );
        assert!(demux.pending().is_empty());
        assert!(demux.finish().is_none());
    }

    #[test]
    fn test_partial_then_line() {
        let mut demux = Demultiplexer::new(Channel::StandardOutput);
        assert_eq!(
            collect(&mut demux, b"log"),
            vec![(EventKind::Partial, b"log".to_vec())]
        );
        assert_eq!(
            collect(&mut demux, b"in: "),
            vec![(EventKind::Partial, b"login: ".to_vec())]
        );
        assert_eq!(
            collect(&mut demux, b"x\nrest"),
            vec![
                (EventKind::Line, b"login: x".to_vec()),
                (EventKind::Partial, b"rest".to_vec()),
            ]
        );
    }

    #[test]
    fn test_final_partial_on_finish() {
        let mut demux = Demultiplexer::new(Channel::StandardError);
        let _ = collect(&mut demux, b"done\n$ ");

        let last = demux.finish().unwrap();
        assert_eq!(last.kind, EventKind::Partial);
        assert_eq!(&last.content[..], b"$ ");
        assert_eq!(last.channel, Channel::StandardError);
        assert!(last.repeated);

        assert!(demux.finish().is_none());
        assert!(collect(&mut demux, b"late\n").is_empty());
    }

    #[test]
    fn test_final_partial_marks_repeated_content() {
        let mut demux = Demultiplexer::new(Channel::StandardOutput);
        assert!(demux.feed(b"$ ").all(|e| !e.repeated));
        let _ = collect(&mut demux, b"more");
        assert!(demux.finish().unwrap().repeated);

        // The stripped escape sequence adds nothing new to the buffer.
        let mut demux = Demultiplexer::new(Channel::StandardOutput).with_ansi_stripping(true);
        let _ = collect(&mut demux, b"$ ");
        assert!(collect(&mut demux, b"\x1b[0m").is_empty());
        assert!(demux.finish().unwrap().repeated);

        let mut demux = Demultiplexer::new(Channel::StandardOutput);
        let _ = collect(&mut demux, b"$ ");
        let _ = collect(&mut demux, b"x\n");
        assert!(demux.finish().is_none());
    }

    #[test]
    fn test_partial_window_keeps_the_tail() {
        let mut demux = Demultiplexer::new(Channel::StandardOutput).with_partial_window(8);
        let _ = collect(&mut demux, b"10%\r20%\r30%\r");
        assert_eq!(
            collect(&mut demux, b"Continue? "),
            vec![(EventKind::Partial, b"ntinue? ".to_vec())]
        );
        assert_eq!(demux.pending(), b"10%\r20%\r30%\rContinue? ");

        // Lines and the final flush carry everything.
        assert_eq!(
            collect(&mut demux, b"y\nprogress 1/2 2/2"),
            vec![
                (EventKind::Line, b"10%\r20%\r30%\rContinue? y".to_vec()),
                (EventKind::Partial, b" 1/2 2/2".to_vec()),
            ]
        );
        assert_eq!(&demux.finish().unwrap().content[..], b"progress 1/2 2/2");
    }

    #[test]
    fn test_sequence_numbers_are_ordered() {
        let mut demux = Demultiplexer::new(Channel::StandardOutput);
        let seqs: Vec<u64> = demux.feed(b"a\nb\nc").map(|e| e.sequence).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(demux.emitted(), 3);
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        let mut demux = Demultiplexer::new(Channel::StandardOutput);
        let _ = collect(&mut demux, b"ok\r");
        assert_eq!(
            collect(&mut demux, b"\n"),
            vec![(EventKind::Line, b"ok".to_vec())]
        );
    }

    #[test]
    fn test_invalid_utf8_passes_through() {
        let mut demux = Demultiplexer::new(Channel::StandardOutput);
        assert_eq!(
            collect(&mut demux, b"\xff\xfe\n"),
            vec![(EventKind::Line, vec![0xff, 0xfe])]
        );
    }

    #[test]
    fn test_dropped_iterator_keeps_state() {
        let mut demux = Demultiplexer::new(Channel::StandardOutput);
        {
            let mut events = demux.feed(b"a\nb\npartial");
            assert_eq!(&events.next().unwrap().content[..], b"a");
        }
        assert_eq!(demux.pending(), b"partial");
        assert_eq!(demux.emitted(), 3);
    }

    #[test]
    fn test_ansi_stripping() {
        let mut demux = Demultiplexer::new(Channel::StandardOutput).with_ansi_stripping(true);
        assert_eq!(
            collect(&mut demux, b"\x1b[1;32mpassword:\x1b[0m "),
            vec![(EventKind::Partial, b"password: ".to_vec())]
        );
    }

    #[tokio::test]
    async fn test_into_stream() {
        let chunks: Vec<Result<Bytes, TransportError>> = vec![
            Ok(Bytes::from_static(b"first\nsec")),
            Ok(Bytes::from_static(b"ond\ntail")),
        ];
        let demux = Demultiplexer::new(Channel::StandardOutput);
        let events: Vec<Event> = demux
            .into_stream(stream::iter(chunks))
            .map(|e| e.unwrap())
            .collect()
            .await;

        let kinds: Vec<(EventKind, &[u8])> =
            events.iter().map(|e| (e.kind, &e.content[..])).collect();
        assert_eq!(
            kinds,
            vec![
                (EventKind::Line, &b"first"[..]),
                (EventKind::Partial, &b"sec"[..]),
                (EventKind::Line, &b"second"[..]),
                (EventKind::Partial, &b"tail"[..]),
                (EventKind::Partial, &b"tail"[..]),
            ]
        );
    }

    #[tokio::test]
    async fn test_into_stream_error_ends_stream() {
        let chunks: Vec<Result<Bytes, TransportError>> = vec![
            Ok(Bytes::from_static(b"lost")),
            Err(TransportError::Disconnected),
            Ok(Bytes::from_static(b"never\n")),
        ];
        let demux = Demultiplexer::new(Channel::StandardError);
        let items: Vec<_> = demux.into_stream(stream::iter(chunks)).collect().await;

        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(TransportError::Disconnected)));
    }
}
