//! Incremental ingestion of grading results.
//!
//! A streamed response is newline-delimited JSON delivered in chunks that
//! carry no line-boundary guarantee: a chunk may end mid-line or even in the
//! middle of a multi-byte UTF-8 sequence. [`Ingestor`] reassembles complete
//! lines, parses each into a [`ResultRecord`], updates a [`RunningAggregate`]
//! and hands both to a [`ResultSink`] before the next chunk is read.
//!
//! Batch responses (one JSON array) go through [`ingest_batch`], which applies
//! the same per-record update.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::aggregate::RunningAggregate;
use crate::error::IngestError;
use crate::model::ResultRecord;
use crate::traits::ResultSink;

/// Longest prefix of a malformed line that ends up in logs.
const LOGGED_LINE_CHARS: usize = 200;

/// What to do with buffered text when the stream ends without a final newline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailingLine {
    /// Parse the unterminated remainder as a final line.
    #[default]
    Flush,
    /// Drop the unterminated remainder.
    Discard,
}

impl fmt::Display for TrailingLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrailingLine::Flush => write!(f, "flush"),
            TrailingLine::Discard => write!(f, "discard"),
        }
    }
}

impl FromStr for TrailingLine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flush" => Ok(TrailingLine::Flush),
            "discard" => Ok(TrailingLine::Discard),
            other => Err(format!("unknown trailing-line policy: {other}")),
        }
    }
}

/// Tuning for [`ingest_stream`].
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub trailing_line: TrailingLine,
    /// Fail if no chunk arrives within this long. `None` waits forever.
    pub chunk_timeout: Option<Duration>,
}

// ---------------------------------------------------------------------------
// Decoding and framing
// ---------------------------------------------------------------------------

/// Incremental UTF-8 decoder that keeps incomplete sequences between chunks.
///
/// Invalid bytes decode to U+FFFD rather than failing.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `pending + bytes` as forms complete characters.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut out = String::with_capacity(self.pending.len());
        let mut consumed = 0;
        loop {
            let rest = &self.pending[consumed..];
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            consumed += valid + bad;
                        }
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            consumed += valid;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..consumed);
        out
    }

    /// Flush whatever is still pending at end of input.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        self.pending.clear();
        char::REPLACEMENT_CHARACTER.to_string()
    }
}

/// Splits decoded text into complete `\n`-terminated lines.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: String,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text and return every line it completed, without terminators.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);
        let Some(last_newline) = self.buffer.rfind('\n') else {
            return Vec::new();
        };
        let remainder = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, remainder);
        complete
            .split_terminator('\n')
            .map(str::to_owned)
            .collect()
    }

    /// Take the unterminated tail, leaving the framer empty.
    pub fn take_remainder(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }

    pub fn buffered(&self) -> &str {
        &self.buffer
    }
}

// ---------------------------------------------------------------------------
// Ingestor
// ---------------------------------------------------------------------------

/// Push-based NDJSON ingestor for a single submission.
pub struct Ingestor<'s, S: ResultSink + ?Sized> {
    decoder: Utf8Decoder,
    framer: LineFramer,
    aggregate: RunningAggregate,
    sink: &'s mut S,
    trailing_line: TrailingLine,
}

impl<'s, S: ResultSink + ?Sized> Ingestor<'s, S> {
    pub fn new(sink: &'s mut S, trailing_line: TrailingLine) -> Self {
        Self {
            decoder: Utf8Decoder::new(),
            framer: LineFramer::new(),
            aggregate: RunningAggregate::new(),
            sink,
            trailing_line,
        }
    }

    /// Feed one chunk of the response body.
    pub fn push_chunk(&mut self, chunk: &[u8]) {
        let text = self.decoder.decode(chunk);
        for line in self.framer.push(&text) {
            self.process_line(&line);
        }
    }

    pub fn aggregate(&self) -> &RunningAggregate {
        &self.aggregate
    }

    /// End of stream. Applies the trailing-line policy and returns the totals.
    pub fn finish(mut self) -> RunningAggregate {
        let tail = self.decoder.finish();
        for line in self.framer.push(&tail) {
            self.process_line(&line);
        }

        let remainder = self.framer.take_remainder();
        if !remainder.trim().is_empty() {
            match self.trailing_line {
                TrailingLine::Flush => self.process_line(&remainder),
                TrailingLine::Discard => tracing::debug!(
                    bytes = remainder.len(),
                    "discarding unterminated trailing line"
                ),
            }
        }
        self.aggregate
    }

    fn process_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        consume(
            &mut self.aggregate,
            &mut *self.sink,
            line,
            ResultRecord::parse_line(line),
        );
    }
}

/// The per-record update shared by streamed and batch responses.
fn consume<S: ResultSink + ?Sized>(
    aggregate: &mut RunningAggregate,
    sink: &mut S,
    raw: &str,
    parsed: serde_json::Result<ResultRecord>,
) {
    match parsed {
        Ok(record) => {
            let percentage = aggregate.record(&record);
            tracing::debug!(
                file = record.filename(),
                percentage,
                processed = aggregate.processed_count,
                "ingested result"
            );
            sink.on_record(&record, &aggregate.snapshot());
        }
        Err(e) => {
            let preview: String = raw.chars().take(LOGGED_LINE_CHARS).collect();
            tracing::warn!(error = %e, line = %preview, "skipping malformed result");
            aggregate.record_malformed();
            sink.on_malformed(raw, &aggregate.snapshot());
        }
    }
}

/// Apply a complete batch of records in order.
pub fn ingest_batch<S: ResultSink + ?Sized>(
    values: &[serde_json::Value],
    sink: &mut S,
) -> RunningAggregate {
    let mut aggregate = RunningAggregate::new();
    for value in values {
        let parsed = ResultRecord::deserialize(value);
        let raw = if parsed.is_err() {
            value.to_string()
        } else {
            String::new()
        };
        consume(&mut aggregate, sink, &raw, parsed);
    }
    aggregate
}

/// Drive an [`Ingestor`] from an async byte stream until it ends.
///
/// Each loop iteration awaits exactly one chunk. A stream error, an idle
/// timeout, or cancellation stops ingestion, drops the stream, and returns
/// an error.
pub async fn ingest_stream<St, B, E, S>(
    stream: St,
    sink: &mut S,
    options: &IngestOptions,
    cancel: &CancellationToken,
) -> Result<RunningAggregate, IngestError>
where
    St: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
    S: ResultSink + ?Sized,
{
    futures::pin_mut!(stream);
    let mut ingestor = Ingestor::new(sink, options.trailing_line);
    let mut chunks = 0u64;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(chunks, "ingestion cancelled");
                return Err(IngestError::Cancelled);
            }
            next = next_chunk(&mut stream, options.chunk_timeout) => next?,
        };

        match next {
            Some(Ok(chunk)) => {
                chunks += 1;
                ingestor.push_chunk(chunk.as_ref());
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, chunks, "response stream failed");
                return Err(IngestError::Source(e.to_string()));
            }
            None => break,
        }
    }

    let aggregate = ingestor.finish();
    tracing::debug!(chunks, processed = aggregate.processed_count, "stream complete");
    Ok(aggregate)
}

async fn next_chunk<St>(
    stream: &mut St,
    timeout: Option<Duration>,
) -> Result<Option<St::Item>, IngestError>
where
    St: Stream + Unpin,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, stream.next())
            .await
            .map_err(|_| IngestError::ChunkTimeout(limit.as_secs())),
        None => Ok(stream.next().await),
    }
}
