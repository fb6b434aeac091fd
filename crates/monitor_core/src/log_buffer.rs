use std::collections::VecDeque;

/// Maximum number of log lines kept for display.
pub const LOG_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    Error,
    Warning,
    Info,
    Plain,
}

impl LogSeverity {
    /// Severity by marker substring, checked most severe first.
    pub fn infer(line: &str) -> Self {
        if line.contains("ERROR") {
            LogSeverity::Error
        } else if line.contains("WARNING") {
            LogSeverity::Warning
        } else if line.contains("INFO") {
            LogSeverity::Info
        } else {
            LogSeverity::Plain
        }
    }
}

/// Channel a log line arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    Socket,
    Poll,
    Client,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub seq: u64,
    pub text: String,
    pub severity: LogSeverity,
    pub source: LogSource,
}

/// Ordered, capped log buffer. Oldest entries are evicted first.
///
/// Lines delivered by both the socket and the poll loop are kept twice; only
/// consecutive poll batches are reconciled against each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    next_seq: u64,
    last_poll_batch: Vec<String>,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }
}

impl LogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            next_seq: 1,
            last_poll_batch: Vec::new(),
        }
    }

    /// Appends a line with inferred severity and returns its sequence number.
    pub fn push(&mut self, text: impl Into<String>, source: LogSource) -> u64 {
        let text = text.into();
        let severity = LogSeverity::infer(&text);
        self.push_with_severity(text, severity, source)
    }

    pub fn push_with_severity(
        &mut self,
        text: impl Into<String>,
        severity: LogSeverity,
        source: LogSource,
    ) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            seq,
            text: text.into(),
            severity,
            source,
        });
        seq
    }

    /// Appends the lines of a polled log tail that were not part of the previous tail.
    ///
    /// Returns how many lines were appended.
    pub fn append_poll_batch(&mut self, batch: Vec<String>) -> usize {
        let skip = overlap_len(&self.last_poll_batch, &batch);
        let fresh = batch.len() - skip;
        for line in &batch[skip..] {
            self.push(line.clone(), LogSource::Poll);
        }
        self.last_poll_batch = batch;
        fresh
    }

    /// Drops all entries and the poll history. Sequence numbers keep increasing.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.last_poll_batch.clear();
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Longest `k` such that the last `k` lines of `previous` equal the first `k` of `batch`.
fn overlap_len(previous: &[String], batch: &[String]) -> usize {
    let max = previous.len().min(batch.len());
    (1..=max)
        .rev()
        .find(|&k| previous[previous.len() - k..] == batch[..k])
        .unwrap_or(0)
}
