//! RingRecorder - in-process flight recorder for the server's own log records.
//!
//! Every log record emitted while the recorder is enabled becomes a
//! [`TraceEvent`] in a bounded ring buffer. The ring is checkpointed once per
//! period: each event carries the generation it was recorded in, and only the
//! current and the previous generation are retained, so a snapshot spans at
//! least one full period when memory allows. The configured size takes
//! precedence: the oldest events are evicted while the buffered bytes exceed it.
//!
//! A zero period disables checkpoint eviction; only the size bound applies.
//!
//! ## Snapshot Format
//!
//! JSON lines: one header object, then one object per event, oldest first.
//!
//! ```text
//! {"format":"flightrec-ring/1","created":"...","period":"1s","size":"64MB","events":2,...}
//! {"seq":0,"generation":0,"timestamp":"...","level":"INFO","target":"web","message":"..."}
//! {"seq":1,"generation":0,"timestamp":"...","level":"DEBUG","target":"web","message":"..."}
//! ```

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use flightrec_core::{
    format_duration, format_size, Recorder, RecorderError, DEFAULT_PERIOD, DEFAULT_SIZE,
};
use log::Record;
use serde::Serialize;

/// Identifies the snapshot layout in the header line.
pub const SNAPSHOT_FORMAT: &str = "flightrec-ring/1";

/// Approximate fixed cost of an event on top of its strings.
const EVENT_OVERHEAD: usize = 64;

/// Used to size the initial reservation on start.
const AVG_EVENT_BYTES: usize = 128;
const MAX_PREALLOCATED_EVENTS: usize = 4096;

// =============================================================================
// Events
// =============================================================================

/// A single captured log record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEvent {
    /// Sequence number, monotonically increasing since the last start.
    pub seq: u64,
    /// Checkpoint generation the event was recorded in.
    pub generation: u64,
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub target: String,
    pub message: String,
}

impl TraceEvent {
    fn from_record(record: &Record) -> Self {
        Self {
            seq: 0,
            generation: 0,
            timestamp: Utc::now(),
            level: record.level().to_string(),
            target: record.target().to_string(),
            message: record.args().to_string(),
        }
    }

    /// Approximate number of bytes this event occupies in the ring.
    pub fn cost(&self) -> usize {
        EVENT_OVERHEAD + self.level.len() + self.target.len() + self.message.len()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotHeader {
    format: &'static str,
    created: DateTime<Utc>,
    period: String,
    size: String,
    events: usize,
    bytes: usize,
    dropped: u64,
    generation: u64,
}

// =============================================================================
// Ring
// =============================================================================

struct Ring {
    events: VecDeque<TraceEvent>,
    bytes: usize,
    next_seq: u64,
    generation: u64,
    checkpoint: Instant,
    dropped: u64,
}

impl Ring {
    fn new(now: Instant) -> Self {
        Self {
            events: VecDeque::new(),
            bytes: 0,
            next_seq: 0,
            generation: 0,
            checkpoint: now,
            dropped: 0,
        }
    }

    fn reset(&mut self, now: Instant) {
        self.events.clear();
        self.bytes = 0;
        self.next_seq = 0;
        self.generation = 0;
        self.checkpoint = now;
        self.dropped = 0;
    }

    /// Move to a new generation for every full period elapsed since the last checkpoint.
    fn advance(&mut self, now: Instant, period: Duration) {
        if period.is_zero() {
            return;
        }
        let elapsed = now.saturating_duration_since(self.checkpoint);
        if elapsed >= period {
            let steps = elapsed.as_nanos() / period.as_nanos();
            self.generation = self
                .generation
                .saturating_add(u64::try_from(steps).unwrap_or(u64::MAX));
            self.checkpoint = now;
        }
    }

    fn push(&mut self, mut event: TraceEvent, now: Instant, period: Duration, size: usize) {
        self.advance(now, period);

        event.seq = self.next_seq;
        event.generation = self.generation;
        self.next_seq += 1;
        self.bytes += event.cost();
        self.events.push_back(event);

        self.trim(period, size);
    }

    fn trim(&mut self, period: Duration, size: usize) {
        while let Some(front) = self.events.front() {
            let cost = front.cost();
            let stale = !period.is_zero() && front.generation.saturating_add(1) < self.generation;
            if !stale && self.bytes <= size {
                break;
            }
            self.events.pop_front();
            self.bytes -= cost;
            self.dropped += 1;
        }
    }
}

// =============================================================================
// RingRecorder
// =============================================================================

struct Shared {
    enabled: AtomicBool,
    snapshot_active: AtomicBool,
    period_ns: AtomicU64,
    size: AtomicUsize,
    ring: Mutex<Ring>,
}

impl Shared {
    fn period(&self) -> Duration {
        Duration::from_nanos(self.period_ns.load(Ordering::Relaxed))
    }

    fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    fn ring(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, event: TraceEvent) {
        let (period, size) = (self.period(), self.size());
        self.ring().push(event, Instant::now(), period, size);
    }
}

/// Flight recorder backed by an in-memory ring of log records.
///
/// Cloning yields another handle to the same ring.
#[derive(Clone)]
pub struct RingRecorder {
    shared: Arc<Shared>,
}

/// Write side of a [`RingRecorder`], handed to the logger.
#[derive(Clone)]
pub struct EventSink {
    shared: Arc<Shared>,
}

impl RingRecorder {
    pub fn new() -> Self {
        let period_ns = u64::try_from(DEFAULT_PERIOD.as_nanos()).unwrap_or(u64::MAX);
        Self {
            shared: Arc::new(Shared {
                enabled: AtomicBool::new(false),
                snapshot_active: AtomicBool::new(false),
                period_ns: AtomicU64::new(period_ns),
                size: AtomicUsize::new(DEFAULT_SIZE),
                ring: Mutex::new(Ring::new(Instant::now())),
            }),
        }
    }

    /// Get a handle that feeds log records into this recorder.
    pub fn sink(&self) -> EventSink {
        EventSink {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Default for RingRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink {
    /// Capture `record` if the recorder is enabled.
    pub fn record(&self, record: &Record) {
        if !self.shared.enabled.load(Ordering::Acquire) {
            return;
        }
        self.shared.push(TraceEvent::from_record(record));
    }
}

/// Clears the snapshot flag when an export ends, successfully or not.
struct ActiveSnapshot<'a>(&'a AtomicBool);

impl Drop for ActiveSnapshot<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct CountingWriter<'a> {
    inner: &'a mut dyn Write,
    count: u64,
}

impl Write for CountingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Recorder for RingRecorder {
    fn enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Acquire)
    }

    fn start(&mut self) -> Result<(), RecorderError> {
        if self.enabled() {
            return Err(RecorderError::AlreadyEnabled);
        }

        let size = self.shared.size();
        if size == 0 {
            return Err(RecorderError::Allocation { requested: 0 });
        }

        {
            let mut ring = self.shared.ring();
            ring.reset(Instant::now());
            let reserve = (size / AVG_EVENT_BYTES).clamp(1, MAX_PREALLOCATED_EVENTS);
            ring.events
                .try_reserve(reserve)
                .map_err(|_| RecorderError::Allocation { requested: size })?;
        }

        self.shared.enabled.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RecorderError> {
        if !self.enabled() {
            return Err(RecorderError::NotEnabled);
        }
        self.shared.enabled.store(false, Ordering::Release);
        Ok(())
    }

    fn set_period(&mut self, period: Duration) {
        let nanos = u64::try_from(period.as_nanos()).unwrap_or(u64::MAX);
        self.shared.period_ns.store(nanos, Ordering::Relaxed);
    }

    fn set_size(&mut self, size: usize) {
        self.shared.size.store(size, Ordering::Relaxed);
        let period = self.shared.period();
        self.shared.ring().trim(period, size);
    }

    fn write_snapshot(&self, sink: &mut dyn Write) -> Result<u64, RecorderError> {
        if self
            .shared
            .snapshot_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RecorderError::SnapshotActive);
        }
        let _active = ActiveSnapshot(&self.shared.snapshot_active);

        // Copy out so that logging is not blocked while the sink drains
        let (header, events) = {
            let ring = self.shared.ring();
            let header = SnapshotHeader {
                format: SNAPSHOT_FORMAT,
                created: Utc::now(),
                period: format_duration(self.shared.period()),
                size: format_size(self.shared.size()),
                events: ring.events.len(),
                bytes: ring.bytes,
                dropped: ring.dropped,
                generation: ring.generation,
            };
            (header, ring.events.iter().cloned().collect::<Vec<_>>())
        };

        let mut out = CountingWriter {
            inner: sink,
            count: 0,
        };
        serde_json::to_writer(&mut out, &header).map_err(io::Error::from)?;
        out.write_all(b"\n")?;
        for event in &events {
            serde_json::to_writer(&mut out, event).map_err(io::Error::from)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;

        Ok(out.count)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    fn log_line(sink: &EventSink, message: &str) {
        sink.record(
            &Record::builder()
                .args(format_args!("{}", message))
                .level(Level::Info)
                .target("ring-test")
                .build(),
        );
    }

    fn make_event(message: &str) -> TraceEvent {
        TraceEvent {
            seq: 0,
            generation: 0,
            timestamp: Utc::now(),
            level: "INFO".to_string(),
            target: "t".to_string(),
            message: message.to_string(),
        }
    }

    fn snapshot_lines(recorder: &RingRecorder) -> Vec<serde_json::Value> {
        let mut buf = Vec::new();
        let written = recorder.write_snapshot(&mut buf).unwrap();
        assert_eq!(written, buf.len() as u64);
        String::from_utf8(buf)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_start_stop() {
        let mut recorder = RingRecorder::new();
        assert!(!recorder.enabled());

        recorder.start().unwrap();
        assert!(recorder.enabled());
        assert!(matches!(recorder.start(), Err(RecorderError::AlreadyEnabled)));

        recorder.stop().unwrap();
        assert!(!recorder.enabled());
        assert!(matches!(recorder.stop(), Err(RecorderError::NotEnabled)));
    }

    #[test]
    fn test_zero_size_cannot_start() {
        let mut recorder = RingRecorder::new();
        recorder.set_size(0);
        assert!(matches!(
            recorder.start(),
            Err(RecorderError::Allocation { requested: 0 })
        ));
        assert!(!recorder.enabled());
    }

    #[test]
    fn test_sink_ignores_records_while_stopped() {
        let mut recorder = RingRecorder::new();
        let sink = recorder.sink();

        log_line(&sink, "before start");
        recorder.start().unwrap();
        log_line(&sink, "while running");
        recorder.stop().unwrap();
        log_line(&sink, "after stop");

        let ring = recorder.shared.ring();
        assert_eq!(ring.events.len(), 1);
        assert_eq!(ring.events[0].message, "while running");
    }

    #[test]
    fn test_size_eviction() {
        let mut recorder = RingRecorder::new();
        let sink = recorder.sink();
        let per_event = make_event("event-00").cost();
        recorder.set_size(per_event * 3);
        recorder.start().unwrap();

        for i in 0..10 {
            log_line(&sink, &format!("event-{:02}", i));
        }

        let ring = recorder.shared.ring();
        assert_eq!(ring.events.len(), 3);
        assert!(ring.bytes <= per_event * 3);
        assert_eq!(ring.dropped, 7);
        assert_eq!(ring.events[0].message, "event-07");
        assert_eq!(ring.events[2].seq, 9);
    }

    #[test]
    fn test_set_size_trims_live() {
        let mut recorder = RingRecorder::new();
        let sink = recorder.sink();
        recorder.start().unwrap();
        for i in 0..5 {
            log_line(&sink, &format!("event-{:02}", i));
        }

        recorder.set_size(make_event("event-00").cost());
        let ring = recorder.shared.ring();
        assert_eq!(ring.events.len(), 1);
        assert_eq!(ring.events[0].message, "event-04");
    }

    #[test]
    fn test_checkpoint_keeps_two_generations() {
        let period = Duration::from_secs(1);
        let start = Instant::now();
        let mut ring = Ring::new(start);

        ring.push(make_event("g0"), start, period, usize::MAX);
        ring.push(make_event("g1"), start + period, period, usize::MAX);
        assert_eq!(ring.events.len(), 2);

        ring.push(make_event("g2"), start + period * 2, period, usize::MAX);
        let kept: Vec<_> = ring.events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(kept, ["g1", "g2"]);
        assert_eq!(ring.generation, 2);
        assert_eq!(ring.dropped, 1);
    }

    #[test]
    fn test_checkpoint_skips_idle_periods() {
        let period = Duration::from_millis(100);
        let start = Instant::now();
        let mut ring = Ring::new(start);

        ring.push(make_event("old"), start, period, usize::MAX);
        ring.push(make_event("new"), start + period * 5, period, usize::MAX);

        assert_eq!(ring.generation, 5);
        assert_eq!(ring.events.len(), 1);
        assert_eq!(ring.events[0].message, "new");
    }

    #[test]
    fn test_zero_period_disables_checkpoint_eviction() {
        let start = Instant::now();
        let mut ring = Ring::new(start);

        ring.push(make_event("a"), start, Duration::ZERO, usize::MAX);
        ring.push(
            make_event("b"),
            start + Duration::from_secs(3600),
            Duration::ZERO,
            usize::MAX,
        );
        assert_eq!(ring.events.len(), 2);
        assert_eq!(ring.generation, 0);
    }

    #[test]
    fn test_snapshot_format() {
        let mut recorder = RingRecorder::new();
        let sink = recorder.sink();
        recorder.set_period(Duration::from_secs(2));
        recorder.set_size(4 * 1024);
        recorder.start().unwrap();
        log_line(&sink, "first");
        log_line(&sink, "second");

        let lines = snapshot_lines(&recorder);
        assert_eq!(lines.len(), 3);

        let header = &lines[0];
        assert_eq!(header["format"], SNAPSHOT_FORMAT);
        assert_eq!(header["period"], "2s");
        assert_eq!(header["size"], "4KB");
        assert_eq!(header["events"], 2);

        assert_eq!(lines[1]["message"], "first");
        assert_eq!(lines[1]["level"], "INFO");
        assert_eq!(lines[1]["target"], "ring-test");
        assert_eq!(lines[2]["message"], "second");
        assert_eq!(lines[2]["seq"], 1);
    }

    #[test]
    fn test_overlapping_snapshot_rejected() {
        let mut recorder = RingRecorder::new();
        recorder.start().unwrap();

        recorder.shared.snapshot_active.store(true, Ordering::SeqCst);
        let mut buf = Vec::new();
        assert!(matches!(
            recorder.write_snapshot(&mut buf),
            Err(RecorderError::SnapshotActive)
        ));
        assert!(buf.is_empty());

        recorder.shared.snapshot_active.store(false, Ordering::SeqCst);
        recorder.write_snapshot(&mut buf).unwrap();
        assert!(!recorder.shared.snapshot_active.load(Ordering::SeqCst));
    }

    #[test]
    fn test_snapshot_flag_released_on_io_error() {
        struct FailingWriter;

        impl Write for FailingWriter {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut recorder = RingRecorder::new();
        recorder.start().unwrap();

        assert!(matches!(
            recorder.write_snapshot(&mut FailingWriter),
            Err(RecorderError::Io(_))
        ));
        assert!(!recorder.shared.snapshot_active.load(Ordering::SeqCst));
    }
}
