use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between the receive thread and the consumer.
#[derive(Debug, Default)]
pub struct PipelineStats {
    datagrams_received: AtomicU64,
    datagrams_dropped: AtomicU64,
    empty_datagrams: AtomicU64,
    receive_errors: AtomicU64,
    decode_errors: AtomicU64,
    frames_rejected: AtomicU64,
    subjects_declared: AtomicU64,
    frames_published: AtomicU64,
    sink_rejections: AtomicU64,
}

/// Plain copy of [`PipelineStats`] at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub datagrams_received: u64,
    pub datagrams_dropped: u64,
    pub empty_datagrams: u64,
    pub receive_errors: u64,
    pub decode_errors: u64,
    /// Well-formed frames dropped because they did not fit the subject's schema.
    pub frames_rejected: u64,
    pub subjects_declared: u64,
    pub frames_published: u64,
    pub sink_rejections: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_received(&self) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Datagram discarded because the consumer queue was full or gone.
    pub(crate) fn record_dropped(&self) {
        self.datagrams_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_empty(&self) {
        self.empty_datagrams.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_receive_error(&self) {
        self.receive_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected_frame(&self) {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_declared(&self) {
        self.subjects_declared.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_published(&self) {
        self.frames_published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sink_rejection(&self) {
        self.sink_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            datagrams_dropped: self.datagrams_dropped.load(Ordering::Relaxed),
            empty_datagrams: self.empty_datagrams.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            subjects_declared: self.subjects_declared.load(Ordering::Relaxed),
            frames_published: self.frames_published.load(Ordering::Relaxed),
            sink_rejections: self.sink_rejections.load(Ordering::Relaxed),
        }
    }
}
