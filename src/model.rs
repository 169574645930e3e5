use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// The two-valued result of [`try_start`](crate::Horkos::try_start).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sample {
    /// No completion is visible for this id; the caller owns the work.
    NotSeen,
    /// The id has already been handled; the caller should take the
    /// alternate branch.
    Seen,
}

impl Sample {
    pub fn is_seen(&self) -> bool {
        matches!(self, Sample::Seen)
    }

    pub fn is_not_seen(&self) -> bool {
        !self.is_seen()
    }
}

/// Classification of a process record at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// No record exists for this key.
    NotStarted,
    /// A claimant is in flight; callers must poll.
    Started,
    /// The claimant exceeded `max_processing_time` and is presumed dead.
    Timeout,
    /// Some claimant reported success.
    Completed,
}

/// TTL eviction timestamp, carried at the store's epoch-seconds
/// resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expiration {
    pub instant: SystemTime,
}

impl Expiration {
    pub fn new(instant: SystemTime) -> Self {
        Self { instant }
    }

    /// Builds the instant back from the whole seconds the store persists.
    pub fn from_epoch_secs(secs: u64) -> Self {
        Self {
            instant: UNIX_EPOCH + Duration::from_secs(secs),
        }
    }
}

/// Persisted process record: one deduplication slot per
/// `(id, processor_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process<Id, ProcessorId> {
    /// Caller-chosen key, unique within the processor namespace.
    pub id: Id,
    /// Namespace partitioning the id-space within a shared table.
    pub processor_id: ProcessorId,
    /// Instant the first claimant inserted the record. Set once, never
    /// overwritten.
    pub started_at: SystemTime,
    /// Instant at which some claimant reported success.
    pub completed_at: Option<SystemTime>,
    /// Present iff `completed_at` is present.
    pub expires_on: Option<Expiration>,
}

impl<Id, ProcessorId> Process<Id, ProcessorId> {
    pub fn new(id: Id, processor_id: ProcessorId, started_at: SystemTime) -> Self {
        Self {
            id,
            processor_id,
            started_at,
            completed_at: None,
            expires_on: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn is_timed_out(&self, max_processing_time: Duration, now: SystemTime) -> bool {
        if self.is_completed() {
            return false;
        }

        now.duration_since(self.started_at)
            .is_ok_and(|elapsed| elapsed > max_processing_time)
    }

    /// Classify this record as seen from `now`.
    ///
    /// A completed record stays `Completed` regardless of age; eviction of
    /// stale rows is the store's business. An incomplete record older than
    /// `max_processing_time` is `Timeout`, everything else is `Started`.
    pub fn status(&self, max_processing_time: Duration, now: SystemTime) -> ProcessStatus {
        if self.is_completed() {
            ProcessStatus::Completed
        } else if self.is_timed_out(max_processing_time, now) {
            ProcessStatus::Timeout
        } else {
            ProcessStatus::Started
        }
    }
}

type NextDelayFn = dyn Fn(u32, Duration) -> Duration + Send + Sync;

/// How long and how often to wait on an in-flight peer.
///
/// The coordinator sleeps `initial_delay` before the second claim attempt
/// and feeds each delay through `next_delay` to produce the following one.
/// Once the cumulative wall time since entering the poll loop exceeds
/// `max_poll_duration`, the call fails with
/// [`Error::PollTimeout`](crate::Error::PollTimeout).
#[derive(Clone)]
pub struct PollStrategy {
    pub initial_delay: Duration,
    pub max_poll_duration: Duration,
    next_delay: Arc<NextDelayFn>,
}

impl PollStrategy {
    /// A strategy with a custom delay progression. `next_delay` maps the
    /// zero-based poll number and the previous delay to the next delay;
    /// it must be pure.
    pub fn new(
        initial_delay: Duration,
        max_poll_duration: Duration,
        next_delay: impl Fn(u32, Duration) -> Duration + Send + Sync + 'static,
    ) -> Self {
        Self {
            initial_delay,
            max_poll_duration,
            next_delay: Arc::new(next_delay),
        }
    }

    /// Exponential backoff: each delay is the previous one scaled by
    /// `multiplier` and capped at `max_delay`.
    pub fn backoff(
        initial_delay: Duration,
        multiplier: f64,
        max_delay: Duration,
        max_poll_duration: Duration,
    ) -> Self {
        Self::new(initial_delay, max_poll_duration, move |_, prev| {
            Duration::from_secs_f64(prev.as_secs_f64() * multiplier).min(max_delay)
        })
    }

    /// A fixed delay between polls.
    pub fn linear(delay: Duration, max_poll_duration: Duration) -> Self {
        Self::new(delay, max_poll_duration, move |_, _| delay)
    }

    pub fn next_delay(&self, poll_no: u32, prev_delay: Duration) -> Duration {
        (self.next_delay)(poll_no, prev_delay)
    }
}

impl fmt::Debug for PollStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollStrategy")
            .field("initial_delay", &self.initial_delay)
            .field("max_poll_duration", &self.max_poll_duration)
            .finish_non_exhaustive()
    }
}

/// Configuration for the coordinator.
#[derive(Debug, Clone)]
pub struct Config<ProcessorId> {
    /// Namespace owning this deduplication section of the table.
    pub processor_id: ProcessorId,
    /// A record older than this without a completion is considered
    /// abandoned and may be reclaimed.
    pub max_processing_time: Duration,
    /// Added to the completion instant to produce `expires_on`.
    pub ttl: Duration,
    /// How to wait on in-flight peers.
    pub poll_strategy: PollStrategy,
}

impl<ProcessorId> Config<ProcessorId> {
    pub fn new(
        processor_id: ProcessorId,
        max_processing_time: Duration,
        ttl: Duration,
        poll_strategy: PollStrategy,
    ) -> Self {
        Self {
            processor_id,
            max_processing_time,
            ttl,
            poll_strategy,
        }
    }
}
