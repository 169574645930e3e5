use crate::clock::{Clock, SystemClock};
use crate::error::Error;
use crate::model::{Config, ProcessStatus, Sample};
use crate::persistence::Persistence;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[cfg(feature = "tracing")]
use tracing::{debug, info, instrument, warn};

// No-op macros when tracing is disabled
#[cfg(not(feature = "tracing"))]
macro_rules! debug {
    ($($tt:tt)*) => {{}};
}
#[cfg(not(feature = "tracing"))]
macro_rules! info {
    ($($tt:tt)*) => {{}};
}
#[cfg(not(feature = "tracing"))]
macro_rules! warn {
    ($($tt:tt)*) => {{}};
}

/// Coordinates exactly-once execution of units of work keyed by an opaque
/// id, through a shared table of process records.
///
/// Any number of coordinators, in any number of processes, may target the
/// same table: all ordering derives from the store's conditional-update
/// linearisation, and no in-process state is held between calls.
pub struct Horkos<Id, ProcessorId> {
    persistence: Arc<dyn Persistence<Id, ProcessorId>>,
    config: Config<ProcessorId>,
    clock: Arc<dyn Clock>,
}

impl<Id, ProcessorId> Horkos<Id, ProcessorId>
where
    Id: Clone + Send + Sync + std::fmt::Debug + 'static,
    ProcessorId: Clone + Send + Sync + std::fmt::Debug + 'static,
{
    /// Create a new coordinator using the system clock.
    pub fn new(
        persistence: Arc<dyn Persistence<Id, ProcessorId>>,
        config: Config<ProcessorId>,
    ) -> Self {
        Self::with_clock(persistence, config, Arc::new(SystemClock))
    }

    /// Like [`Horkos::new`] with an explicit clock source.
    pub fn with_clock(
        persistence: Arc<dyn Persistence<Id, ProcessorId>>,
        config: Config<ProcessorId>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            persistence,
            config,
            clock,
        }
    }

    /// Try to claim the id.
    ///
    /// Returns [`Sample::NotSeen`] when this caller should perform the
    /// work, either because no record existed or because the previous
    /// claimant timed out, and [`Sample::Seen`] when the work has already
    /// been handled. While a peer is in flight the call polls, re-claiming
    /// on each attempt, until the peer completes, times out, or the
    /// strategy's `max_poll_duration` elapses; past the deadline it fails
    /// with [`Error::PollTimeout`].
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn try_start(&self, id: Id) -> Result<Sample, Error> {
        let processor_id = self.config.processor_id.clone();
        let max_processing_time = self.config.max_processing_time;
        let strategy = self.config.poll_strategy.clone();

        let poll_started_at = self.clock.now();
        let mut poll_no: u32 = 0;
        let mut delay = strategy.initial_delay;

        loop {
            let now = self.clock.now();
            let prior = self
                .persistence
                .claim(id.clone(), processor_id.clone(), now)
                .await?;

            let status = match &prior {
                Some(process) => process.status(max_processing_time, now),
                None => ProcessStatus::NotStarted,
            };

            match status {
                ProcessStatus::NotStarted => {
                    info!("no prior record, claimed");
                    return Ok(Sample::NotSeen);
                }
                ProcessStatus::Timeout => {
                    // The claim left the stale startedAt in place; the
                    // previous claimant is presumed dead and we proceed as
                    // the new owner.
                    warn!("previous claimant timed out, reclaiming");
                    return Ok(Sample::NotSeen);
                }
                ProcessStatus::Completed => {
                    debug!("already completed");
                    return Ok(Sample::Seen);
                }
                ProcessStatus::Started => {
                    let waited = now
                        .duration_since(poll_started_at)
                        .unwrap_or(Duration::ZERO);

                    if waited >= strategy.max_poll_duration {
                        warn!("peer still running after {:?}, giving up", waited);
                        return Err(Error::PollTimeout { waited });
                    }

                    debug!("peer running, poll {} in {:?}", poll_no, delay);
                    sleep(delay).await;
                    delay = strategy.next_delay(poll_no, delay);
                    poll_no += 1;
                }
            }
        }
    }

    /// Record that the id has been handled.
    ///
    /// Stamps `completed_at` with the current time and `expires_on` with
    /// the configured TTL. Unconditional and idempotent: repeating it only
    /// moves the timestamps forward.
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn complete(&self, id: Id) -> Result<(), Error> {
        let now = self.clock.now();
        self.persistence
            .commit(id, self.config.processor_id.clone(), now, self.config.ttl)
            .await
    }

    /// Run `process` iff the id has not been handled yet.
    ///
    /// On [`Sample::NotSeen`] runs `process`; on its success records the
    /// completion and returns `Some(value)`. On [`Sample::Seen`] returns
    /// `None` without evaluating `process`. If `process` fails, the error
    /// propagates and no completion is recorded: the record stays claimable
    /// again once `max_processing_time` has passed.
    #[cfg_attr(feature = "tracing", instrument(skip(self, process)))]
    pub async fn protect<F, Fut, A>(&self, id: Id, process: F) -> Result<Option<A>, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<A, Error>>,
    {
        match self.try_start(id.clone()).await? {
            Sample::Seen => Ok(None),
            Sample::NotSeen => {
                let value = process().await?;
                self.complete(id).await?;
                Ok(Some(value))
            }
        }
    }

    /// Run exactly one of the two branches, then record the completion in
    /// both cases.
    ///
    /// Marking completion from the `if_seen` side too lets the caller
    /// consume the deduplication slot from the losing branch; by calling
    /// this the caller declares both branches safe to mark handled. A
    /// branch failure propagates and skips the completion.
    #[cfg_attr(feature = "tracing", instrument(skip(self, if_not_seen, if_seen)))]
    pub async fn protect_or_else<FN, FutN, FS, FutS, A>(
        &self,
        id: Id,
        if_not_seen: FN,
        if_seen: FS,
    ) -> Result<A, Error>
    where
        FN: FnOnce() -> FutN,
        FutN: Future<Output = Result<A, Error>>,
        FS: FnOnce() -> FutS,
        FutS: Future<Output = Result<A, Error>>,
    {
        let value = match self.try_start(id.clone()).await? {
            Sample::NotSeen => if_not_seen().await?,
            Sample::Seen => if_seen().await?,
        };

        self.complete(id).await?;
        Ok(value)
    }

    /// Forget the id, making it processable again.
    #[cfg_attr(feature = "tracing", instrument(skip(self)))]
    pub async fn invalidate(&self, id: Id) -> Result<(), Error> {
        self.persistence
            .invalidate(id, self.config.processor_id.clone())
            .await
    }
}
