use crate::model::Process;
use crate::Error;
use async_trait::async_trait;
use std::time::{Duration, SystemTime};

/// Abstraction over the strongly-consistent store holding process records.
///
/// Implementations must issue `claim` as a single conditional update that
/// returns the prior item atomically: classification has to see the same
/// snapshot the store used to decide the precondition, otherwise two
/// claimants can both read "no prior record".
#[async_trait]
pub trait Persistence<Id, ProcessorId>: Send + Sync {
    /// Set `started_at := now` on the record keyed by `(id, processor_id)`
    /// if not already present, returning the prior record if one existed.
    async fn claim(
        &self,
        id: Id,
        processor_id: ProcessorId,
        now: SystemTime,
    ) -> Result<Option<Process<Id, ProcessorId>>, Error>;

    /// Unconditionally stamp `completed_at := now` and
    /// `expires_on := now + ttl`. Last writer wins.
    async fn commit(
        &self,
        id: Id,
        processor_id: ProcessorId,
        now: SystemTime,
        ttl: Duration,
    ) -> Result<(), Error>;

    /// Delete the record, making the id claimable again.
    async fn invalidate(&self, id: Id, processor_id: ProcessorId) -> Result<(), Error>;
}
