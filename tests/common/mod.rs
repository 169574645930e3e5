use async_trait::async_trait;
use horkos::{Error, Expiration, Persistence, Process};
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

/// In-memory stand-in for the DynamoDB adapter with the same semantics:
/// claim sets `started_at` only if the record is absent and returns the
/// prior record, commit upserts the completion stamp, timestamps carry the
/// store's millisecond/second resolution.
pub struct MemoryPersistence<Id, ProcessorId> {
    records: Mutex<HashMap<(Id, ProcessorId), Process<Id, ProcessorId>>>,
}

impl<Id, ProcessorId> MemoryPersistence<Id, ProcessorId> {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<Id, ProcessorId> Persistence<Id, ProcessorId> for MemoryPersistence<Id, ProcessorId>
where
    Id: Clone + Eq + Hash + Send + Sync + 'static,
    ProcessorId: Clone + Eq + Hash + Send + Sync + 'static,
{
    async fn claim(
        &self,
        id: Id,
        processor_id: ProcessorId,
        now: SystemTime,
    ) -> Result<Option<Process<Id, ProcessorId>>, Error> {
        let mut records = self.records.lock().await;
        let key = (id.clone(), processor_id.clone());

        match records.get(&key) {
            Some(prior) => Ok(Some(prior.clone())),
            None => {
                records.insert(key, Process::new(id, processor_id, truncate_millis(now)));
                Ok(None)
            }
        }
    }

    async fn commit(
        &self,
        id: Id,
        processor_id: ProcessorId,
        now: SystemTime,
        ttl: Duration,
    ) -> Result<(), Error> {
        let mut records = self.records.lock().await;
        let key = (id.clone(), processor_id.clone());

        let record = records
            .entry(key)
            .or_insert_with(|| Process::new(id, processor_id, truncate_millis(now)));
        record.completed_at = Some(truncate_millis(now));
        record.expires_on = Some(Expiration::new(truncate_secs(now + ttl)));

        Ok(())
    }

    async fn invalidate(&self, id: Id, processor_id: ProcessorId) -> Result<(), Error> {
        self.records.lock().await.remove(&(id, processor_id));
        Ok(())
    }
}

fn truncate_millis(instant: SystemTime) -> SystemTime {
    let millis = instant
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64;
    UNIX_EPOCH + Duration::from_millis(millis)
}

fn truncate_secs(instant: SystemTime) -> SystemTime {
    let secs = instant
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs();
    UNIX_EPOCH + Duration::from_secs(secs)
}
