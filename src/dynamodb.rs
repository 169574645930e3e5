use crate::error::Error;
use crate::model::{Expiration, Process};
use crate::persistence::Persistence;
use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// DynamoDB-backed store adapter.
///
/// One item per `(id, processorId)` composite key. `startedAt` and
/// `completedAt` are stored as epoch-millisecond numbers; `expiresOn` as
/// epoch-seconds so the table's TTL eviction can use it directly.
///
/// The claim issues `SET startedAt = if_not_exists(startedAt, :startedAt)`
/// with `RETURN ALL_OLD`, so the prior item it classifies against is the
/// exact snapshot the store applied the precondition to.
pub struct DynamoDbPersistence {
    client: Client,
    table_name: String,
}

impl DynamoDbPersistence {
    pub fn new(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }
}

#[async_trait]
impl<Id, ProcessorId> Persistence<Id, ProcessorId> for DynamoDbPersistence
where
    Id: Serialize + DeserializeOwned + Send + Sync + Clone + 'static,
    ProcessorId: Serialize + DeserializeOwned + Send + Sync + Clone + 'static,
{
    async fn claim(
        &self,
        id: Id,
        processor_id: ProcessorId,
        now: SystemTime,
    ) -> Result<Option<Process<Id, ProcessorId>>, Error> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("id", encode_key(&id)?)
            .key("processorId", encode_key(&processor_id)?)
            .update_expression("SET startedAt = if_not_exists(startedAt, :startedAt)")
            .expression_attribute_values(
                ":startedAt",
                AttributeValue::N(epoch_millis(now)?.to_string()),
            )
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(|e| Error::DynamoDb(e.to_string()))?;

        match result.attributes {
            Some(attributes) if !attributes.is_empty() => Ok(Some(decode_process(attributes)?)),
            _ => Ok(None),
        }
    }

    async fn commit(
        &self,
        id: Id,
        processor_id: ProcessorId,
        now: SystemTime,
        ttl: Duration,
    ) -> Result<(), Error> {
        self.client
            .update_item()
            .table_name(&self.table_name)
            .key("id", encode_key(&id)?)
            .key("processorId", encode_key(&processor_id)?)
            .update_expression("SET completedAt = :completedAt, expiresOn = :expiresOn")
            .expression_attribute_values(
                ":completedAt",
                AttributeValue::N(epoch_millis(now)?.to_string()),
            )
            .expression_attribute_values(
                ":expiresOn",
                AttributeValue::N(epoch_secs(now + ttl)?.to_string()),
            )
            .send()
            .await
            .map_err(|e| Error::DynamoDb(e.to_string()))?;

        Ok(())
    }

    async fn invalidate(&self, id: Id, processor_id: ProcessorId) -> Result<(), Error> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key("id", encode_key(&id)?)
            .key("processorId", encode_key(&processor_id)?)
            .send()
            .await
            .map_err(|e| Error::DynamoDb(e.to_string()))?;

        Ok(())
    }
}

/// Encode a `Process` into its DynamoDB attribute representation.
///
/// Writes go through update expressions rather than full puts, but the
/// attribute set those expressions accumulate is exactly this encoding.
/// Unset optional fields encode as attribute-absent, never as `NULL`.
pub fn encode_process<Id, ProcessorId>(
    process: &Process<Id, ProcessorId>,
) -> Result<HashMap<String, AttributeValue>, Error>
where
    Id: Serialize,
    ProcessorId: Serialize,
{
    let mut attributes = HashMap::new();

    attributes.insert("id".to_string(), encode_key(&process.id)?);
    attributes.insert("processorId".to_string(), encode_key(&process.processor_id)?);
    attributes.insert(
        "startedAt".to_string(),
        AttributeValue::N(epoch_millis(process.started_at)?.to_string()),
    );

    if let Some(completed_at) = process.completed_at {
        attributes.insert(
            "completedAt".to_string(),
            AttributeValue::N(epoch_millis(completed_at)?.to_string()),
        );
    }

    if let Some(expires_on) = process.expires_on {
        attributes.insert(
            "expiresOn".to_string(),
            AttributeValue::N(epoch_secs(expires_on.instant)?.to_string()),
        );
    }

    Ok(attributes)
}

/// Decode a DynamoDB item into a `Process`.
///
/// A missing required attribute, or any attribute that is present but
/// malformed (wrong type, unparseable number, explicit `NULL`), means the
/// record is corrupt and fails with [`Error::Decoding`].
pub fn decode_process<Id, ProcessorId>(
    mut attributes: HashMap<String, AttributeValue>,
) -> Result<Process<Id, ProcessorId>, Error>
where
    Id: DeserializeOwned,
    ProcessorId: DeserializeOwned,
{
    let id = decode_key("id", take_required(&mut attributes, "id")?)?;
    let processor_id = decode_key("processorId", take_required(&mut attributes, "processorId")?)?;

    let started_at = decode_number("startedAt", take_required(&mut attributes, "startedAt")?)?;
    let started_at = UNIX_EPOCH + Duration::from_millis(started_at);

    let completed_at = attributes
        .remove("completedAt")
        .map(|value| decode_number("completedAt", value))
        .transpose()?
        .map(|millis| UNIX_EPOCH + Duration::from_millis(millis));

    let expires_on = attributes
        .remove("expiresOn")
        .map(|value| decode_number("expiresOn", value))
        .transpose()?
        .map(Expiration::from_epoch_secs);

    Ok(Process {
        id,
        processor_id,
        started_at,
        completed_at,
        expires_on,
    })
}

fn encode_key<K: Serialize>(key: &K) -> Result<AttributeValue, Error> {
    Ok(AttributeValue::S(serde_json::to_string(key)?))
}

fn decode_key<K: DeserializeOwned>(name: &str, value: AttributeValue) -> Result<K, Error> {
    let AttributeValue::S(encoded) = value else {
        return Err(Error::Decoding(format!("attribute '{name}' is not a string")));
    };

    serde_json::from_str(&encoded).map_err(|e| Error::Decoding(format!("attribute '{name}': {e}")))
}

fn decode_number(name: &str, value: AttributeValue) -> Result<u64, Error> {
    let AttributeValue::N(raw) = value else {
        return Err(Error::Decoding(format!("attribute '{name}' is not a number")));
    };

    raw.parse()
        .map_err(|e| Error::Decoding(format!("attribute '{name}': {e}")))
}

fn take_required(
    attributes: &mut HashMap<String, AttributeValue>,
    name: &str,
) -> Result<AttributeValue, Error> {
    attributes
        .remove(name)
        .ok_or_else(|| Error::Decoding(format!("missing attribute '{name}'")))
}

fn epoch_millis(instant: SystemTime) -> Result<u64, Error> {
    instant
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .map_err(|e| Error::Internal(e.to_string()))
}

fn epoch_secs(instant: SystemTime) -> Result<u64, Error> {
    instant
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| Error::Internal(e.to_string()))
}
