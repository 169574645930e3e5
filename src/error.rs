use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the public API.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport or conditional-update failure talking to DynamoDB.
    ///
    /// Not retried internally; retrying the whole call with the same id is
    /// safe and will either poll the in-flight record or observe the
    /// completion.
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    /// A stored record could not be decoded. The record is corrupt and
    /// needs operator intervention.
    #[error("corrupt record: {0}")]
    Decoding(String),

    /// An in-flight peer held the record beyond the poll deadline without
    /// completing or timing out.
    #[error("gave up after polling for {waited:?}: peer still running")]
    PollTimeout { waited: Duration },

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<aws_sdk_dynamodb::Error> for Error {
    fn from(err: aws_sdk_dynamodb::Error) -> Self {
        Error::DynamoDb(err.to_string())
    }
}

impl<E> From<aws_sdk_dynamodb::error::SdkError<E>> for Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: aws_sdk_dynamodb::error::SdkError<E>) -> Self {
        Error::DynamoDb(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Encoding(err.to_string())
    }
}
