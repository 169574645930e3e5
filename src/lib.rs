//! Horkos - exactly-once side-effect protection for at-least-once delivery
//!
//! Named after the Greek god who enforces oaths, Horkos guarantees that
//! concurrent or retried invocations wrapped with the same process id
//! either execute the work exactly once and observe its completion, or
//! observe that it has already been handled. Coordination happens through
//! a single DynamoDB row per id: a conditional update claims ownership,
//! in-flight peers are polled, and abandoned claims become reclaimable
//! after a configured processing budget.
//!
//! # Example
//!
//! ```no_run
//! use horkos::{Horkos, Config, PollStrategy, DynamoDbPersistence};
//! use std::time::Duration;
//! use std::sync::Arc;
//! use uuid::Uuid;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Initialize AWS DynamoDB client
//! let aws_config = aws_config::load_from_env().await;
//! let dynamodb_client = aws_sdk_dynamodb::Client::new(&aws_config);
//!
//! // Create persistence layer
//! let persistence = Arc::new(DynamoDbPersistence::new(
//!     dynamodb_client,
//!     "horkos-processes".to_string(),
//! ));
//!
//! // Configure Horkos
//! let config = Config::new(
//!     Uuid::new_v4(), // processor ID
//!     Duration::from_secs(300), // max processing time
//!     Duration::from_secs(86400 * 30), // 30 day TTL
//!     PollStrategy::backoff(
//!         Duration::from_millis(100),
//!         1.5,
//!         Duration::from_secs(5),
//!         Duration::from_secs(15),
//!     ),
//! );
//!
//! // Create Horkos instance
//! let horkos = Horkos::new(persistence, config);
//!
//! // Use it to deduplicate side effects
//! let signal_id = Uuid::new_v4();
//! let receipt = horkos.protect(signal_id, || async {
//!     // Your processing logic here
//!     Ok("processed".to_string())
//! }).await?;
//!
//! match receipt {
//!     Some(value) => println!("handled here: {value}"),
//!     None => println!("already handled elsewhere"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod dynamodb;
pub mod error;
pub mod horkos;
pub mod model;
pub mod persistence;

// Re-export commonly used types
pub use clock::{Clock, SystemClock};
pub use dynamodb::DynamoDbPersistence;
pub use error::Error;
pub use horkos::Horkos;
pub use model::{Config, Expiration, PollStrategy, Process, ProcessStatus, Sample};
pub use persistence::Persistence;
