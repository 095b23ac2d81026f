//! Stage workers
//!
//! One long-lived worker per pipeline stage, each consuming its inbound
//! topic through a consumer group and publishing to the next. Workers are
//! idempotent on article id; the bus's at-least-once redelivery is the only
//! retry mechanism between stages.

pub mod enricher;
pub mod indexer;
pub mod ingestor;
pub mod normalizer;
pub mod parser;

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::bus::BusRecord;
use crate::metrics;

/// Decodes a bus record payload, logging and counting failures.
///
/// An undeserializable record is skipped rather than poisoning the stage.
pub(crate) fn decode_record<T: DeserializeOwned>(record: &BusRecord, stage: &'static str) -> Option<T> {
    match serde_json::from_slice(&record.payload) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(
                topic = %record.topic,
                key = ?record.key,
                error = %e,
                "Skipping undeserializable record"
            );
            metrics::record_error(stage, "deserialize");
            None
        }
    }
}

pub use enricher::EnricherWorker;
pub use indexer::IndexerWorker;
pub use ingestor::Ingestor;
pub use normalizer::NormalizerWorker;
pub use parser::ParserWorker;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::RawArticle;

    #[test]
    fn test_decode_record_skips_garbage() {
        let record = BusRecord {
            topic: "raw_articles".to_string(),
            key: Some("k".to_string()),
            payload: b"not json".to_vec(),
        };
        let decoded: Option<RawArticle> = decode_record(&record, metrics::STAGE_CLEAN);
        assert!(decoded.is_none());
    }
}
