//! Vector store implementations that live in process

mod memory;

pub use memory::InMemoryVectorStore;

use tracing::warn;

use crate::data::{KbError, VectorRecord};

/// Returns `false` and logs when a search or delete carries a blank isolation key.
pub(crate) fn isolation_key_present(isolation_key: &str, operation: &str) -> bool {
    if isolation_key.trim().is_empty() {
        warn!(
            policy = "isolation",
            operation, "Refusing vector store operation without an isolation key"
        );
        return false;
    }
    true
}

/// Rejects records whose vector length or source key would break isolation or ranking.
pub(crate) fn validate_records(records: &[VectorRecord], dimension: usize) -> Result<(), KbError> {
    for record in records {
        if record.vector.len() != dimension {
            return Err(KbError::DimensionMismatch {
                expected: dimension,
                actual: record.vector.len(),
            });
        }
        if record.payload.source.trim().is_empty() {
            return Err(KbError::IsolationViolation(format!(
                "record {} has no source key",
                record.id
            )));
        }
    }
    Ok(())
}

pub(crate) fn validate_query(query_vector: &[f32], dimension: usize) -> Result<(), KbError> {
    if query_vector.len() != dimension {
        return Err(KbError::DimensionMismatch {
            expected: dimension,
            actual: query_vector.len(),
        });
    }
    Ok(())
}
