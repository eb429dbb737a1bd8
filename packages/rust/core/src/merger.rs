//! Join enrichment output back onto the chunk by identity key.

use std::collections::BTreeMap;

use enricher_shared::{EnricherError, Record, RecordKey, Result};

use crate::enricher::EnrichedCompany;

/// Overwrite the derived fields of every record with its enrichment result.
///
/// Only derived fields are written, so identity and source columns are never
/// touched. A record without a matching enrichment result is an integrity error.
pub fn merge(
    chunk: Vec<Record>,
    enriched: &BTreeMap<RecordKey, EnrichedCompany>,
    id_column: &str,
) -> Result<Vec<Record>> {
    chunk
        .into_iter()
        .map(|mut record| {
            let key = record.key(id_column)?;
            let company = enriched.get(&key).ok_or_else(|| {
                EnricherError::Integrity(format!("no enrichment result for record `{key}`"))
            })?;
            for (field, value) in company.derived_fields() {
                record.set(field, value);
            }
            Ok(record)
        })
        .collect()
}
