//! Incremental selection of records that still need enrichment.

use std::path::Path;

use enricher_shared::{EnrichmentConfig, Record, Result};
use enricher_warehouse::{QueryParams, WarehouseClient};
use tracing::{info, instrument};

/// Template selecting every source record.
pub const SELECT_ALL_TEMPLATE: &str = "select_all_companies.sql";
/// Template selecting source records absent from the destination table.
pub const TO_PROCESS_TEMPLATE: &str = "companies_to_process.sql";

/// Identifier parameters shared by both selection templates.
pub fn selection_params(config: &EnrichmentConfig) -> QueryParams {
    QueryParams::new()
        .identifier("unprocessed_dataset", &config.unprocessed_dataset)
        .identifier("processed_dataset", &config.processed_dataset)
        .identifier("unprocessed_table", &config.unprocessed_table)
        .identifier("processed_table", &config.processed_table)
        .identifier("id_column", &config.id_column)
}

/// Fetch the ordered work list.
///
/// When the destination table exists only unprocessed records are returned,
/// otherwise every source record is.
#[instrument(skip_all, fields(
    source = %format!("{}.{}", config.unprocessed_dataset, config.unprocessed_table),
    destination = %format!("{}.{}", config.processed_dataset, config.processed_table),
))]
pub async fn select_records(
    warehouse: &dyn WarehouseClient,
    config: &EnrichmentConfig,
) -> Result<Vec<Record>> {
    let incremental = warehouse
        .table_exists(&config.processed_dataset, &config.processed_table)
        .await?;

    let template = if incremental {
        TO_PROCESS_TEMPLATE
    } else {
        info!("destination table not found, selecting all records");
        SELECT_ALL_TEMPLATE
    };
    let path = Path::new(&config.query_templates_dir).join(template);

    let records = warehouse
        .run_parametrized_query(&path, &selection_params(config))
        .await?;

    info!(incremental, count = records.len(), "selected records");
    Ok(records)
}
