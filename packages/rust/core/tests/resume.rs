//! Resumability against a real on-disk warehouse.

mod common;

use std::sync::Arc;

use common::{EchoModel, FakeSearch, company, test_prompts};
use enricher_core::loader::{LoadTarget, WarehouseLoader};
use enricher_core::selector::select_records;
use enricher_core::{EnrichmentPipeline, PipelineConfig, SilentProgress};
use enricher_shared::{EnrichmentConfig, Record, RunId, columns};
use enricher_warehouse::{Warehouse, WarehouseClient, infer_schema};
use uuid::Uuid;

const TEMPLATES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../../sql/templates");

fn enrichment_config() -> EnrichmentConfig {
    EnrichmentConfig {
        query_templates_dir: TEMPLATES.to_string(),
        chunk_size: 2,
        submission_interval_ms: 0,
        ..EnrichmentConfig::default()
    }
}

/// Warehouse with `count` source companies in `ol.companies`.
async fn seeded_warehouse(count: usize) -> Arc<Warehouse> {
    let root = std::env::temp_dir().join(format!("enricher_resume_{}", Uuid::now_v7()));
    let warehouse = Warehouse::open(&root).await.expect("open warehouse");

    let rows: Vec<Record> = (1..=count)
        .map(|i| company(&format!("c{i:02}"), &format!("Company{i}")))
        .collect();
    warehouse.create_dataset("ol", None).await.unwrap();
    let schema = infer_schema(&rows[0]).unwrap();
    warehouse.create_table("ol", "companies", &schema).await.unwrap();
    warehouse.write_rows(&rows, "ol", "companies", false).await.unwrap();

    Arc::new(warehouse)
}

fn ids(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.get_str("company_id").map(str::to_string))
        .collect()
}

#[tokio::test]
async fn anti_join_selects_the_remainder() {
    let warehouse = seeded_warehouse(3).await;
    let config = enrichment_config();

    let all = select_records(warehouse.as_ref(), &config).await.unwrap();
    assert_eq!(ids(&all), vec!["c01", "c02", "c03"]);

    let loader = WarehouseLoader::new(
        warehouse.clone(),
        LoadTarget {
            dataset: "el".into(),
            table: "companies".into(),
            location: None,
        },
    );
    loader.load_chunk(&RunId::new(), &all[..1]).await.unwrap();

    let remainder = select_records(warehouse.as_ref(), &config).await.unwrap();
    assert_eq!(ids(&remainder), vec!["c02", "c03"]);
}

#[tokio::test]
async fn second_run_finds_no_work() {
    let warehouse = seeded_warehouse(3).await;
    let config = PipelineConfig {
        enrichment: enrichment_config(),
        location: None,
    };
    let search = FakeSearch::new();
    let model = EchoModel::new();
    let pipeline = EnrichmentPipeline::new(
        config,
        warehouse.clone(),
        search.clone(),
        model.clone(),
        test_prompts(),
    );

    let first = pipeline.run(None, &SilentProgress).await.unwrap();
    assert_eq!(first.selected, 3);
    assert_eq!(first.chunks_completed, 2);
    assert_eq!(first.rows_loaded, 3);
    assert_eq!(first.retrieval_calls, 6);

    let loaded = warehouse
        .run_query(
            "SELECT * FROM \"el\".\"companies\" ORDER BY \"company_id\"",
            &Default::default(),
        )
        .await
        .unwrap();
    assert_eq!(ids(&loaded), vec!["c01", "c02", "c03"]);
    assert_eq!(
        loaded[0].get_str(columns::FORMATTED_COMPANY_NAME),
        Some("COMPANY1")
    );
    assert_eq!(
        loaded[2].get_str(columns::ADDRESS),
        Some("Company3 Strasse 1, Berlin")
    );

    let history = warehouse.load_history("el", "companies").await.unwrap();
    assert_eq!(history.len(), 2);

    let second = pipeline.run(None, &SilentProgress).await.unwrap();
    assert_eq!(second.selected, 0);
    assert_eq!(second.rows_loaded, 0);
    assert_eq!(search.calls().len(), 6);
    assert_eq!(model.prompts().len(), 2);
}
