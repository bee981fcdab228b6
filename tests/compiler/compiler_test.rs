use std::path::PathBuf;

use tally::compiler::{BatchCompiler, CompileError};
use tally::metadata::{MetricCatalog, StaticCatalog};
use tally::model::{MetricDefinition, TimePoint};
use tally::resolver::{QueryContext, Resolver};

fn tp(s: &str) -> TimePoint {
    TimePoint::new(s).unwrap()
}

fn catalog() -> StaticCatalog {
    StaticCatalog::new()
        .with_metric(MetricDefinition::physical("KD1001", "sum", "CD001"))
        .with_metric(MetricDefinition::physical("KD1008", "sum", "CD001"))
        .with_metric(MetricDefinition::physical("KD1009", "sum", "CD002"))
        .with_metric(MetricDefinition::composite(
            "KD1100",
            "KD1008*0.7/(KD1008+100)",
            "sum",
        ))
        .with_metric(MetricDefinition::cumulative("KD2001", "KD1001", "sum", "CD001"))
        .with_dim_set("CD001", &["city_id"])
        .with_dim_set("CD002", &["city_id", "county_id"])
}

/// Fabricate an alias for every required partition.
fn materialize_all_ok(ctx: &QueryContext) {
    for req in ctx.required_partitions() {
        ctx.record_alias(
            req.key(),
            PathBuf::from(format!(
                "/cache/{}_{}.parquet",
                req.metric_id.to_lowercase(),
                req.time_point
            )),
        );
    }
}

fn resolve(catalog: &StaticCatalog, ctx: &QueryContext) {
    Resolver::new(catalog).resolve_all(ctx).unwrap();
}

#[test]
fn test_minimal_statement_shape() {
    let catalog = catalog();
    let ctx = QueryContext::new(
        vec![catalog.find_metric("KD1008").unwrap()],
        vec![tp("20251024")],
    );
    resolve(&catalog, &ctx);
    materialize_all_ok(&ctx);

    let sql = BatchCompiler::new(&catalog).compile(&ctx).unwrap();
    insta::assert_snapshot!(sql, @r#"
    WITH "raw_data" AS (
    SELECT "metric_id", "time_point", CAST("value" AS DOUBLE) AS "value"
    FROM read_parquet(['/cache/kd1008_20251024.parquet'])
    )
    SELECT '20251024' AS "op_time", SUM(CASE WHEN "rd"."metric_id" = 'KD1008' AND "rd"."time_point" = '20251024' THEN "rd"."value" ELSE NULL END) AS "KD1008"
    FROM "raw_data" "rd"
    "#);
}

#[test]
fn test_heterogeneous_dim_sets_backfill_null() {
    let catalog = catalog();
    let ctx = QueryContext::new(
        vec![
            catalog.find_metric("KD1008").unwrap(),
            catalog.find_metric("KD1009").unwrap(),
        ],
        vec![tp("20251024")],
    )
    .with_dimensions(["city_id", "county_id"]);
    resolve(&catalog, &ctx);
    materialize_all_ok(&ctx);

    let sql = BatchCompiler::new(&catalog).compile(&ctx).unwrap();

    // CD001 owns only city_id: its branch backfills county_id with NULL.
    assert!(
        sql.contains("\"city_id\", NULL AS \"county_id\"\nFROM read_parquet(['/cache/kd1008_20251024.parquet'])"),
        "sql was:\n{sql}"
    );
    // CD002 owns both columns.
    assert!(
        sql.contains("\"city_id\", \"county_id\"\nFROM read_parquet(['/cache/kd1009_20251024.parquet'])"),
        "sql was:\n{sql}"
    );
    assert!(sql.contains("GROUP BY \"rd\".\"city_id\", \"rd\".\"county_id\""));
}

#[test]
fn test_composite_pushes_aggregation_below_arithmetic() {
    let catalog = catalog();
    let ctx = QueryContext::new(
        vec![catalog.find_metric("KD1100").unwrap()],
        vec![tp("20251024")],
    );
    resolve(&catalog, &ctx);
    materialize_all_ok(&ctx);

    let sql = BatchCompiler::new(&catalog).compile(&ctx).unwrap();

    let leaf = "SUM(CASE WHEN \"rd\".\"metric_id\" = 'KD1008' AND \"rd\".\"time_point\" = '20251024' THEN \"rd\".\"value\" ELSE NULL END)";
    let expected = format!("{leaf} * 0.7 / ({leaf} + 100) AS \"KD1100\"");
    assert!(sql.contains(&expected), "sql was:\n{sql}");
    // Two aggregated leaves, never an aggregate around the whole ratio.
    assert_eq!(sql.matches("SUM(").count(), 2);
}

#[test]
fn test_cumulative_compiles_to_in_list() {
    let catalog = catalog();
    let ctx = QueryContext::new(
        vec![catalog.find_metric("KD2001").unwrap()],
        vec![tp("20251203")],
    );
    resolve(&catalog, &ctx);
    materialize_all_ok(&ctx);

    let sql = BatchCompiler::new(&catalog).compile(&ctx).unwrap();
    assert!(
        sql.contains(
            "SUM(CASE WHEN \"rd\".\"metric_id\" = 'KD1001' AND \"rd\".\"time_point\" IN ('20251201', '20251202', '20251203') THEN \"rd\".\"value\" ELSE NULL END) AS \"KD2001\""
        ),
        "sql was:\n{sql}"
    );
}

#[test]
fn test_missing_partition_degrades_silently() {
    let catalog = catalog();
    let ctx = QueryContext::new(
        vec![
            catalog.find_metric("KD1008").unwrap(),
            catalog.find_metric("KD1009").unwrap(),
        ],
        vec![tp("20251024")],
    );
    resolve(&catalog, &ctx);

    for req in ctx.required_partitions() {
        if req.metric_id == "KD1009" {
            ctx.record_missing(req.key());
        } else {
            ctx.record_alias(req.key(), PathBuf::from("/cache/kd1008_20251024.parquet"));
        }
    }

    let sql = BatchCompiler::new(&catalog).compile(&ctx).unwrap();
    assert!(!sql.is_empty());
    assert!(sql.contains("kd1008_20251024.parquet"));
    assert!(!sql.contains("kd1009"));
    // The metric column is still projected; its cells surface as NULL.
    assert!(sql.contains("AS \"KD1009\""));
    assert_eq!(ctx.missing_partitions().len(), 1);
}

#[test]
fn test_everything_missing_compiles_to_empty_string() {
    let catalog = catalog();
    let ctx = QueryContext::new(
        vec![catalog.find_metric("KD1008").unwrap()],
        vec![tp("20251024")],
    );
    resolve(&catalog, &ctx);
    for req in ctx.required_partitions() {
        ctx.record_missing(req.key());
    }

    assert_eq!(BatchCompiler::new(&catalog).compile(&ctx).unwrap(), "");
}

#[test]
fn test_unmaterialized_partition_is_a_loud_failure() {
    let catalog = catalog();
    let ctx = QueryContext::new(
        vec![catalog.find_metric("KD1008").unwrap()],
        vec![tp("20251024")],
    );
    resolve(&catalog, &ctx);
    // Materialization "forgot" the partition: neither alias nor missing.

    assert!(matches!(
        BatchCompiler::new(&catalog).compile(&ctx),
        Err(CompileError::UnmaterializedPartition(_))
    ));
}

#[test]
fn test_dim_conditions_become_in_lists() {
    let catalog = catalog();
    let ctx = QueryContext::new(
        vec![catalog.find_metric("KD1008").unwrap()],
        vec![tp("20251024")],
    )
    .with_dimensions(["city_id"])
    .with_condition("city_id", ["998", "999"]);
    resolve(&catalog, &ctx);
    materialize_all_ok(&ctx);

    let sql = BatchCompiler::new(&catalog).compile(&ctx).unwrap();
    assert!(sql.contains("WHERE \"rd\".\"city_id\" IN ('998', '999')"), "sql was:\n{sql}");
}

#[test]
fn test_single_value_condition_collapses_to_equality() {
    let catalog = catalog();
    let ctx = QueryContext::new(
        vec![catalog.find_metric("KD1008").unwrap()],
        vec![tp("20251024")],
    )
    .with_dimensions(["city_id"])
    .with_condition("city_id", ["999"]);
    resolve(&catalog, &ctx);
    materialize_all_ok(&ctx);

    let sql = BatchCompiler::new(&catalog).compile(&ctx).unwrap();
    assert!(sql.contains("WHERE \"rd\".\"city_id\" = '999'"), "sql was:\n{sql}");
}

#[test]
fn test_condition_only_column_is_projected_not_grouped() {
    let catalog = catalog();
    let ctx = QueryContext::new(
        vec![catalog.find_metric("KD1009").unwrap()],
        vec![tp("20251024")],
    )
    .with_dimensions(["city_id"])
    .with_condition("county_id", ["42"]);
    resolve(&catalog, &ctx);
    materialize_all_ok(&ctx);

    let sql = BatchCompiler::new(&catalog).compile(&ctx).unwrap();
    assert!(sql.contains("\"county_id\"\nFROM read_parquet"), "sql was:\n{sql}");
    assert!(sql.contains("AND \"rd\".\"county_id\" = '42'") || sql.contains("WHERE \"rd\".\"county_id\" = '42'"));
    assert!(sql.contains("GROUP BY \"rd\".\"city_id\"\n") || sql.ends_with("GROUP BY \"rd\".\"city_id\""));
    assert!(!sql.contains("GROUP BY \"rd\".\"city_id\", \"rd\".\"county_id\""));
}

#[test]
fn test_historical_siblings_keep_requested_suffix() {
    let catalog = catalog();
    let ctx = QueryContext::new(
        vec![catalog.find_metric("KD1008").unwrap()],
        vec![tp("20251101")],
    )
    .with_historical(true);
    resolve(&catalog, &ctx);
    materialize_all_ok(&ctx);

    let sql = BatchCompiler::new(&catalog).compile(&ctx).unwrap();
    assert!(sql.contains("\"time_point\" = '20241101' THEN \"rd\".\"value\" ELSE NULL END) AS \"KD1008_lastYear\""), "sql was:\n{sql}");
    assert!(sql.contains("\"time_point\" = '20251031' THEN \"rd\".\"value\" ELSE NULL END) AS \"KD1008_lastCycle\""), "sql was:\n{sql}");
}

#[test]
fn test_one_block_per_time_point() {
    let catalog = catalog();
    let ctx = QueryContext::new(
        vec![catalog.find_metric("KD1008").unwrap()],
        vec![tp("20251024"), tp("20251101")],
    );
    resolve(&catalog, &ctx);
    materialize_all_ok(&ctx);

    let sql = BatchCompiler::new(&catalog).compile(&ctx).unwrap();
    assert!(sql.contains("'20251024' AS \"op_time\""));
    assert!(sql.contains("'20251101' AS \"op_time\""));
    assert_eq!(sql.matches("UNION ALL").count(), 1);
    // Both partitions share one dimension set, so the raw union is a single
    // branch scanning both files.
    assert!(sql.contains(
        "read_parquet(['/cache/kd1008_20251024.parquet', '/cache/kd1008_20251101.parquet'])"
    ));
}

#[test]
fn test_dimension_description_joins() {
    let catalog = catalog();
    let ctx = QueryContext::new(
        vec![catalog.find_metric("KD1008").unwrap()],
        vec![tp("20251024")],
    )
    .with_dimensions(["city_id"]);
    resolve(&catalog, &ctx);
    materialize_all_ok(&ctx);
    ctx.record_dim_table("CD001", PathBuf::from("/dims/cd001.parquet"));

    let sql = BatchCompiler::new(&catalog).compile(&ctx).unwrap();
    assert!(
        sql.contains(
            "LEFT JOIN read_parquet(['/dims/cd001.parquet']) \"dd0\" ON \"dd0\".\"dim_code\" = \"rd\".\"city_id\" AND \"dd0\".\"dim_id\" = 'city_id'"
        ),
        "sql was:\n{sql}"
    );
    assert!(sql.contains("\"dd0\".\"dim_desc\" AS \"city_id_desc\""));
    assert!(sql.contains("GROUP BY \"rd\".\"city_id\", \"dd0\".\"dim_desc\""));
}

#[test]
fn test_missing_description_table_projects_null_desc() {
    let catalog = catalog();
    let ctx = QueryContext::new(
        vec![catalog.find_metric("KD1008").unwrap()],
        vec![tp("20251024")],
    )
    .with_dimensions(["city_id"]);
    resolve(&catalog, &ctx);
    materialize_all_ok(&ctx);

    let sql = BatchCompiler::new(&catalog).compile(&ctx).unwrap();
    assert!(!sql.contains("LEFT JOIN"));
    assert!(sql.contains("NULL AS \"city_id_desc\""));
}

#[test]
fn test_target_value_table_joins_the_raw_union() {
    let catalog = catalog();
    let ctx = QueryContext::new(
        vec![catalog.find_metric("KD1008").unwrap()],
        vec![tp("20251024")],
    )
    .with_dimensions(["city_id"])
    .with_target(true);
    resolve(&catalog, &ctx);
    materialize_all_ok(&ctx);
    ctx.record_target_table("CD001", PathBuf::from("/targets/cd001.parquet"));

    let sql = BatchCompiler::new(&catalog).compile(&ctx).unwrap();
    assert!(sql.contains("read_parquet(['/targets/cd001.parquet'])"), "sql was:\n{sql}");
}

#[test]
fn test_no_dimensions_means_no_group_by() {
    let catalog = catalog();
    let ctx = QueryContext::new(
        vec![catalog.find_metric("KD1008").unwrap()],
        vec![tp("20251024")],
    );
    resolve(&catalog, &ctx);
    materialize_all_ok(&ctx);

    let sql = BatchCompiler::new(&catalog).compile(&ctx).unwrap();
    assert!(!sql.contains("GROUP BY"));
}
