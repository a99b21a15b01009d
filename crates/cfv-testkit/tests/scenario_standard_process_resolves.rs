use cfv_engine::*;
use cfv_schemas::{bags, FailureKind, TradeVarsPatch, KG_TO_LB, LB_PER_50KG_CONVERSION};
use cfv_strategy::StrategyClassifier;
use cfv_testkit::*;

const EPS: f64 = 1e-6;

async fn run(store: &MemStore, options: ResolveOptions) -> ResolveReport {
    let classifier = StrategyClassifier::new();
    let ctx = ResolveContext {
        catalogue: store,
        ledger: store,
        classifier: &classifier,
    };
    resolve_processes(&ctx, store, options).await.unwrap()
}

#[tokio::test]
async fn scenario_worked_example_single_input_single_output() {
    let store = MemStore::new();
    store.add_catalogue("B1", vars(950.0, 400.0));
    store
        .add_process(standard(
            "P1",
            "2026-01-05",
            vec![
                input_row("B1", 1000.0, "AA TOP"),
                output_row("B2", 900.0, "AB PLUS"),
            ],
        ))
        .unwrap();

    let report = run(&store, ResolveOptions::default()).await;
    assert_eq!(report.resolved, vec!["P1".to_string()]);
    assert!(report.skipped.is_empty());
    assert!(report.diagnostics.is_empty());

    let p = store.process("P1").unwrap();
    assert!(p.resolved);
    let in_cents = 95.0 * 1000.0 * KG_TO_LB;
    let out_cents = 45.0 * 900.0 * KG_TO_LB;
    assert!((p.input_value.unwrap() - in_cents / 100.0).abs() < EPS);
    assert!((p.output_value.unwrap() - out_cents / 100.0).abs() < EPS);
    assert!((p.pnl.unwrap() - (out_cents - in_cents) / 100.0).abs() < EPS);

    let rows = store.rows_of("P1");
    // Step 1 wrote the catalogue values onto the input row
    assert_eq!(rows[0].input.resolve(), Some(vars(950.0, 400.0)));

    let out = rows[1].output.resolve().unwrap();
    // (cost / 50) * (900 / 50) * 50 == real input cost, single output takes share 1
    assert!((out.cost * bags(900.0) - bags(1000.0) * 950.0).abs() < EPS);
    assert_eq!(out.hedge, 400.0);
    assert!((out.diff - (out.cost / LB_PER_50KG_CONVERSION - 400.0)).abs() < EPS);
}

#[tokio::test]
async fn scenario_conservation_and_hedge_inheritance() {
    let store = MemStore::new();
    store.add_catalogue("IN-1", vars(900.0, 380.0));
    store.add_catalogue("IN-2", vars(1000.0, 410.0));
    store.add_catalogue("IN-3", vars(650.0, 395.0));
    store
        .add_process(standard(
            "MILL-7",
            "2026-01-10",
            vec![
                input_row("IN-1", 1200.0, "AA TOP"),
                input_row("IN-2", 800.0, "AB PLUS"),
                input_row("IN-3", 500.0, "TT"),
                output_row("OUT-1", 900.0, "AA TOP"),
                output_row("OUT-2", 700.0, "AB TOP"),
                output_row("OUT-3", 450.0, "C PLUS"),
                output_row("OUT-4", 300.0, "MBUNI"),
            ],
        ))
        .unwrap();

    let report = run(&store, ResolveOptions::default()).await;
    assert_eq!(report.resolved, vec!["MILL-7".to_string()]);

    let rows = store.rows_of("MILL-7");
    let real_input_cost = bags(2500.0) * (1200.0 * 900.0 + 800.0 * 1000.0 + 500.0 * 650.0) / 2500.0;
    let expected_hedge = (1200.0 * 380.0 + 800.0 * 410.0 + 500.0 * 395.0) / 2500.0;

    let mut allocated = 0.0;
    for r in rows.iter().filter(|r| r.is_output()) {
        let v = r.output.resolve().unwrap();
        assert!((v.hedge - expected_hedge).abs() < 1e-9, "row {}", r.row_id);
        allocated += v.cost * bags(r.output_qty_kg);
    }
    assert!((allocated - real_input_cost).abs() < 1e-6);
}

#[tokio::test]
async fn scenario_undefined_or_unmapped_output_strategy_blocks_resolution() {
    let store = MemStore::new();
    store.add_catalogue("B1", vars(950.0, 400.0));
    store
        .add_process(standard(
            "P1",
            "2026-01-05",
            vec![
                input_row("B1", 1000.0, "AA TOP"),
                output_row("B2", 500.0, "n/a"),
                output_row("B3", 450.0, "Robusta 18"),
            ],
        ))
        .unwrap();

    let report = run(&store, ResolveOptions::default()).await;
    assert_eq!(report.skipped, vec!["P1".to_string()]);
    assert!(!store.process("P1").unwrap().resolved);

    let kinds: Vec<(Option<String>, FailureKind)> = report
        .diagnostics
        .iter()
        .map(|d| (d.batch_id.clone(), d.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (Some("B2".to_string()), FailureKind::MissingTradeData),
            (Some("B3".to_string()), FailureKind::MissingTradeData),
        ]
    );
    // nothing written to outputs
    assert_eq!(store.rows_of("P1")[1].output, TradeVarsPatch::empty());
}

#[tokio::test]
async fn scenario_all_scores_clamped_is_arithmetic_degenerate() {
    let store = MemStore::new();
    // hedge 100 + valo(MBUNI) -150 < 0 => every score is 0 => 0/0
    store.add_catalogue("B1", vars(300.0, 100.0));
    store
        .add_process(standard(
            "P1",
            "2026-01-05",
            vec![
                input_row("B1", 1000.0, "AB PLUS"),
                output_row("B2", 950.0, "MBUNI"),
            ],
        ))
        .unwrap();

    let report = run(&store, ResolveOptions::default()).await;
    assert_eq!(report.skipped, vec!["P1".to_string()]);
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].kind, FailureKind::ArithmeticDegenerate);
    assert_eq!(report.diagnostics[0].batch_id.as_deref(), Some("B2"));
}

#[tokio::test]
async fn scenario_empty_partition_is_not_processable() {
    let store = MemStore::new();
    store
        .add_process(standard(
            "P1",
            "2026-01-05",
            vec![output_row("B2", 900.0, "AB PLUS")],
        ))
        .unwrap();

    let report = run(&store, ResolveOptions::default()).await;
    assert_eq!(report.skipped, vec!["P1".to_string()]);
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.diagnostics[0].kind, FailureKind::NotProcessable);
}

#[tokio::test]
async fn scenario_row_with_cost_and_hedge_only_derives_differential() {
    let store = MemStore::new();
    let mut row = input_row("LOCAL-1", 1000.0, "AA TOP");
    row.input.cost = Some(950.0);
    row.input.hedge = Some(400.0);
    store
        .add_process(standard(
            "P1",
            "2026-01-05",
            vec![row, output_row("B2", 900.0, "AB PLUS")],
        ))
        .unwrap();

    let report = run(&store, ResolveOptions::default()).await;
    assert_eq!(report.resolved, vec!["P1".to_string()]);
    let input = store.rows_of("P1")[0].input;
    assert!(input.is_complete());
    assert!((input.diff.unwrap() - vars(950.0, 400.0).diff).abs() < EPS);
}

#[tokio::test]
async fn scenario_store_failure_aborts_the_run() {
    let store = MemStore::new();
    store.add_catalogue("B1", vars(950.0, 400.0));
    store
        .add_process(standard(
            "P1",
            "2026-01-05",
            vec![
                input_row("B1", 1000.0, "AA TOP"),
                output_row("B2", 900.0, "AB PLUS"),
            ],
        ))
        .unwrap();
    store.fail_commits(true);

    let classifier = StrategyClassifier::new();
    let ctx = ResolveContext {
        catalogue: &store,
        ledger: &store,
        classifier: &classifier,
    };
    let err = resolve_processes(&ctx, &store, ResolveOptions::default())
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("store unavailable"));
    assert!(!store.process("P1").unwrap().resolved);
}
