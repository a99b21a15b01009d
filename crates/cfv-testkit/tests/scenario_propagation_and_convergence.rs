use cfv_engine::*;
use cfv_schemas::{FailureKind, TradeVarsPatch};
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

fn no_push() -> ResolveOptions {
    ResolveOptions {
        downstream_push: false,
        ..ResolveOptions::default()
    }
}

fn milling_chain(store: &MemStore) {
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
    store
        .add_process(standard(
            "P2",
            "2026-01-06",
            vec![
                input_row("B2", 900.0, "AB PLUS"),
                output_row("B3", 600.0, "AB TOP"),
                output_row("B4", 280.0, "C PLUS"),
            ],
        ))
        .unwrap();
}

#[tokio::test]
async fn scenario_prior_output_matches_catalogue_equivalent() {
    // A: B2 is only known as P1's output
    let a = MemStore::new();
    milling_chain(&a);
    let report = run(&a, no_push()).await;
    assert_eq!(report.resolved, vec!["P1".to_string(), "P2".to_string()]);
    assert_eq!(report.pushed_rows, 0);

    let b2_vars = a.rows_of("P1")[1].output.resolve().unwrap();
    assert_eq!(a.rows_of("P2")[0].input.resolve(), Some(b2_vars));

    // B: the same B2 bought directly from the catalogue
    let b = MemStore::new();
    b.add_catalogue("B2", b2_vars);
    b.add_process(standard(
        "P2",
        "2026-01-06",
        vec![
            input_row("B2", 900.0, "AB PLUS"),
            output_row("B3", 600.0, "AB TOP"),
            output_row("B4", 280.0, "C PLUS"),
        ],
    ))
    .unwrap();
    run(&b, no_push()).await;

    let pa = a.process("P2").unwrap();
    let pb = b.process("P2").unwrap();
    assert!((pa.pnl.unwrap() - pb.pnl.unwrap()).abs() < EPS);
    for (ra, rb) in a.rows_of("P2").iter().zip(b.rows_of("P2").iter()).skip(1) {
        let va = ra.output.resolve().unwrap();
        let vb = rb.output.resolve().unwrap();
        assert!((va.cost - vb.cost).abs() < EPS);
        assert!((va.hedge - vb.hedge).abs() < EPS);
        assert!((va.diff - vb.diff).abs() < EPS);
    }
}

#[tokio::test]
async fn scenario_push_fills_downstream_inputs() {
    let store = MemStore::new();
    milling_chain(&store);

    let report = run(&store, ResolveOptions::default()).await;
    assert_eq!(report.resolved, vec!["P1".to_string(), "P2".to_string()]);
    // P1 pushed into P2's B2 input; P2's outputs have no consumers
    assert_eq!(report.pushed_rows, 1);
}

#[tokio::test]
async fn scenario_push_never_overwrites_known_input_vars() {
    let store = MemStore::new();
    milling_chain(&store);
    let p2_input = store.rows_of("P2")[0].row_id;
    store.set_input_vars(
        p2_input,
        TradeVarsPatch {
            cost: Some(1234.0),
            hedge: None,
            diff: None,
        },
    );

    let report = run(&store, ResolveOptions::default()).await;
    assert!(report.is_clean());

    let b2_vars = store.rows_of("P1")[1].output.resolve().unwrap();
    let input = store.rows_of("P2")[0].input;
    assert_eq!(input.cost, Some(1234.0));
    assert_eq!(input.hedge, Some(b2_vars.hedge));
    assert_eq!(input.diff, Some(b2_vars.diff));
}

#[tokio::test]
async fn scenario_cleanup_phase_unblocks_out_of_order_consumer() {
    for options in [ResolveOptions::default(), no_push()] {
        let store = MemStore::new();
        store.add_catalogue("B1", vars(950.0, 400.0));
        // dated before its producer: visited first, fails in phase 1
        store
            .add_process(standard(
                "EARLY",
                "2026-01-04",
                vec![
                    input_row("B2", 900.0, "AB PLUS"),
                    output_row("B3", 880.0, "AB PLUS"),
                ],
            ))
            .unwrap();
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

        let report = run(&store, options).await;
        assert_eq!(
            report.resolved,
            vec!["P1".to_string(), "EARLY".to_string()],
            "options {options:?}"
        );
        assert!(report.skipped.is_empty());
        // phase-1 failure is still on the operator log
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].kind, FailureKind::UnresolvableBatch);
        assert_eq!(report.diagnostics[0].process_number, "EARLY");
    }
}

#[tokio::test]
async fn scenario_unknown_batch_skipped_with_one_diagnostic() {
    let store = MemStore::new();
    milling_chain(&store);
    store
        .add_process(standard(
            "P3",
            "2026-01-07",
            vec![
                input_row("GHOST", 500.0, "AA TOP"),
                output_row("B9", 490.0, "AA TOP"),
            ],
        ))
        .unwrap();

    let report = run(&store, ResolveOptions::default()).await;
    assert_eq!(report.resolved, vec!["P1".to_string(), "P2".to_string()]);
    assert_eq!(report.skipped, vec!["P3".to_string()]);

    // revisited in phase 2 but recorded once
    let diags = store.diagnostics();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].run_id, report.run_id);
    assert_eq!(diags[0].batch_id.as_deref(), Some("GHOST"));
    assert_eq!(diags[0].kind, FailureKind::UnresolvableBatch);
}

#[tokio::test]
async fn scenario_same_date_prior_outputs_flagged_ambiguous() {
    let store = MemStore::new();
    store.add_catalogue("B1", vars(950.0, 400.0));
    store.add_catalogue("B5", vars(700.0, 390.0));
    store
        .add_process(standard(
            "PA",
            "2026-01-05",
            vec![
                input_row("B1", 1000.0, "AA TOP"),
                output_row("LOT-9", 900.0, "AB PLUS"),
            ],
        ))
        .unwrap();
    store
        .add_process(standard(
            "PB",
            "2026-01-05",
            vec![
                input_row("B5", 1000.0, "AB PLUS"),
                output_row("LOT-9", 950.0, "AB PLUS"),
            ],
        ))
        .unwrap();
    store
        .add_process(standard(
            "PC",
            "2026-01-06",
            vec![
                input_row("LOT-9", 900.0, "AB PLUS"),
                output_row("LOT-10", 900.0, "AB PLUS"),
            ],
        ))
        .unwrap();

    let report = run(&store, no_push()).await;
    assert_eq!(report.resolved.len(), 3);

    // highest row id on the latest date wins
    let pb_out = store.rows_of("PB")[1].output.resolve().unwrap();
    assert_eq!(store.rows_of("PC")[0].input.resolve(), Some(pb_out));

    assert_eq!(report.diagnostics.len(), 1);
    let d = &report.diagnostics[0];
    assert_eq!(d.kind, FailureKind::AmbiguousSource);
    assert_eq!(d.process_number, "PC");
    assert!(d.reason.contains("PA#"), "{}", d.reason);
}

#[tokio::test]
async fn scenario_second_run_is_a_no_op() {
    let store = MemStore::new();
    milling_chain(&store);

    let first = run(&store, ResolveOptions::default()).await;
    assert_eq!(first.resolved.len(), 2);
    let before = (store.process("P2"), store.rows_of("P2"), store.rows_of("P1"));

    let second = run(&store, ResolveOptions::default()).await;
    assert_ne!(first.run_id, second.run_id);
    assert!(second.resolved.is_empty());
    assert!(second.skipped.is_empty());
    assert!(second.diagnostics.is_empty());
    assert_eq!(second.pushed_rows, 0);
    assert_eq!(
        before,
        (store.process("P2"), store.rows_of("P2"), store.rows_of("P1"))
    );
}

#[tokio::test]
async fn scenario_resolved_values_are_never_recomputed() {
    let store = MemStore::new();
    milling_chain(&store);
    run(&store, ResolveOptions::default()).await;
    let p1 = store.process("P1").unwrap();
    let p1_rows = store.rows_of("P1");

    // new facts that would change P1 if it were revisited
    store.add_catalogue("B1", vars(1500.0, 420.0));
    store
        .add_process(standard(
            "P0",
            "2026-01-01",
            vec![
                input_row("B1", 500.0, "AA TOP"),
                output_row("B2", 480.0, "AB PLUS"),
            ],
        ))
        .unwrap();
    let report = run(&store, ResolveOptions::default()).await;
    assert_eq!(report.resolved, vec!["P0".to_string()]);

    assert_eq!(store.process("P1").unwrap(), p1);
    assert_eq!(store.rows_of("P1"), p1_rows);
}
