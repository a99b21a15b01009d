use cfv_schemas::{differential_from_cost, TradeVars, KG_TO_LB, LB_PER_50KG_CONVERSION};
use cfv_valuation::*;

const EPS: f64 = 1e-6;

fn input(row_id: i64, qty: f64, cost: f64, hedge: f64, valo: f64) -> InputLine {
    InputLine {
        row_id,
        qty_kg: qty,
        vars: TradeVars::new(cost, hedge, differential_from_cost(cost, hedge)),
        valo,
    }
}

fn output(row_id: i64, qty: f64, valo: f64) -> OutputLine {
    OutputLine {
        row_id,
        qty_kg: qty,
        valo,
    }
}

#[test]
fn scenario_single_input_single_output_worked_example() {
    // 1000 kg AA TOP (valo 95) @ 950/bag, hedge 400 -> 900 kg AB PLUS (valo 45)
    let v = value_standard(&[input(1, 1000.0, 950.0, 400.0, 95.0)], &[output(2, 900.0, 45.0)])
        .unwrap();

    let expected_in_cents = 95.0 * 1000.0 * KG_TO_LB;
    let expected_out_cents = 45.0 * 900.0 * KG_TO_LB;
    assert!((v.inputs.theoretical_value_cents - expected_in_cents).abs() < EPS);
    assert!((v.output_value_cents - expected_out_cents).abs() < EPS);
    assert!((v.pnl() - (expected_out_cents - expected_in_cents) / 100.0).abs() < EPS);

    // real input cost = 20 bags * 950
    assert!((v.real_input_cost - 19_000.0).abs() < EPS);

    let o = &v.outputs[0];
    assert!((o.score - (400.0 + 45.0) * 900.0).abs() < EPS);

    // (output_cost / 50) * (900 / 50) * 50 == real cost * share (share = 1)
    assert!((o.vars.cost * (900.0 / 50.0) - 19_000.0).abs() < EPS);
    assert!((o.vars.cost - 19_000.0 / 18.0).abs() < EPS);
    assert_eq!(o.vars.hedge, 400.0);
    assert!((o.vars.diff - (o.vars.cost / LB_PER_50KG_CONVERSION - 400.0)).abs() < EPS);
}

#[test]
fn scenario_multi_output_allocation_conserves_real_input_cost() {
    let inputs = [
        input(1, 1200.0, 900.0, 380.0, 95.0),
        input(2, 800.0, 1000.0, 410.0, 45.0),
        input(3, 500.0, 650.0, 395.0, -20.0),
    ];
    let outputs = [
        output(10, 900.0, 95.0),
        output(11, 700.0, 55.0),
        output(12, 450.0, 10.0),
        output(13, 300.0, -150.0),
    ];

    let v = value_standard(&inputs, &outputs).unwrap();

    // conservation
    assert!((v.total_accounting_value() - v.real_input_cost).abs() < 1e-6);

    // hedge inheritance: every output carries the qty-weighted input hedge
    let expected_hedge = (1200.0 * 380.0 + 800.0 * 410.0 + 500.0 * 395.0) / 2500.0;
    for o in &v.outputs {
        assert!((o.vars.hedge - expected_hedge).abs() < 1e-9, "row {}", o.row_id);
    }

    // shares follow score
    let total_score: f64 = v.outputs.iter().map(|o| o.score).sum();
    for o in &v.outputs {
        let share = o.score / total_score;
        assert!((o.accounting_value - share * v.real_input_cost).abs() < 1e-6);
    }

    // a higher-valo output of equal weight gets a higher bag cost
    assert!(v.outputs[0].vars.cost > v.outputs[1].vars.cost);
}

#[test]
fn scenario_bulk_equal_quantities_average_cost() {
    let inputs = [
        input(1, 600.0, 800.0, 400.0, 45.0),
        input(2, 600.0, 1000.0, 420.0, 55.0),
    ];
    let v = value_bulking(&inputs, &[output(3, 1200.0, 45.0)]).unwrap();
    let o = &v.outputs[0];

    assert!((o.vars.cost - 900.0).abs() < EPS);
    assert!((o.vars.hedge - 410.0).abs() < EPS);
    let expected_diff = (differential_from_cost(800.0, 400.0)
        + differential_from_cost(1000.0, 420.0))
        / 2.0;
    assert!((o.vars.diff - expected_diff).abs() < EPS);

    // P&L uses the output's own valo
    let in_cents = (45.0 * 600.0 + 55.0 * 600.0) * KG_TO_LB;
    let out_cents = 45.0 * 1200.0 * KG_TO_LB;
    assert!((v.pnl() - (out_cents - in_cents) / 100.0).abs() < EPS);
}

#[test]
fn scenario_bulk_weighted_not_simple_average() {
    let inputs = [
        input(1, 300.0, 800.0, 400.0, 45.0),
        input(2, 900.0, 1000.0, 400.0, 45.0),
    ];
    let v = value_bulking(&inputs, &[output(3, 1200.0, 45.0)]).unwrap();
    assert!((v.outputs[0].vars.cost - 950.0).abs() < EPS);
}

#[test]
fn scenario_bulk_requires_exactly_one_output() {
    let inputs = [input(1, 300.0, 800.0, 400.0, 45.0)];
    let err = value_bulking(&inputs, &[output(2, 100.0, 45.0), output(3, 200.0, 45.0)])
        .unwrap_err();
    assert_eq!(err, ValuationError::BulkOutputCount { got: 2 });
}
