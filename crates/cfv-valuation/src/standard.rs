use cfv_schemas::{bags, differential_from_cost, TradeVars, KG_TO_LB};

use crate::types::{
    finite, InputAggregates, InputLine, OutputAllocation, OutputLine, Valuation, ValuationError,
};

/// Valo-based theoretical value in cents: `valo * qty_kg * KG_TO_LB`.
///
/// The hedge is excluded; valo is already the value above/below the benchmark.
pub fn theoretical_value_cents(valo: f64, qty_kg: f64) -> f64 {
    valo * qty_kg * KG_TO_LB
}

/// `max(0, base_hedge + valo) * qty_kg`
pub fn allocation_score(base_hedge: f64, valo: f64, qty_kg: f64) -> f64 {
    (base_hedge + valo).max(0.0) * qty_kg
}

/// Quantity-weighted cost / hedge / differential and theoretical value of the inputs.
pub fn aggregate_inputs(inputs: &[InputLine]) -> Result<InputAggregates, ValuationError> {
    if inputs.is_empty() {
        return Err(ValuationError::NoInputs);
    }

    let mut total_qty = 0.0;
    let mut cost_w = 0.0;
    let mut hedge_w = 0.0;
    let mut diff_w = 0.0;
    let mut value_cents = 0.0;

    for i in inputs {
        total_qty += i.qty_kg;
        cost_w += i.vars.cost * i.qty_kg;
        hedge_w += i.vars.hedge * i.qty_kg;
        diff_w += i.vars.diff * i.qty_kg;
        value_cents += theoretical_value_cents(i.valo, i.qty_kg);
    }

    Ok(InputAggregates {
        total_qty_kg: total_qty,
        avg_cost: finite(cost_w / total_qty, "average input cost", None)?,
        avg_hedge: finite(hedge_w / total_qty, "average input hedge", None)?,
        avg_diff: finite(diff_w / total_qty, "average input differential", None)?,
        theoretical_value_cents: finite(value_cents, "input value", None)?,
    })
}

/// Value a STANDARD (split/transform) process.
///
/// Rules:
/// - every output inherits the weighted input hedge as its base hedge
/// - real input money = `bags(total input qty) * avg input cost`
/// - each output receives `score / total score` of the real input money
/// - output cost per bag = accounting value / bags(output qty)
/// - output differential = cost / LB_PER_50KG_CONVERSION - base hedge
pub fn value_standard(
    inputs: &[InputLine],
    outputs: &[OutputLine],
) -> Result<Valuation, ValuationError> {
    let agg = aggregate_inputs(inputs)?;
    if outputs.is_empty() {
        return Err(ValuationError::NoOutputs);
    }

    let base_hedge = agg.avg_hedge;
    let real_input_cost = finite(
        bags(agg.total_qty_kg) * agg.avg_cost,
        "real input cost",
        None,
    )?;

    let scores: Vec<f64> = outputs
        .iter()
        .map(|o| allocation_score(base_hedge, o.valo, o.qty_kg))
        .collect();
    let total_score: f64 = scores.iter().sum();

    let mut output_value_cents = 0.0;
    let mut allocations = Vec::with_capacity(outputs.len());

    for (o, score) in outputs.iter().zip(scores) {
        let value_cents = theoretical_value_cents(o.valo, o.qty_kg);
        output_value_cents += value_cents;

        let accounting_value = finite(
            score / total_score * real_input_cost,
            "output accounting value",
            Some(o.row_id),
        )?;
        let cost = finite(
            accounting_value / bags(o.qty_kg),
            "output cost",
            Some(o.row_id),
        )?;
        let diff = finite(
            differential_from_cost(cost, base_hedge),
            "output differential",
            Some(o.row_id),
        )?;

        allocations.push(OutputAllocation {
            row_id: o.row_id,
            qty_kg: o.qty_kg,
            score,
            theoretical_value_cents: value_cents,
            accounting_value,
            vars: TradeVars::new(cost, base_hedge, diff),
        });
    }

    Ok(Valuation {
        inputs: agg,
        output_value_cents: finite(output_value_cents, "output value", None)?,
        real_input_cost,
        outputs: allocations,
    })
}
