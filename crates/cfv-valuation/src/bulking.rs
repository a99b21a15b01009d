use cfv_schemas::{bags, TradeVars};

use crate::standard::{aggregate_inputs, allocation_score, theoretical_value_cents};
use crate::types::{finite, InputLine, OutputAllocation, OutputLine, Valuation, ValuationError};

/// Value a BULKING (merge) process.
///
/// The single output takes the quantity-weighted cost / hedge / differential of
/// the inputs directly; no score split. Theoretical values and P&L follow the
/// same valo formulas as STANDARD, with the output's own valo.
pub fn value_bulking(
    inputs: &[InputLine],
    outputs: &[OutputLine],
) -> Result<Valuation, ValuationError> {
    let agg = aggregate_inputs(inputs)?;
    let output = match outputs {
        [one] => one,
        other => {
            return Err(ValuationError::BulkOutputCount { got: other.len() });
        }
    };

    let vars = TradeVars::new(agg.avg_cost, agg.avg_hedge, agg.avg_diff);
    let real_input_cost = finite(
        bags(agg.total_qty_kg) * agg.avg_cost,
        "real input cost",
        None,
    )?;
    let accounting_value = finite(
        bags(output.qty_kg) * vars.cost,
        "output accounting value",
        Some(output.row_id),
    )?;
    let value_cents = finite(
        theoretical_value_cents(output.valo, output.qty_kg),
        "output value",
        Some(output.row_id),
    )?;

    Ok(Valuation {
        inputs: agg,
        output_value_cents: value_cents,
        real_input_cost,
        outputs: vec![OutputAllocation {
            row_id: output.row_id,
            qty_kg: output.qty_kg,
            score: allocation_score(vars.hedge, output.valo, output.qty_kg),
            theoretical_value_cents: value_cents,
            accounting_value,
            vars,
        }],
    })
}
