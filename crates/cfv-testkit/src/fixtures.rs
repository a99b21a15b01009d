use chrono::NaiveDate;

use cfv_schemas::{
    differential_from_cost, FlowFact, FlowKind, NewProcess, NewProcessingRow, ProcessKind,
    TradeVars, TradeVarsPatch,
};

/// `YYYY-MM-DD`; panics on malformed input.
pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_else(|e| panic!("bad date {s}: {e}"))
}

/// Trade vars with the differential implied by cost and hedge.
pub fn vars(cost: f64, hedge: f64) -> TradeVars {
    TradeVars::new(cost, hedge, differential_from_cost(cost, hedge))
}

pub fn input_row(batch_id: &str, qty_kg: f64, strategy: &str) -> NewProcessingRow {
    NewProcessingRow {
        batch_id: batch_id.to_string(),
        input_qty_kg: qty_kg,
        output_qty_kg: 0.0,
        strategy: Some(strategy.to_string()),
        grade: None,
        loss_gain_kg: 0.0,
        input: TradeVarsPatch::empty(),
    }
}

pub fn output_row(batch_id: &str, qty_kg: f64, strategy: &str) -> NewProcessingRow {
    NewProcessingRow {
        batch_id: batch_id.to_string(),
        input_qty_kg: 0.0,
        output_qty_kg: qty_kg,
        strategy: Some(strategy.to_string()),
        grade: None,
        loss_gain_kg: 0.0,
        input: TradeVarsPatch::empty(),
    }
}

pub fn with_grade(mut row: NewProcessingRow, grade: &str) -> NewProcessingRow {
    row.grade = Some(grade.to_string());
    row
}

pub fn standard(number: &str, on: &str, rows: Vec<NewProcessingRow>) -> NewProcess {
    NewProcess {
        process_number: number.to_string(),
        kind: ProcessKind::Standard,
        process_date: date(on),
        rows,
    }
}

pub fn bulking(number: &str, on: &str, rows: Vec<NewProcessingRow>) -> NewProcess {
    NewProcess {
        process_number: number.to_string(),
        kind: ProcessKind::Bulking,
        process_date: date(on),
        rows,
    }
}

pub fn flow(kind: FlowKind, on: &str, batch_id: &str, grade: &str, qty_kg: f64) -> FlowFact {
    FlowFact {
        kind,
        fact_date: date(on),
        batch_id: batch_id.to_string(),
        grade: Some(grade.to_string()),
        strategy: None,
        qty_kg,
    }
}
