use cfv_schemas::TradeVars;

/// An input row with its resolved trade vars and strategy valo.
#[derive(Clone, Debug, PartialEq)]
pub struct InputLine {
    pub row_id: i64,
    pub qty_kg: f64,
    pub vars: TradeVars,
    /// cents/lb
    pub valo: f64,
}

/// An output row with its strategy valo.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputLine {
    pub row_id: i64,
    pub qty_kg: f64,
    /// cents/lb
    pub valo: f64,
}

/// Quantity-weighted input aggregates.
#[derive(Clone, Debug, PartialEq)]
pub struct InputAggregates {
    pub total_qty_kg: f64,
    /// currency per 50 kg
    pub avg_cost: f64,
    /// cents/lb; inherited by every output as its base hedge.
    pub avg_hedge: f64,
    /// cents/lb
    pub avg_diff: f64,
    /// Sum of valo-based theoretical values, cents.
    pub theoretical_value_cents: f64,
}

/// Per-output result.
#[derive(Clone, Debug, PartialEq)]
pub struct OutputAllocation {
    pub row_id: i64,
    pub qty_kg: f64,
    pub score: f64,
    pub theoretical_value_cents: f64,
    /// Share of real input money carried by this output, currency.
    pub accounting_value: f64,
    pub vars: TradeVars,
}

/// Full valuation of one process.
#[derive(Clone, Debug, PartialEq)]
pub struct Valuation {
    pub inputs: InputAggregates,
    pub output_value_cents: f64,
    /// `(total input qty / 50) * avg input cost`, currency.
    pub real_input_cost: f64,
    pub outputs: Vec<OutputAllocation>,
}

impl Valuation {
    /// Theoretical input value, currency.
    pub fn input_value(&self) -> f64 {
        self.inputs.theoretical_value_cents / 100.0
    }

    /// Theoretical output value, currency.
    pub fn output_value(&self) -> f64 {
        self.output_value_cents / 100.0
    }

    /// `(output value - input value) / 100`, currency.
    pub fn pnl(&self) -> f64 {
        (self.output_value_cents - self.inputs.theoretical_value_cents) / 100.0
    }

    /// Sum of output accounting values; equals `real_input_cost` for STANDARD.
    pub fn total_accounting_value(&self) -> f64 {
        self.outputs.iter().map(|o| o.accounting_value).sum()
    }
}

/// Arithmetic failures. All of them leave the process unresolved.
#[derive(Clone, Debug, PartialEq)]
pub enum ValuationError {
    NoInputs,
    NoOutputs,
    /// BULKING requires exactly one output.
    BulkOutputCount { got: usize },
    /// A computed value is NaN or infinite.
    NonFinite {
        what: &'static str,
        row_id: Option<i64>,
    },
}

impl std::fmt::Display for ValuationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoInputs => write!(f, "valuation requires at least one input"),
            Self::NoOutputs => write!(f, "valuation requires at least one output"),
            Self::BulkOutputCount { got } => {
                write!(f, "bulking requires exactly one output, got {got}")
            }
            Self::NonFinite { what, row_id } => match row_id {
                Some(id) => write!(f, "non-finite {what} for row {id}"),
                None => write!(f, "non-finite {what}"),
            },
        }
    }
}

impl std::error::Error for ValuationError {}

pub(crate) fn finite(
    value: f64,
    what: &'static str,
    row_id: Option<i64>,
) -> Result<f64, ValuationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValuationError::NonFinite { what, row_id })
    }
}
