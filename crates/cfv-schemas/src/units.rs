/// Pounds per kilogram. The single conversion constant used workspace-wide.
pub const KG_TO_LB: f64 = 2.20462;

/// Costs are quoted in currency per 50 kg bag.
pub const BAG_KG: f64 = 50.0;

/// Converts a currency-per-50-kg cost into cents/lb:
/// `cents_per_lb = cost_per_bag / LB_PER_50KG_CONVERSION`.
pub const LB_PER_50KG_CONVERSION: f64 = BAG_KG * KG_TO_LB / 100.0;

/// Number of 50 kg bags in `qty_kg`.
pub fn bags(qty_kg: f64) -> f64 {
    qty_kg / BAG_KG
}

/// Differential (cents/lb) implied by a bag cost and a hedge level.
pub fn differential_from_cost(cost_per_bag: f64, hedge: f64) -> f64 {
    cost_per_bag / LB_PER_50KG_CONVERSION - hedge
}
