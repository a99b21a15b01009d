use std::collections::BTreeMap;

use cfv_schemas::{Dimension, ProcessingTotals};
use cfv_strategy::StrategyClassifier;

/// Group for rows with no grade / strategy recorded.
pub const UNDEFINED_VALUE: &str = "UNDEFINED";

/// A canonical dimension value.
///
/// `recognized` is false for a strategy label the classifier has no mapping
/// for; such labels still group under their trimmed upper-cased text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DimensionKey {
    pub value: String,
    pub recognized: bool,
}

/// Canonicalize a raw grade or strategy value.
///
/// - missing / blank => `UNDEFINED`
/// - grade => trimmed, upper-cased
/// - strategy => canonical strategy key when known, else trimmed upper-cased label
pub fn dimension_key(
    classifier: &StrategyClassifier,
    dimension: Dimension,
    raw: Option<&str>,
) -> DimensionKey {
    let trimmed = raw.map(str::trim).unwrap_or("");
    if trimmed.is_empty() {
        return DimensionKey {
            value: UNDEFINED_VALUE.to_string(),
            recognized: true,
        };
    }

    match dimension {
        Dimension::Grade => DimensionKey {
            value: trimmed.to_uppercase(),
            recognized: true,
        },
        Dimension::Strategy => match classifier.classify(trimmed) {
            Some(s) => DimensionKey {
                value: s.as_str().to_string(),
                recognized: true,
            },
            None => DimensionKey {
                value: trimmed.to_uppercase(),
                recognized: false,
            },
        },
    }
}

/// Re-key a quantity map onto canonical values, summing collisions.
///
/// Returns the re-keyed map and the raw keys that were not recognized.
pub fn rekey_quantities(
    classifier: &StrategyClassifier,
    dimension: Dimension,
    raw: &BTreeMap<String, f64>,
) -> (BTreeMap<String, f64>, Vec<String>) {
    let mut out: BTreeMap<String, f64> = BTreeMap::new();
    let mut unrecognized = Vec::new();
    for (k, qty) in raw {
        let key = dimension_key(classifier, dimension, Some(k));
        if !key.recognized {
            unrecognized.push(k.clone());
        }
        *out.entry(key.value).or_insert(0.0) += qty;
    }
    (out, unrecognized)
}

/// Re-key processing totals onto canonical values, summing collisions.
pub fn rekey_totals(
    classifier: &StrategyClassifier,
    dimension: Dimension,
    raw: &BTreeMap<String, ProcessingTotals>,
) -> (BTreeMap<String, ProcessingTotals>, Vec<String>) {
    let mut out: BTreeMap<String, ProcessingTotals> = BTreeMap::new();
    let mut unrecognized = Vec::new();
    for (k, totals) in raw {
        let key = dimension_key(classifier, dimension, Some(k));
        if !key.recognized {
            unrecognized.push(k.clone());
        }
        out.entry(key.value).or_default().add(totals);
    }
    (out, unrecognized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_group_under_undefined() {
        let c = StrategyClassifier::new();
        for d in Dimension::ALL {
            assert_eq!(dimension_key(&c, d, None).value, UNDEFINED_VALUE);
            assert_eq!(dimension_key(&c, d, Some("  ")).value, UNDEFINED_VALUE);
        }
    }

    #[test]
    fn grade_is_trimmed_and_upper_cased() {
        let c = StrategyClassifier::new();
        let k = dimension_key(&c, Dimension::Grade, Some(" aa "));
        assert_eq!(k.value, "AA");
        assert!(k.recognized);
    }

    #[test]
    fn strategy_aliases_collapse_onto_one_key() {
        let c = StrategyClassifier::new();
        let mut raw = BTreeMap::new();
        raw.insert("AB PLUS".to_string(), 100.0);
        raw.insert("ab+".to_string(), 50.0);
        raw.insert("Robusta".to_string(), 7.0);

        let (out, unknown) = rekey_quantities(&c, Dimension::Strategy, &raw);
        assert_eq!(out.get("AB_PLUS"), Some(&150.0));
        assert_eq!(out.get("ROBUSTA"), Some(&7.0));
        assert_eq!(unknown, vec!["Robusta".to_string()]);
    }
}
