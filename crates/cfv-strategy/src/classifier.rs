use std::collections::BTreeMap;

use crate::types::Strategy;

/// Raw label aliases, already normalized. Many-to-one.
const ALIASES: &[(&str, Strategy)] = &[
    ("aa top", Strategy::AaTop),
    ("aatop", Strategy::AaTop),
    ("aa-top", Strategy::AaTop),
    ("aa t", Strategy::AaTop),
    ("aa plus", Strategy::AaPlus),
    ("aa+", Strategy::AaPlus),
    ("aa +", Strategy::AaPlus),
    ("aaplus", Strategy::AaPlus),
    ("aa faq", Strategy::AaFaq),
    ("aafaq", Strategy::AaFaq),
    ("aa", Strategy::AaFaq),
    ("ab top", Strategy::AbTop),
    ("abtop", Strategy::AbTop),
    ("ab-top", Strategy::AbTop),
    ("ab plus", Strategy::AbPlus),
    ("ab+", Strategy::AbPlus),
    ("ab +", Strategy::AbPlus),
    ("abplus", Strategy::AbPlus),
    ("ab faq", Strategy::AbFaq),
    ("abfaq", Strategy::AbFaq),
    ("ab", Strategy::AbFaq),
    ("pb top", Strategy::PbTop),
    ("pbtop", Strategy::PbTop),
    ("peaberry top", Strategy::PbTop),
    ("pb plus", Strategy::PbPlus),
    ("pb+", Strategy::PbPlus),
    ("pb", Strategy::PbPlus),
    ("peaberry", Strategy::PbPlus),
    ("c plus", Strategy::CPlus),
    ("c+", Strategy::CPlus),
    ("c", Strategy::CPlus),
    ("tt", Strategy::Tt),
    ("t t", Strategy::Tt),
    ("t", Strategy::T),
    ("mbuni", Strategy::Mbuni),
    ("mb", Strategy::Mbuni),
    ("buni", Strategy::Mbuni),
    ("undefined", Strategy::Undefined),
    ("undef", Strategy::Undefined),
    ("n/a", Strategy::Undefined),
    ("tbd", Strategy::Undefined),
];

/// Trim, case-fold and collapse inner whitespace.
pub fn normalize_label(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Classification / valuation failures. Callers treat every variant as a hard failure.
#[derive(Clone, Debug, PartialEq)]
pub enum ClassifyError {
    /// Label matches neither an alias nor a canonical key.
    Unmapped { label: String },
    /// Label maps to UNDEFINED, which has no valuation.
    Undefined { label: String },
    /// Canonical strategy has no valo in the active table.
    NoValuation { strategy: Strategy },
    /// Valo override names a key that is not a canonical strategy.
    UnknownKey { key: String },
    /// Valo override is NaN or infinite.
    InvalidValo { key: String, valo: f64 },
}

impl std::fmt::Display for ClassifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unmapped { label } => write!(f, "no strategy mapping for label '{label}'"),
            Self::Undefined { label } => {
                write!(f, "label '{label}' maps to UNDEFINED strategy")
            }
            Self::NoValuation { strategy } => write!(f, "no valo for strategy {strategy}"),
            Self::UnknownKey { key } => write!(f, "unknown strategy key '{key}' in valo table"),
            Self::InvalidValo { key, valo } => {
                write!(f, "valo for {key} must be finite, got {valo}")
            }
        }
    }
}

impl std::error::Error for ClassifyError {}

/// Label -> canonical strategy -> valo.
#[derive(Clone, Debug)]
pub struct StrategyClassifier {
    aliases: BTreeMap<String, Strategy>,
    valos: BTreeMap<Strategy, f64>,
}

impl Default for StrategyClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyClassifier {
    /// Built-in alias map and valo table.
    pub fn new() -> Self {
        let aliases = ALIASES
            .iter()
            .map(|(label, s)| (normalize_label(label), *s))
            .collect();
        let valos = Strategy::ALL
            .iter()
            .filter_map(|s| s.default_valo().map(|v| (*s, v)))
            .collect();
        Self { aliases, valos }
    }

    /// Built-in table with per-key overrides (keys are canonical, e.g. `AB_PLUS`).
    ///
    /// Fails fast on unknown keys, non-finite values, or an override that
    /// would give UNDEFINED a valuation.
    pub fn with_valos(overrides: &BTreeMap<String, f64>) -> Result<Self, ClassifyError> {
        let mut c = Self::new();
        for (key, valo) in overrides {
            let strategy = Strategy::from_key(key).ok_or_else(|| ClassifyError::UnknownKey {
                key: key.clone(),
            })?;
            if strategy == Strategy::Undefined {
                return Err(ClassifyError::UnknownKey { key: key.clone() });
            }
            if !valo.is_finite() {
                return Err(ClassifyError::InvalidValo {
                    key: key.clone(),
                    valo: *valo,
                });
            }
            c.valos.insert(strategy, *valo);
        }
        c.validate_table()?;
        Ok(c)
    }

    fn validate_table(&self) -> Result<(), ClassifyError> {
        for s in Strategy::ALL {
            if s != Strategy::Undefined && !self.valos.contains_key(&s) {
                return Err(ClassifyError::NoValuation { strategy: s });
            }
        }
        Ok(())
    }

    /// Map a raw label to its canonical strategy.
    pub fn classify(&self, raw: &str) -> Option<Strategy> {
        let n = normalize_label(raw);
        if n.is_empty() {
            return None;
        }
        if let Some(s) = self.aliases.get(&n) {
            return Some(*s);
        }
        Strategy::from_key(&n)
    }

    pub fn valo(&self, strategy: Strategy) -> Option<f64> {
        self.valos.get(&strategy).copied()
    }

    /// Classify and value a label in one step.
    pub fn valo_for_label(&self, raw: &str) -> Result<(Strategy, f64), ClassifyError> {
        let strategy = self.classify(raw).ok_or_else(|| ClassifyError::Unmapped {
            label: raw.to_string(),
        })?;
        if strategy == Strategy::Undefined {
            return Err(ClassifyError::Undefined {
                label: raw.to_string(),
            });
        }
        let valo = self
            .valo(strategy)
            .ok_or(ClassifyError::NoValuation { strategy })?;
        Ok((strategy, valo))
    }

    /// Fail on the first label with no mapping.
    pub fn validate_labels<'a, I>(&self, labels: I) -> Result<(), ClassifyError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for label in labels {
            if self.classify(label).is_none() {
                return Err(ClassifyError::Unmapped {
                    label: label.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize_label("  AA   Top "), "aa top");
        assert_eq!(normalize_label("\tAB+\n"), "ab+");
    }

    #[test]
    fn every_alias_target_is_canonical() {
        let c = StrategyClassifier::new();
        for (label, s) in ALIASES {
            assert_eq!(c.classify(label), Some(*s), "alias {label}");
        }
    }

    #[test]
    fn canonical_keys_are_accepted_directly() {
        let c = StrategyClassifier::new();
        for s in Strategy::ALL {
            assert_eq!(c.classify(s.as_str()), Some(s));
            assert_eq!(c.classify(&s.as_str().to_lowercase()), Some(s));
        }
    }

    #[test]
    fn empty_label_is_unmapped() {
        let c = StrategyClassifier::new();
        assert_eq!(c.classify("   "), None);
    }
}
