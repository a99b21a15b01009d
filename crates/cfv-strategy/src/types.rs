use serde::{Deserialize, Serialize};

/// Canonical strategy keys.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    AaTop,
    AaPlus,
    AaFaq,
    AbTop,
    AbPlus,
    AbFaq,
    PbTop,
    PbPlus,
    CPlus,
    Tt,
    T,
    Mbuni,
    /// Placeholder for lots whose strategy is not yet decided. Has no valo.
    Undefined,
}

impl Strategy {
    pub const ALL: [Strategy; 13] = [
        Strategy::AaTop,
        Strategy::AaPlus,
        Strategy::AaFaq,
        Strategy::AbTop,
        Strategy::AbPlus,
        Strategy::AbFaq,
        Strategy::PbTop,
        Strategy::PbPlus,
        Strategy::CPlus,
        Strategy::Tt,
        Strategy::T,
        Strategy::Mbuni,
        Strategy::Undefined,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::AaTop => "AA_TOP",
            Strategy::AaPlus => "AA_PLUS",
            Strategy::AaFaq => "AA_FAQ",
            Strategy::AbTop => "AB_TOP",
            Strategy::AbPlus => "AB_PLUS",
            Strategy::AbFaq => "AB_FAQ",
            Strategy::PbTop => "PB_TOP",
            Strategy::PbPlus => "PB_PLUS",
            Strategy::CPlus => "C_PLUS",
            Strategy::Tt => "TT",
            Strategy::T => "T",
            Strategy::Mbuni => "MBUNI",
            Strategy::Undefined => "UNDEFINED",
        }
    }

    /// Exact canonical key match (case-insensitive).
    pub fn from_key(key: &str) -> Option<Strategy> {
        let k = key.trim();
        Strategy::ALL
            .iter()
            .copied()
            .find(|s| s.as_str().eq_ignore_ascii_case(k))
    }

    /// Built-in valo table, cents/lb relative to the hedge benchmark.
    pub fn default_valo(&self) -> Option<f64> {
        match self {
            Strategy::AaTop => Some(95.0),
            Strategy::AaPlus => Some(80.0),
            Strategy::AaFaq => Some(60.0),
            Strategy::AbTop => Some(55.0),
            Strategy::AbPlus => Some(45.0),
            Strategy::AbFaq => Some(30.0),
            Strategy::PbTop => Some(50.0),
            Strategy::PbPlus => Some(35.0),
            Strategy::CPlus => Some(10.0),
            Strategy::Tt => Some(-20.0),
            Strategy::T => Some(-45.0),
            Strategy::Mbuni => Some(-150.0),
            Strategy::Undefined => None,
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
