use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;

use cfv_schemas::Dimension;
use cfv_strategy::StrategyClassifier;

pub const DEFAULT_LOOKUP_CONCURRENCY: usize = 8;
pub const DEFAULT_DISCREPANCY_TOLERANCE_KG: f64 = 0.5;

/// Typed view of the recognised config keys. Absent keys take defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// `/engine/downstream_push`
    pub downstream_push: bool,
    /// `/engine/lookup_concurrency`
    pub lookup_concurrency: usize,
    /// `/valuation/valos/<KEY>` overrides on top of the built-in table.
    pub valos: BTreeMap<String, f64>,
    /// `/reconcile/dimensions`
    pub dimensions: Vec<Dimension>,
    /// `/reconcile/discrepancy_tolerance_kg`
    pub discrepancy_tolerance_kg: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            downstream_push: true,
            lookup_concurrency: DEFAULT_LOOKUP_CONCURRENCY,
            valos: BTreeMap::new(),
            dimensions: Dimension::ALL.to_vec(),
            discrepancy_tolerance_kg: DEFAULT_DISCREPANCY_TOLERANCE_KG,
        }
    }
}

impl EngineSettings {
    pub fn from_config_json(config: &Value) -> Result<Self> {
        let mut s = Self::default();

        if let Some(v) = config.pointer("/engine/downstream_push") {
            s.downstream_push = v
                .as_bool()
                .ok_or_else(|| anyhow!("/engine/downstream_push must be a bool"))?;
        }

        if let Some(v) = config.pointer("/engine/lookup_concurrency") {
            let n = v
                .as_u64()
                .ok_or_else(|| anyhow!("/engine/lookup_concurrency must be a positive integer"))?;
            if n == 0 {
                bail!("/engine/lookup_concurrency must be > 0");
            }
            s.lookup_concurrency =
                usize::try_from(n).context("/engine/lookup_concurrency out of range")?;
        }

        if let Some(v) = config.pointer("/valuation/valos") {
            let map = v
                .as_object()
                .ok_or_else(|| anyhow!("/valuation/valos must be a mapping"))?;
            for (key, val) in map {
                let valo = val
                    .as_f64()
                    .ok_or_else(|| anyhow!("/valuation/valos/{key} must be a number"))?;
                s.valos.insert(key.clone(), valo);
            }
        }

        if let Some(v) = config.pointer("/reconcile/dimensions") {
            let arr = v
                .as_array()
                .ok_or_else(|| anyhow!("/reconcile/dimensions must be a list"))?;
            let mut dims = Vec::with_capacity(arr.len());
            for item in arr {
                let raw = item
                    .as_str()
                    .ok_or_else(|| anyhow!("/reconcile/dimensions entries must be strings"))?;
                let d = Dimension::parse(raw)?;
                if !dims.contains(&d) {
                    dims.push(d);
                }
            }
            if dims.is_empty() {
                bail!("/reconcile/dimensions must name at least one dimension");
            }
            s.dimensions = dims;
        }

        if let Some(v) = config.pointer("/reconcile/discrepancy_tolerance_kg") {
            let t = v
                .as_f64()
                .ok_or_else(|| anyhow!("/reconcile/discrepancy_tolerance_kg must be a number"))?;
            if !t.is_finite() || t < 0.0 {
                bail!("/reconcile/discrepancy_tolerance_kg must be finite and >= 0, got {t}");
            }
            s.discrepancy_tolerance_kg = t;
        }

        Ok(s)
    }

    /// Classifier with the configured valo overrides; fails on unknown keys.
    pub fn classifier(&self) -> Result<StrategyClassifier> {
        StrategyClassifier::with_valos(&self.valos)
            .map_err(|e| anyhow!("invalid /valuation/valos: {e}"))
    }
}
