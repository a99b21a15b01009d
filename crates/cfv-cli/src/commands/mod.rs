//! Command handler modules for cfv-cli.
//!
//! Shared helpers used by several commands live here.

pub mod activity;
pub mod import;
pub mod resolve;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use tracing::warn;

use cfv_config::{ConfigMode, EngineSettings, LoadedConfig, UnusedKeyPolicy};
use cfv_diagnostics::VerifyResult;

/// Load layered config (defaults when no path is given), warn on unused keys
/// for `mode`, and return the typed settings.
pub fn load_settings(config_paths: &[String], mode: ConfigMode) -> Result<(LoadedConfig, EngineSettings)> {
    let loaded = if config_paths.is_empty() {
        LoadedConfig::empty()?
    } else {
        let refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
        cfv_config::load_layered_yaml(&refs)?
    };

    let report =
        cfv_config::report_unused_keys(mode, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    for key in &report.unused_leaf_pointers {
        if report.unknown_leaf_pointers.contains(key) {
            warn!(mode = mode.as_str(), key = %key, "config key is not a known setting");
        } else {
            warn!(mode = mode.as_str(), key = %key, "config key is not read by this command");
        }
    }

    let settings = EngineSettings::from_config_json(&loaded.config_json)?;
    Ok((loaded, settings))
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid --date '{s}'. expected YYYY-MM-DD"))
}

pub fn verify_journal(path: &str) -> Result<()> {
    match cfv_diagnostics::verify_hash_chain(path)? {
        VerifyResult::Valid { lines } => {
            println!("hash_chain_valid=true lines={lines}");
            Ok(())
        }
        VerifyResult::Broken { line, reason } => {
            println!("hash_chain_valid=false line={line}");
            bail!("diagnostics journal {path} broken at line {line}: {reason}")
        }
    }
}
