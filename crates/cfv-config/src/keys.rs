use anyhow::{bail, Result};
use serde_json::Value;

/// Which command is reading the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigMode {
    Resolve,
    Activity,
}

impl ConfigMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigMode::Resolve => "RESOLVE",
            ConfigMode::Activity => "ACTIVITY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

/// A setting [`crate::EngineSettings`] reads, and the commands that read it.
/// Everything below `path` belongs to the setting.
struct SettingKey {
    path: &'static [&'static str],
    resolve: bool,
    activity: bool,
}

impl SettingKey {
    fn read_by(&self, mode: ConfigMode) -> bool {
        match mode {
            ConfigMode::Resolve => self.resolve,
            ConfigMode::Activity => self.activity,
        }
    }
}

const SETTING_KEYS: &[SettingKey] = &[
    SettingKey { path: &["engine", "downstream_push"], resolve: true, activity: false },
    SettingKey { path: &["engine", "lookup_concurrency"], resolve: true, activity: false },
    SettingKey { path: &["valuation", "valos"], resolve: true, activity: true },
    SettingKey { path: &["reconcile", "dimensions"], resolve: false, activity: true },
    SettingKey { path: &["reconcile", "discrepancy_tolerance_kg"], resolve: false, activity: true },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnusedKeyReport {
    pub mode: ConfigMode,
    /// Sorted pointers of leaves this command ignores.
    pub unused_leaf_pointers: Vec<String>,
    /// Subset of `unused_leaf_pointers` that no command reads (likely typos).
    pub unknown_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Walk the merged config and list what `mode` will not read.
pub fn report_unused_keys(
    mode: ConfigMode,
    config: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let mut unused = Vec::new();
    let mut unknown = Vec::new();
    collect_unread(config, &mut Vec::new(), mode, &mut unused, &mut unknown);
    unused.sort();
    unknown.sort();

    let report = UnusedKeyReport {
        mode,
        unused_leaf_pointers: unused,
        unknown_leaf_pointers: unknown,
    };
    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS (mode={}) {} key(s) not read: {}",
            mode.as_str(),
            report.unused_leaf_pointers.len(),
            report.unused_leaf_pointers.join(", ")
        );
    }
    Ok(report)
}

fn collect_unread<'a>(
    value: &'a Value,
    path: &mut Vec<&'a str>,
    mode: ConfigMode,
    unused: &mut Vec<String>,
    unknown: &mut Vec<String>,
) {
    if let Some(key) = SETTING_KEYS.iter().find(|k| k.path == path.as_slice()) {
        if !key.read_by(mode) {
            unused.push(pointer(path));
        }
        return;
    }
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (k, v) in map {
                path.push(k);
                collect_unread(v, path, mode, unused, unknown);
                path.pop();
            }
        }
        // the root itself is never reported
        _ if path.is_empty() => {}
        _ => {
            let p = pointer(path);
            unknown.push(p.clone());
            unused.push(p);
        }
    }
}

fn pointer(path: &[&str]) -> String {
    format!("/{}", path.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_setting_is_read_by_some_command() {
        assert!(SETTING_KEYS.iter().all(|k| k.resolve || k.activity));
    }

    #[test]
    fn valo_overrides_are_one_setting_for_both_commands() {
        let cfg = json!({"valuation": {"valos": {"AB_PLUS": 40, "TT": -40}}});
        for mode in [ConfigMode::Resolve, ConfigMode::Activity] {
            let r = report_unused_keys(mode, &cfg, UnusedKeyPolicy::Fail).unwrap();
            assert!(r.is_clean());
        }
    }

    #[test]
    fn other_command_keys_are_unused_but_not_unknown() {
        let cfg = json!({"reconcile": {"dimensions": ["grade"]}, "enigne": {"x": 1}});
        let r = report_unused_keys(ConfigMode::Resolve, &cfg, UnusedKeyPolicy::Warn).unwrap();
        assert_eq!(r.unused_leaf_pointers, vec!["/enigne/x", "/reconcile/dimensions"]);
        assert_eq!(r.unknown_leaf_pointers, vec!["/enigne/x"]);
    }

    #[test]
    fn empty_object_has_no_leaves() {
        let r = report_unused_keys(ConfigMode::Activity, &json!({}), UnusedKeyPolicy::Fail).unwrap();
        assert!(r.is_clean());
    }
}
