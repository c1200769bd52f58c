//! Engine configuration: strict defaults, YAML loading, an unused-key
//! guard, and a content fingerprint so deployments can prove which config
//! an engine instance is actually running.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Leaf keys the engine actually reads. Anything else in a supplied config
/// document is flagged by the unused-key guard.
const CONSUMED_POINTERS: &[&str] = &[
    "/enabled",
    "/max_list_size",
    "/entry_timeout_ticks",
];

/// Policy for config keys the engine does not read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

/// Engine tunables. Time is expressed in embedder-supplied ticks; the
/// engine never reads a wall clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReorderConfig {
    /// Master switch. When false every event passes straight through to
    /// the consumer, unreordered.
    pub enabled: bool,

    /// Maximum pending entries before the list sheds its head (degraded).
    pub max_list_size: usize,

    /// Ticks an entry may wait before it is aged out of the list.
    pub entry_timeout_ticks: u64,
}

impl ReorderConfig {
    pub fn strict_defaults() -> Self {
        Self {
            enabled: true,
            max_list_size: 100,
            entry_timeout_ticks: 500,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_list_size == 0 {
            bail!("max_list_size must be at least 1");
        }
        if self.entry_timeout_ticks == 0 {
            bail!("entry_timeout_ticks must be at least 1");
        }
        Ok(())
    }
}

impl Default for ReorderConfig {
    fn default() -> Self {
        Self::strict_defaults()
    }
}

/// A parsed config together with its canonical form and fingerprint.
#[derive(Debug, Clone)]
pub struct LoadedReorderConfig {
    pub config: ReorderConfig,
    /// SHA-256 of the canonical JSON rendering of the effective config.
    pub config_hash: String,
    pub canonical_json: String,
}

/// Parse a YAML config document. Missing keys fall back to
/// [`ReorderConfig::strict_defaults`]; keys the engine does not read are
/// warnings or errors per `policy`.
pub fn from_yaml_str(yaml: &str, policy: UnusedKeyPolicy) -> Result<LoadedReorderConfig> {
    let v_yaml: serde_yaml::Value = serde_yaml::from_str(yaml).context("invalid yaml")?;
    let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;

    report_unused_keys(&v_json, policy)?;

    let config: ReorderConfig =
        serde_json::from_value(v_json).context("config did not match schema")?;
    config.validate()?;

    // Fingerprint the *effective* config (defaults applied), not the raw
    // document, so two documents meaning the same thing hash the same.
    let effective = serde_json::to_value(&config).context("config serialize failed")?;
    let canonical_json =
        serde_json::to_string(&effective).context("canonical json serialize failed")?;
    let config_hash = sha256_hex(canonical_json.as_bytes());

    Ok(LoadedReorderConfig {
        config,
        config_hash,
        canonical_json,
    })
}

fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<()> {
    let mut leaves: Vec<String> = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|lp| !CONSUMED_POINTERS.contains(&lp.as_str()))
        .collect();
    unused.sort();
    unused.dedup();

    if unused.is_empty() {
        return Ok(());
    }

    match policy {
        UnusedKeyPolicy::Warn => {
            for lp in &unused {
                warn!(pointer = %lp, "config key is not read by the reorder engine");
            }
            Ok(())
        }
        UnusedKeyPolicy::Fail => {
            bail!(
                "CONFIG_UNUSED_KEYS: {} unused config leaf key(s) detected: {:?}",
                unused.len(),
                unused
            );
        }
    }
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) => {
            for (k, vv) in map.iter() {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) => {
            for (i, vv) in arr.iter().enumerate() {
                let next = format!("{}/{}", prefix, i);
                collect_leaf_pointers(vv, &next, out);
            }
        }
        _ => {
            let p = if prefix.is_empty() {
                "/".to_string()
            } else {
                prefix.to_string()
            };
            out.push(p);
        }
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_strict_defaults() {
        let loaded = from_yaml_str("{}", UnusedKeyPolicy::Fail).unwrap();
        assert_eq!(loaded.config, ReorderConfig::strict_defaults());
        assert!(loaded.config.enabled);
        assert_eq!(loaded.config.max_list_size, 100);
        assert_eq!(loaded.config.entry_timeout_ticks, 500);
    }

    #[test]
    fn overrides_apply() {
        let yaml = "enabled: false\nmax_list_size: 8\nentry_timeout_ticks: 32\n";
        let loaded = from_yaml_str(yaml, UnusedKeyPolicy::Fail).unwrap();
        assert!(!loaded.config.enabled);
        assert_eq!(loaded.config.max_list_size, 8);
        assert_eq!(loaded.config.entry_timeout_ticks, 32);
    }

    #[test]
    fn unused_key_fails_under_fail_policy() {
        let yaml = "enabled: true\nmax_lst_size: 8\n";
        let err = from_yaml_str(yaml, UnusedKeyPolicy::Fail).unwrap_err();
        assert!(err.to_string().contains("CONFIG_UNUSED_KEYS"));
        assert!(err.to_string().contains("/max_lst_size"));
    }

    #[test]
    fn unused_key_tolerated_under_warn_policy() {
        let yaml = "enabled: true\nextra: 1\n";
        let loaded = from_yaml_str(yaml, UnusedKeyPolicy::Warn).unwrap();
        assert!(loaded.config.enabled);
    }

    #[test]
    fn zero_list_size_rejected() {
        let err = from_yaml_str("max_list_size: 0\n", UnusedKeyPolicy::Fail).unwrap_err();
        assert!(err.to_string().contains("max_list_size"));
    }

    #[test]
    fn fingerprint_is_stable_across_equivalent_documents() {
        let explicit = from_yaml_str(
            "enabled: true\nmax_list_size: 100\nentry_timeout_ticks: 500\n",
            UnusedKeyPolicy::Fail,
        )
        .unwrap();
        let implicit = from_yaml_str("{}", UnusedKeyPolicy::Fail).unwrap();
        assert_eq!(explicit.config_hash, implicit.config_hash);
        assert_eq!(explicit.config_hash.len(), 64);
    }
}
