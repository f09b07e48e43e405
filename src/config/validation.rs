//! Config validation: unknown-key detection with Levenshtein suggestions
//! and operational range checks.
//!
//! The raw file is parsed into a `toml::Value` first and its key paths are
//! compared with those of the serialized defaults. Unknown keys only warn;
//! serde still decides what loads.

use std::collections::BTreeSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Optional fields that are skipped when unset and so never appear in the
/// serialized defaults.
const OPTIONAL_KEYS: &[&str] = &["database.compose_file"];

/// Every valid dotted key path, read off the serialized defaults.
///
/// Array-of-tables entries contribute their field names without an index,
/// so `[[network.mirrors]]` yields `network.mirrors.url` and friends.
pub fn known_config_keys() -> BTreeSet<String> {
    let mut keys: BTreeSet<String> = OPTIONAL_KEYS.iter().map(ToString::to_string).collect();
    match toml::Value::try_from(super::WardenConfig::default()) {
        Ok(defaults) => keys.extend(walk_toml_keys(&defaults, "")),
        Err(e) => tracing::warn!(error = %e, "Could not derive known config keys"),
    }
    keys
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Dotted paths of every key under `value`, parents before children.
///
/// `{ a = { b = 1 }, c = [{ d = 2 }] }` yields `a`, `a.b`, `c`, `c.d`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut out = Vec::new();
    collect_keys(value, prefix, &mut out);
    out
}

fn collect_keys(value: &toml::Value, prefix: &str, out: &mut Vec<String>) {
    match value {
        toml::Value::Table(table) => {
            for (key, child) in table {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                out.push(path.clone());
                collect_keys(child, &path, out);
            }
        }
        toml::Value::Array(items) => {
            for item in items.iter().filter(|item| item.is_table()) {
                collect_keys(item, prefix, out);
            }
        }
        _ => {}
    }
}

// ============================================================================
// Edit Distance
// ============================================================================

/// Keys further than this from every known key get no suggestion.
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Levenshtein distance over chars, one row at a time.
fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitute = diagonal + usize::from(ca != cb);
            diagonal = row[j + 1];
            row[j + 1] = substitute.min(row[j] + 1).min(diagonal + 1);
        }
    }
    row[b.len()]
}

/// Closest known key within `MAX_SUGGESTION_DISTANCE`; ties go to the
/// alphabetically first key.
pub fn suggest_correction(unknown: &str, known: &BTreeSet<String>) -> Option<String> {
    known
        .iter()
        .map(|key| (levenshtein(unknown, key), key))
        .filter(|(distance, _)| *distance <= MAX_SUGGESTION_DISTANCE)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, key)| key.clone())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Warnings for keys in `raw_toml` that no config field reads.
///
/// Unparseable input yields nothing here; serde reports it with context.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let Ok(value) = raw_toml.parse::<toml::Value>() else {
        return Vec::new();
    };
    let known = known_config_keys();

    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key))
        .map(|key| ValidationWarning {
            message: format!("Unknown config key '{key}'"),
            suggestion: suggest_correction(&key, &known),
            field: key,
        })
        .collect()
}

// ============================================================================
// Operational Range Validation
// ============================================================================

/// Flag values that are legal but likely to misbehave in operation.
///
/// Hard errors live in `WardenConfig::validate`; these only warn.
pub fn validate_operational_ranges(config: &super::WardenConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let timeout = config.network.probe_timeout_secs;
    if !(1..=10).contains(&timeout) {
        warnings.push(ValidationWarning {
            field: "network.probe_timeout_secs".to_string(),
            message: format!(
                "probe_timeout_secs = {timeout} is outside the typical range (1-10 s); a hung probe can stall the tick"
            ),
            suggestion: None,
        });
    }

    let threshold = config.monitor.failure_threshold;
    if threshold > 10 {
        warnings.push(ValidationWarning {
            field: "monitor.failure_threshold".to_string(),
            message: format!(
                "failure_threshold = {threshold} delays repair by more than {} minutes",
                u64::from(threshold) * config.monitor.interval_secs / 60
            ),
            suggestion: None,
        });
    }

    if config.network.mirrors.is_empty() {
        warnings.push(ValidationWarning {
            field: "network.mirrors".to_string(),
            message: "no registry mirrors configured; daemon repair will write an empty mirror list".to_string(),
            suggestion: None,
        });
    }

    if config.database.plugin_denylist.iter().any(|p| p.trim().is_empty()) {
        warnings.push(ValidationWarning {
            field: "database.plugin_denylist".to_string(),
            message: "plugin_denylist contains an empty entry".to_string(),
            suggestion: None,
        });
    }

    warnings
}

// ============================================================================
// Tests
// ============================================================================
