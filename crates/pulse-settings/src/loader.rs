//! Layered settings loading.
//!
//! Compiled defaults, then the user file deep-merged on top, then `PULSE_*`
//! environment variables, then [`validate`]. In the merge, objects combine
//! key by key, any other value in the file replaces the default, and a
//! `null` in the file keeps the default.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::PulseSettings;

/// Resolve the Pulse home directory (`~/.pulse`).
pub fn pulse_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".pulse")
}

/// Resolve the path to the settings file (`~/.pulse/settings.json`).
pub fn settings_path() -> PathBuf {
    pulse_home().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<PulseSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<PulseSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Defaults deep-merged with the user file, without env overrides.
pub fn load_file_layer(path: &Path) -> Result<PulseSettings> {
    let json_err = |source| SettingsError::Json {
        path: path.to_path_buf(),
        source,
    };
    let defaults = serde_json::to_value(PulseSettings::default()).map_err(json_err)?;

    let merged = if path.exists() {
        debug!(path = %path.display(), "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content).map_err(json_err)?;
        deep_merge(defaults, user)
    } else {
        debug!(path = %path.display(), "no settings file, using defaults");
        defaults
    };

    serde_json::from_value(merged).map_err(json_err)
}

/// Merge `overlay` into `base` following the rules in the module docs.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut merged), Value::Object(overlay)) => {
            for (key, value) in overlay.into_iter().filter(|(_, v)| !v.is_null()) {
                let next = match merged.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                let _ = merged.insert(key, next);
            }
            Value::Object(merged)
        }
        (_, overlay) => overlay,
    }
}

/// Check cross-field constraints that serde cannot express.
pub fn validate(settings: &PulseSettings) -> Result<()> {
    if settings.api.base_url.trim().is_empty() {
        return Err(SettingsError::invalid("api.baseUrl", "is empty"));
    }
    let ws = &settings.realtime.url;
    if !(ws.starts_with("ws://") || ws.starts_with("wss://")) {
        return Err(SettingsError::invalid(
            "realtime.url",
            format!("expected a ws:// or wss:// URL, got {ws}"),
        ));
    }
    if settings.realtime.reconnect_delay_ms == 0 {
        return Err(SettingsError::invalid("realtime.reconnectDelayMs", "must be positive"));
    }
    if settings.api.refresh_timeout_ms == 0 {
        return Err(SettingsError::invalid("api.refreshTimeoutMs", "must be positive"));
    }
    Ok(())
}

/// Apply process environment overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut PulseSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Numbers outside their range, unparseable booleans and empty strings are
/// ignored with a warning, leaving the file or default value in place.
pub fn apply_overrides_from<F>(settings: &mut PulseSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── API settings ────────────────────────────────────────────────
    if let Some(v) = env.string("PULSE_API_BASE_URL") {
        settings.api.base_url = v;
    }
    if let Some(v) = env.u64("PULSE_REFRESH_TIMEOUT_MS", 100, 600_000) {
        settings.api.refresh_timeout_ms = v;
    }

    // ── Realtime settings ───────────────────────────────────────────
    if let Some(v) = env.string("PULSE_WS_URL") {
        settings.realtime.url = v;
    }
    if let Some(v) = env.u64("PULSE_HEARTBEAT_MS", 0, 600_000) {
        settings.realtime.heartbeat_incoming_ms = v;
        settings.realtime.heartbeat_outgoing_ms = v;
    }
    if let Some(v) = env.u64("PULSE_RECONNECT_DELAY_MS", 100, 600_000) {
        settings.realtime.reconnect_delay_ms = v;
    }

    // ── Session settings ────────────────────────────────────────────
    if let Some(v) = env.string("PULSE_DATA_DIR") {
        settings.session.data_dir = Some(PathBuf::from(v));
    }
    if let Some(v) = env.bool("PULSE_WATCH_SESSION") {
        settings.session.watch_file = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("PULSE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("PULSE_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Parsing ─────────────────────────────────────────────────────────────────

/// Lenient boolean: `true`/`1`/`yes`/`on` and `false`/`0`/`no`/`off`, any
/// case.
pub fn parse_bool(val: &str) -> Option<bool> {
    const TRUE: [&str; 4] = ["true", "1", "yes", "on"];
    const FALSE: [&str; 4] = ["false", "0", "no", "off"];
    if TRUE.iter().any(|t| t.eq_ignore_ascii_case(val)) {
        Some(true)
    } else if FALSE.iter().any(|f| f.eq_ignore_ascii_case(val)) {
        Some(false)
    } else {
        None
    }
}

/// `u64` within `min..=max`.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    val.trim().parse().ok().filter(|n| (min..=max).contains(n))
}

// ── Env readers ─────────────────────────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "ignoring non-boolean override");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "ignoring out-of-range override");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({
            "realtime": {"url": "ws://a", "reconnectDelayMs": 5000}
        });
        let source = serde_json::json!({
            "realtime": {"reconnectDelayMs": 1000}
        });
        let merged = deep_merge(target, source);
        assert_eq!(merged["realtime"]["reconnectDelayMs"], 1000);
        assert_eq!(merged["realtime"]["url"], "ws://a");
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        let merged = deep_merge(target, source);
        assert_eq!(merged["items"], serde_json::json!([4]));
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_file_layer(Path::new("/nonexistent/settings.json")).unwrap();
        let defaults = PulseSettings::default();
        assert_eq!(settings.api.base_url, defaults.api.base_url);
        assert_eq!(settings.realtime.url, defaults.realtime.url);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"realtime": {"heartbeatIncomingMs": 10000}, "api": {"baseUrl": "https://pulse.example/api"}}"#,
        )
        .unwrap();

        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.realtime.heartbeat_incoming_ms, 10_000);
        assert_eq!(settings.realtime.heartbeat_outgoing_ms, 4_000);
        assert_eq!(settings.api.base_url, "https://pulse.example/api");
        assert_eq!(settings.api.refresh_path, "/auth/refresh-token");
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();

        let result = load_settings_from_path(&path);
        assert!(matches!(result.unwrap_err(), SettingsError::Json { .. }));
    }

    // ── validate ────────────────────────────────────────────────────

    #[test]
    fn validate_rejects_http_realtime_url() {
        let mut s = PulseSettings::default();
        s.realtime.url = "http://localhost:8080/ws".into();
        assert!(matches!(
            validate(&s),
            Err(SettingsError::InvalidValue { key: "realtime.url", .. })
        ));
    }

    #[test]
    fn validate_rejects_zero_reconnect_delay() {
        let mut s = PulseSettings::default();
        s.realtime.reconnect_delay_ms = 0;
        assert!(validate(&s).is_err());
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(validate(&PulseSettings::default()).is_ok());
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn overrides_apply() {
        let mut s = PulseSettings::default();
        apply_overrides_from(
            &mut s,
            lookup(&[
                ("PULSE_WS_URL", "wss://chat.example/ws"),
                ("PULSE_HEARTBEAT_MS", "10000"),
                ("PULSE_DATA_DIR", "/var/lib/pulse"),
                ("PULSE_LOG_JSON", "yes"),
            ]),
        );
        assert_eq!(s.realtime.url, "wss://chat.example/ws");
        assert_eq!(s.realtime.heartbeat_incoming_ms, 10_000);
        assert_eq!(s.realtime.heartbeat_outgoing_ms, 10_000);
        assert_eq!(s.session.data_dir, Some(PathBuf::from("/var/lib/pulse")));
        assert!(s.logging.json);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let mut s = PulseSettings::default();
        apply_overrides_from(
            &mut s,
            lookup(&[
                ("PULSE_RECONNECT_DELAY_MS", "5"),
                ("PULSE_REFRESH_TIMEOUT_MS", "abc"),
                ("PULSE_WATCH_SESSION", "maybe"),
                ("PULSE_API_BASE_URL", ""),
            ]),
        );
        let d = PulseSettings::default();
        assert_eq!(s.realtime.reconnect_delay_ms, d.realtime.reconnect_delay_ms);
        assert_eq!(s.api.refresh_timeout_ms, d.api.refresh_timeout_ms);
        assert_eq!(s.session.watch_file, d.session.watch_file);
        assert_eq!(s.api.base_url, d.api.base_url);
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for val in &["true", "1", "yes", "on", "TRUE"] {
            assert_eq!(parse_bool(val), Some(true), "failed for {val}");
        }
        for val in &["false", "0", "no", "off", "Off"] {
            assert_eq!(parse_bool(val), Some(false), "failed for {val}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_range("4000", 0, 600_000), Some(4000));
        assert_eq!(parse_u64_range("50", 100, 600_000), None);
        assert_eq!(parse_u64_range("700000", 100, 600_000), None);
        assert_eq!(parse_u64_range("x", 0, 10), None);
    }
}
