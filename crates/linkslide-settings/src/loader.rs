//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`LinkSlideSettings::default()`]
//! 2. If a settings file exists, deep-merge its values over the defaults
//! 3. Apply `LINKSLIDE_*` environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::LinkSlideSettings;

/// Default settings file, relative to the working directory.
pub fn settings_path() -> PathBuf {
    PathBuf::from("config.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<LinkSlideSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<LinkSlideSettings> {
    let defaults = serde_json::to_value(LinkSlideSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: LinkSlideSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply process environment overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut LinkSlideSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Integers must parse and fall within range; invalid values are ignored
/// with a warning and the file/default value is kept.
pub fn apply_overrides_from<F>(settings: &mut LinkSlideSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("LINKSLIDE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("LINKSLIDE_PORT", 1, 65535) {
        settings.server.port = v;
    }

    // ── Output ──────────────────────────────────────────────────────
    if let Some(v) = env.string("LINKSLIDE_OUTPUT_DIR") {
        settings.output.root_dir = v;
    }
    if let Some(v) = env.string("LINKSLIDE_PUBLIC_PREFIX") {
        settings.output.public_prefix = v;
    }

    // ── LLM ─────────────────────────────────────────────────────────
    if let Some(v) = env.string("LINKSLIDE_LLM_BASE_URL") {
        settings.llm.base_url = v;
    }
    if let Some(v) = env.string("LINKSLIDE_LLM_API_KEY") {
        settings.llm.api_key = v;
    }
    if let Some(v) = env.string("LINKSLIDE_LLM_MODEL") {
        settings.llm.model_id = v;
    }
    if let Some(v) = env.u64("LINKSLIDE_MAX_TURNS", 1, 500) {
        settings.llm.max_turns = v as u32;
    }

    // ── Search ──────────────────────────────────────────────────────
    if let Some(v) = env.string("LINKSLIDE_SEARCH_URL") {
        settings.search.url = Some(v);
    }
    if let Some(v) = env.string("LINKSLIDE_SEARCH_API_KEY") {
        settings.search.api_key = Some(v);
    }

    // ── Image backends ──────────────────────────────────────────────
    if let Some(v) = env.string("LINKSLIDE_IMAGE_BASE_URL") {
        settings.image_standard.base_url = v;
    }
    if let Some(v) = env.string("LINKSLIDE_IMAGE_API_KEY") {
        settings.image_standard.api_key = v;
    }
    if let Some(v) = env.string("LINKSLIDE_IMAGE_PRO_BASE_URL") {
        settings.image_pro.base_url = v;
    }
    if let Some(v) = env.string("LINKSLIDE_IMAGE_PRO_API_KEY") {
        settings.image_pro.api_key = v;
    }

    // ── Job policy ──────────────────────────────────────────────────
    if let Some(v) = env.u64("LINKSLIDE_JOB_MAX_ATTEMPTS", 1, 20) {
        settings.job.max_attempts = v as u32;
    }
    if let Some(v) = env.u64("LINKSLIDE_JOB_MAX_POLLS", 1, 10_000) {
        settings.job.max_polls = v as u32;
    }
    if let Some(v) = env.u64("LINKSLIDE_JOB_POLL_INTERVAL_SECS", 1, 600) {
        settings.job.poll_interval_secs = v;
    }
}

/// Reject settings no component can run with.
pub fn validate(settings: &LinkSlideSettings) -> Result<()> {
    for (section, image) in [
        ("image_standard", &settings.image_standard),
        ("image_pro", &settings.image_pro),
    ] {
        if parse_size(&image.size).is_none() {
            return Err(SettingsError::InvalidValue(format!(
                "{section}.size must look like 1600x900, got {:?}",
                image.size
            )));
        }
    }
    if settings.llm.max_turns == 0 {
        return Err(SettingsError::InvalidValue(
            "llm.max_turns must be at least 1".into(),
        ));
    }
    Ok(())
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a `WIDTHxHEIGHT` size string.
pub fn parse_size(val: &str) -> Option<(u32, u32)> {
    let (w, h) = val.split_once(['x', 'X'])?;
    let w: u32 = w.trim().parse().ok()?;
    let h: u32 = h.trim().parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

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

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        let val = (self.lookup)(name)?;
        let result = parse_u16_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u16 env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }
}
