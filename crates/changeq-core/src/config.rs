//! Queue configuration.
//!
//! Values are clamped on every update so that no input can disable the
//! concurrency cap or the retry bounds. `warn_length` is the exception:
//! zero or negative is the documented "backpressure warnings off" state.

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_CONCURRENCY: usize = 2;
pub const DEFAULT_BASE_DELAY_MS: u64 = 250;
pub const DEFAULT_MAX_DELAY_MS: u64 = 5_000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_WARN_LENGTH: i64 = 50;

/// Effective engine parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum simultaneously executing tasks (>= 1).
    pub concurrency: usize,
    /// First backoff delay (>= 1).
    pub base_delay_ms: u64,
    /// Backoff ceiling (>= 1).
    pub max_delay_ms: u64,
    /// Re-queues allowed per task before it is dropped (>= 1).
    pub max_retries: u32,
    /// Queue depth that raises a backpressure warning; `<= 0` disables it.
    pub warn_length: i64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            warn_length: DEFAULT_WARN_LENGTH,
        }
    }
}

/// Partial configuration; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub concurrency: Option<usize>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub warn_length: Option<i64>,
}

impl QueueConfig {
    /// Merge `patch` over the current values, then clamp.
    pub fn apply(&mut self, patch: &ConfigPatch) {
        if let Some(v) = patch.concurrency {
            self.concurrency = v;
        }
        if let Some(v) = patch.base_delay_ms {
            self.base_delay_ms = v;
        }
        if let Some(v) = patch.max_delay_ms {
            self.max_delay_ms = v;
        }
        if let Some(v) = patch.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = patch.warn_length {
            self.warn_length = v;
        }
        self.clamp();
    }

    /// Force every bounded field to its minimum.
    pub fn clamp(&mut self) {
        self.concurrency = self.concurrency.max(1);
        self.base_delay_ms = self.base_delay_ms.max(1);
        self.max_delay_ms = self.max_delay_ms.max(1);
        self.max_retries = self.max_retries.max(1);
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Backpressure threshold, or `None` when warnings are disabled.
    pub fn warn_threshold(&self) -> Option<usize> {
        usize::try_from(self.warn_length).ok().filter(|n| *n > 0)
    }

    /// Load from `CHANGEQ_*` environment variables over the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let patch = ConfigPatch {
            concurrency: setting(&lookup, "CHANGEQ_CONCURRENCY"),
            base_delay_ms: setting(&lookup, "CHANGEQ_BASE_DELAY_MS"),
            max_delay_ms: setting(&lookup, "CHANGEQ_MAX_DELAY_MS"),
            max_retries: setting(&lookup, "CHANGEQ_MAX_RETRIES"),
            warn_length: setting(&lookup, "CHANGEQ_WARN_LENGTH"),
        };
        let mut config = Self::default();
        config.apply(&patch);
        config
    }
}

/// Read and parse one environment variable. Unparsable values are logged
/// and treated as unset.
pub fn env_value<T: std::str::FromStr>(key: &str) -> Option<T> {
    setting(&|k: &str| std::env::var(k).ok(), key)
}

fn setting<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable queue setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn patch_clamps_to_minimums() {
        let mut config = QueueConfig::default();
        config.apply(&ConfigPatch {
            concurrency: Some(0),
            base_delay_ms: Some(0),
            max_delay_ms: Some(1),
            max_retries: Some(0),
            warn_length: None,
        });

        assert_eq!(config.concurrency, 1);
        assert_eq!(config.base_delay_ms, 1);
        assert_eq!(config.max_delay_ms, 1);
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.warn_length, DEFAULT_WARN_LENGTH);
    }

    #[test]
    fn empty_patch_keeps_values() {
        let mut config = QueueConfig {
            concurrency: 8,
            base_delay_ms: 10,
            max_delay_ms: 100,
            max_retries: 5,
            warn_length: 3,
        };
        let before = config.clone();
        config.apply(&ConfigPatch::default());
        assert_eq!(config, before);
    }

    #[rstest]
    #[case(0, None)]
    #[case(-5, None)]
    #[case(1, Some(1))]
    #[case(25, Some(25))]
    fn warn_length_passes_through_unclamped(#[case] warn: i64, #[case] expected: Option<usize>) {
        let mut config = QueueConfig::default();
        config.apply(&ConfigPatch {
            warn_length: Some(warn),
            ..ConfigPatch::default()
        });
        assert_eq!(config.warn_length, warn);
        assert_eq!(config.warn_threshold(), expected);
    }

    #[test]
    fn patch_deserializes_from_partial_json() {
        let patch: ConfigPatch =
            serde_json::from_value(serde_json::json!({"concurrency": 4})).unwrap();
        assert_eq!(patch.concurrency, Some(4));
        assert_eq!(patch.max_retries, None);
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: std::collections::HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn lookup_without_variables_yields_defaults() {
        assert_eq!(QueueConfig::from_lookup(vars(&[])), QueueConfig::default());
    }

    #[test]
    fn lookup_parses_clamps_and_skips_garbage() {
        let config = QueueConfig::from_lookup(vars(&[
            ("CHANGEQ_CONCURRENCY", "0"),
            ("CHANGEQ_BASE_DELAY_MS", " 40 "),
            ("CHANGEQ_MAX_DELAY_MS", "soon"),
            ("CHANGEQ_MAX_RETRIES", "-1"),
            ("CHANGEQ_WARN_LENGTH", "-3"),
        ]));

        assert_eq!(config.concurrency, 1);
        assert_eq!(config.base_delay_ms, 40);
        assert_eq!(config.max_delay_ms, DEFAULT_MAX_DELAY_MS);
        // u32 に負数は入らない -> 既定値
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.warn_length, -3);
        assert_eq!(config.warn_threshold(), None);
    }

    #[test]
    fn from_env_reads_process_environment() {
        // このテスト以外は CHANGEQ_* を触らない
        unsafe {
            std::env::set_var("CHANGEQ_CONCURRENCY", "0");
            std::env::set_var("CHANGEQ_MAX_RETRIES", "7");
            std::env::set_var("CHANGEQ_WARN_LENGTH", "many");
        }

        let config = QueueConfig::from_env();

        unsafe {
            std::env::remove_var("CHANGEQ_CONCURRENCY");
            std::env::remove_var("CHANGEQ_MAX_RETRIES");
            std::env::remove_var("CHANGEQ_WARN_LENGTH");
        }
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.max_retries, 7);
        assert_eq!(config.warn_length, DEFAULT_WARN_LENGTH);
        assert_eq!(config.base_delay_ms, DEFAULT_BASE_DELAY_MS);
    }
}
