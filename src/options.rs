//! Runtime configuration for the factory (spec §6), split into an in-memory
//! `Options` and a `serde`-deserializable `TomlOptions` file form, following
//! the teacher's `DataStream`/`TomlDataStream` pattern of a runtime struct
//! with real `Duration`s next to a TOML-friendly struct with plain integer
//! fields and an explicit conversion.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Runtime factory configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Contexts idle longer than this are expired on the periodic tick.
    pub context_expiration: Duration,
    /// When true, `attach` aggressively trims a context's position buffer.
    pub minify_memory_pressure: bool,
    /// Whether `AerotowProbe` has neighbour data available to consult.
    pub nearby_runtime: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            context_expiration: Duration::from_secs(5 * 60),
            minify_memory_pressure: false,
            nearby_runtime: false,
        }
    }
}

/// TOML file form of `Options` — human units, serde-friendly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TomlOptions {
    #[serde(default = "default_context_expiration_secs")]
    pub context_expiration_secs: u64,
    #[serde(default)]
    pub minify_memory_pressure: bool,
    #[serde(default)]
    pub nearby_runtime: bool,
}

fn default_context_expiration_secs() -> u64 {
    5 * 60
}

impl Default for TomlOptions {
    fn default() -> Self {
        Self {
            context_expiration_secs: default_context_expiration_secs(),
            minify_memory_pressure: false,
            nearby_runtime: false,
        }
    }
}

impl TomlOptions {
    pub fn into_options(self) -> Options {
        Options {
            context_expiration: Duration::from_secs(self.context_expiration_secs),
            minify_memory_pressure: self.minify_memory_pressure,
            nearby_runtime: self.nearby_runtime,
        }
    }
}

impl From<TomlOptions> for Options {
    fn from(t: TomlOptions) -> Self {
        t.into_options()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_options_default_matches_options_default() {
        let from_toml = TomlOptions::default().into_options();
        assert_eq!(from_toml, Options::default());
    }

    #[test]
    fn parses_minimal_toml() {
        let parsed: TomlOptions = toml::from_str("context_expiration_secs = 120").unwrap();
        assert_eq!(parsed.context_expiration_secs, 120);
        assert!(!parsed.minify_memory_pressure);
        assert!(!parsed.nearby_runtime);
    }
}
