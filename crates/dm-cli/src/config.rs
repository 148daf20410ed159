//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use dm_core::{AllocationConfig, AssTemplate};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Where subtitles go when neither the config nor the command line says.
const DEFAULT_OUTPUT_PATH: &str = "export/danmaku.ass";

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path of the subtitle file to write, relative to the working directory.
    pub output_path: PathBuf,

    /// Display window allocation settings.
    pub allocation: AllocationConfig,

    /// Header, style and text handling for the emitted file.
    pub template: AssTemplate,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("output_path", &self.output_path)
            .field("allocation", &self.allocation)
            .field("style", &self.template.style.name)
            .field("escape_text", &self.template.escape_text)
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            allocation: AllocationConfig::default(),
            template: AssTemplate::default(),
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (DMASS_*, nested keys split on `__`)
        figment = figment.merge(Env::prefixed("DMASS_").split("__"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for dmass.
///
/// On Linux: `~/.config/dmass`
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("dmass"))
}
