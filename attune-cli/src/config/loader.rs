use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use attune_core::AttuneConfig;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration.
    ///
    /// An explicit path replaces both layers and must exist. Otherwise the
    /// user layer is read first and the project layer overrides it.
    pub fn load(explicit: Option<&Path>) -> Result<AttuneConfig> {
        if let Some(path) = explicit {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            return Self::load_layers(&[path.to_path_buf()]);
        }

        let mut layers = Vec::new();
        if let Some(user_path) = Self::user_config_path() {
            layers.push(user_path);
        }
        layers.push(Self::project_config_path());
        Self::load_layers(&layers)
    }

    /// Deep-merge the given files in order. Missing files are skipped.
    pub fn load_layers(paths: &[PathBuf]) -> Result<AttuneConfig> {
        let mut merged = toml::Table::new();

        for path in paths.iter().filter(|p| p.exists()) {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let layer: toml::Table = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            tracing::debug!(path = %path.display(), "Loaded config layer");
            merge_tables(&mut merged, layer);
        }

        toml::Value::Table(merged)
            .try_into()
            .context("Invalid configuration")
    }

    /// Get user config path (`$XDG_CONFIG_HOME/attune/config.toml` or platform equivalent)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("attune").join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with ATTUNE_PROJECT_CONFIG_DIR env var (useful for isolated tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("ATTUNE_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".attune/config.toml")
        }
    }
}

/// Overlay `overlay` onto `base`. Tables merge key by key; anything else replaces.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(incoming) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge_tables(existing, incoming);
                    continue;
                }
                base.insert(key, toml::Value::Table(incoming));
            }
            value => {
                base.insert(key, value);
            }
        }
    }
}
