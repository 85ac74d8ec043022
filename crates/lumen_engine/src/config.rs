//! Application configuration: TOML on disk, sensible defaults in code

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Compiled SPIR-V paths for each pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub simple_vert: PathBuf,
    pub simple_frag: PathBuf,
    pub texture_vert: PathBuf,
    pub texture_frag: PathBuf,
    pub point_light_vert: PathBuf,
    pub point_light_frag: PathBuf,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            simple_vert: PathBuf::from("shaders/simple.vert.spv"),
            simple_frag: PathBuf::from("shaders/simple.frag.spv"),
            texture_vert: PathBuf::from("shaders/textured.vert.spv"),
            texture_frag: PathBuf::from("shaders/textured.frag.spv"),
            point_light_vert: PathBuf::from("shaders/point_light.vert.spv"),
            point_light_frag: PathBuf::from("shaders/point_light.frag.spv"),
        }
    }
}

impl ShaderConfig {
    /// Rebase relative shader paths onto `base`; absolute paths are kept
    pub fn resolved_against(&self, base: &Path) -> Self {
        let resolve = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                base.join(p)
            }
        };
        Self {
            simple_vert: resolve(&self.simple_vert),
            simple_frag: resolve(&self.simple_frag),
            texture_vert: resolve(&self.texture_vert),
            texture_frag: resolve(&self.texture_frag),
            point_light_vert: resolve(&self.point_light_vert),
            point_light_frag: resolve(&self.point_light_frag),
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub application_name: String,
    pub window_width: u32,
    pub window_height: u32,
    pub shaders: ShaderConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            application_name: "Lumen Engine".to_string(),
            window_width: 1280,
            window_height: 720,
            shaders: ShaderConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML config file. Missing keys take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(ConfigError::Io(_)) => {
                log::info!("No config at {:?}, using defaults", path.as_ref());
                Self::default()
            }
            Err(e) => {
                log::warn!("Invalid config at {:?} ({}), using defaults", path.as_ref(), e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_reasonable() {
        let config = EngineConfig::default();
        assert_eq!(config.window_width, 1280);
        assert_eq!(config.window_height, 720);
        assert!(config.shaders.simple_vert.ends_with("simple.vert.spv"));
    }

    #[test]
    fn partial_toml_keeps_defaults_for_missing_keys() {
        let config: EngineConfig = toml::from_str(
            r#"
            application_name = "Demo"
            window_width = 640

            [shaders]
            simple_vert = "custom/simple.vert.spv"
            "#,
        )
        .unwrap();

        assert_eq!(config.application_name, "Demo");
        assert_eq!(config.window_width, 640);
        assert_eq!(config.window_height, 720);
        assert_eq!(config.shaders.simple_vert, PathBuf::from("custom/simple.vert.spv"));
        assert!(config.shaders.simple_frag.ends_with("simple.frag.spv"));
    }

    #[test]
    fn relative_paths_rebase_and_absolute_paths_stay() {
        let mut shaders = ShaderConfig::default();
        shaders.simple_vert = PathBuf::from("/abs/simple.vert.spv");
        let resolved = shaders.resolved_against(Path::new("/opt/app"));

        assert_eq!(resolved.simple_vert, PathBuf::from("/abs/simple.vert.spv"));
        assert_eq!(resolved.simple_frag, PathBuf::from("/opt/app/shaders/simple.frag.spv"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = EngineConfig::load_or_default("/nonexistent/lumen.toml");
        assert_eq!(config.application_name, "Lumen Engine");
    }
}
