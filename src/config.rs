use crate::export::ExportOptions;
use crate::render::WindowConfig;
use crate::viewer::SceneComposition;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Everything the viewer binary can be configured with. Missing fields fall
/// back to the defaults of each section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub composition: SceneComposition,
    pub export: ExportOptions,
    pub output_dir: PathBuf,
    pub window: WindowConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            composition: SceneComposition::default(),
            export: ExportOptions::compressed_glb(),
            output_dir: PathBuf::from("."),
            window: WindowConfig::default(),
        }
    }
}

impl ViewerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("[config] loaded {}", path.display());
        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.composition.model = model.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_layers_file_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{
                "composition": {{ "model": "models/bust.glb", "orbit_controls": false }},
                "export": {{ "binary": false }},
                "output_dir": "out"
            }}"#
        )
        .unwrap();

        let config = ViewerConfig::load(file.path()).expect("config loads");
        assert_eq!(config.composition.model, "models/bust.glb");
        assert!(!config.composition.orbit_controls);
        assert!(config.composition.stats);
        assert!(!config.export.binary);
        assert!(config.export.draco_options.is_some());
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.window, WindowConfig::default());
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        match ViewerConfig::load(&path) {
            Err(ConfigError::Io { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            ViewerConfig::load(file.path()),
            Err(ConfigError::Json { .. })
        ));
    }

    #[test]
    fn overrides_replace_model_and_output() {
        let config = ViewerConfig::default()
            .with_model("https://example.com/model.glb")
            .with_output_dir("exports");
        assert_eq!(config.composition.model, "https://example.com/model.glb");
        assert_eq!(config.output_dir, PathBuf::from("exports"));
    }
}
