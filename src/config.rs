//! Compiler configuration
//!
//! Read from an optional `baryon.json` in the working directory. Command
//! line flags override every field.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the configuration file looked up by [`CompilerConfig::discover`].
pub const CONFIG_FILE: &str = "baryon.json";

/// Settings for `baryon build`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Target language when `--lang` is not given (default: r)
    pub default_language: String,

    /// Directory for generated files when `--output` is not given
    pub output_dir: Option<PathBuf>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            default_language: "r".to_string(),
            output_dir: None,
        }
    }
}

impl CompilerConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: CompilerConfig = serde_json::from_slice(&data)
            .with_context(|| format!("Failed to deserialize config: {:?}", path))?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load `baryon.json` from `dir` if present, the defaults otherwise.
    pub fn discover(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Where `build` writes the output for `input` when no path is given:
    /// the input with the backend extension, moved into `output_dir` when
    /// one is configured.
    pub fn output_path(&self, input: &Path, extension: &str) -> PathBuf {
        let renamed = input.with_extension(extension);
        match (&self.output_dir, renamed.file_name()) {
            (Some(dir), Some(name)) => dir.join(name),
            _ => renamed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_discover_without_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = CompilerConfig::discover(temp.path()).unwrap();
        assert_eq!(config, CompilerConfig::default());
        assert_eq!(config.default_language, "r");
    }

    #[test]
    fn test_discover_reads_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join(CONFIG_FILE),
            r#"{ "default_language": "python", "output_dir": "build" }"#,
        )
        .unwrap();

        let config = CompilerConfig::discover(temp.path()).unwrap();
        assert_eq!(config.default_language, "python");
        assert_eq!(config.output_dir, Some(PathBuf::from("build")));
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("partial.json");
        std::fs::write(&path, r#"{ "output_dir": "out" }"#).unwrap();

        let config = CompilerConfig::load(&path).unwrap();
        assert_eq!(config.default_language, "r");
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE);
        std::fs::write(&path, "{ not json").unwrap();

        let err = CompilerConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to deserialize config"));
    }

    #[test]
    fn test_output_path() {
        let mut config = CompilerConfig::default();
        assert_eq!(
            config.output_path(Path::new("tools/align.bala"), "sh"),
            PathBuf::from("tools/align.sh")
        );

        config.output_dir = Some(PathBuf::from("dist"));
        assert_eq!(
            config.output_path(Path::new("tools/align.bala"), "R"),
            PathBuf::from("dist/align.R")
        );
    }
}
