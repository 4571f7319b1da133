//! Locating and loading the application configuration.

use anyhow::{Context, Result};
use sf_core::config::Config;
use std::path::Path;

/// Locations searched, in order, when no `--config` is given.
pub const DEFAULT_CONFIG_PATHS: [&str; 2] =
    ["./storyforge.toml", "~/.config/storyforge/config.toml"];

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let config =
        Config::load(path).with_context(|| format!("Failed to load config file: {:?}", path))?;

    for warning in config.validate() {
        tracing::warn!("{}: {}", path.display(), warning);
    }

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    for path_str in DEFAULT_CONFIG_PATHS {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {}", path.display());
            return load_config(path);
        }
    }

    tracing::debug!("No config file found, using defaults");
    Ok(Config::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_must_exist() {
        let err = load_config_or_default(Some(Path::new("/nonexistent/storyforge.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to load config file"));
    }

    #[test]
    fn loads_provider_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storyforge.toml");
        std::fs::write(
            &path,
            r#"
output_dir = "/tmp/renders"

[pipeline]
confirm_threshold = 2.5

[providers.text_to_image]
endpoint = "http://localhost:9000/t2i"
api_key_env = "T2I_KEY"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.output_dir, Path::new("/tmp/renders"));
        assert_eq!(config.pipeline.confirm_threshold, 2.5);
        let provider = &config.providers[&sf_core::StepType::TextToImage];
        assert_eq!(provider.api_key_env.as_deref(), Some("T2I_KEY"));
        assert!(provider.download_outputs);
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "output_dir = [").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("config parse error"));
    }
}
