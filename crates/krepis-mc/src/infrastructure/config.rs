//! Configuration loading

use crate::domain::config::ExplorerConfig;
use crate::domain::error::ConfigError;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Read and validate an [`ExplorerConfig`] from a JSON file
///
/// Missing fields take their defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<ExplorerConfig, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config = parse_config(&text)?;
    debug!(path = %path.display(), ?config, "configuration loaded");
    Ok(config)
}

/// Parse and validate an [`ExplorerConfig`] from JSON text
pub fn parse_config(text: &str) -> Result<ExplorerConfig, ConfigError> {
    let config: ExplorerConfig = serde_json::from_str(text)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::Randomization;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "core": {{ "randomization": {{ "policy": "fixed_seed", "seed": 3 }} }} }}"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.core.randomization, Randomization::FixedSeed(3));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = parse_config(r#"{ "search": { "max_states": 0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "max_states", .. }));
        assert!(matches!(parse_config("{"), Err(ConfigError::Parse(_))));
    }
}
