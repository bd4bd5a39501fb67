//! Configuration loader for wasihash.
//!
//! Reads `wasihash.toml` and deserializes it into [`HasherConfig`]. Falls back
//! to defaults when the file is missing or malformed.

use std::path::{Path, PathBuf};

use wasihash_types::config::HasherConfig;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "WASIHASH_CONFIG";

/// Environment variable overriding `module_path`.
pub const MODULE_ENV: &str = "WASIHASH_MODULE";

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "wasihash.toml";

/// Load configuration from `path`.
///
/// - If the file does not exist, returns [`HasherConfig::default()`].
/// - If the file exists but fails to read or parse, logs a warning and
///   returns the default.
/// - Otherwise returns the parsed config.
pub async fn load_config(path: &Path) -> HasherConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            return HasherConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return HasherConfig::default();
        }
    };

    match toml::from_str::<HasherConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            HasherConfig::default()
        }
    }
}

/// Load configuration as directed by the environment.
///
/// The file named by `WASIHASH_CONFIG` (else `wasihash.toml`) is loaded, then
/// `WASIHASH_MODULE` overrides the module path if set.
pub async fn load_config_from_env() -> HasherConfig {
    let path = std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut config = load_config(&path).await;
    if let Some(module) = std::env::var_os(MODULE_ENV) {
        config.module_path = PathBuf::from(module);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("wasihash.toml")).await;
        assert_eq!(config, HasherConfig::default());
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("wasihash.toml");
        tokio::fs::write(
            &config_path,
            r#"
module_path = "/opt/wasihash/blake3.wasm"
module_dir = "/var/tmp/wasihash"
timeout_ms = 2500
"#,
        )
        .await
        .unwrap();

        let config = load_config(&config_path).await;
        assert_eq!(config.module_path, PathBuf::from("/opt/wasihash/blake3.wasm"));
        assert_eq!(config.module_dir, Some(PathBuf::from("/var/tmp/wasihash")));
        assert_eq!(config.timeout_ms, 2_500);
        assert_eq!(config.input_mount, "/input");
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("wasihash.toml");
        tokio::fs::write(&config_path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(&config_path).await;
        assert_eq!(config, HasherConfig::default());
    }

    #[tokio::test]
    async fn load_config_wrong_types_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("wasihash.toml");
        tokio::fs::write(&config_path, "timeout_ms = \"soon\"")
            .await
            .unwrap();

        let config = load_config(&config_path).await;
        assert_eq!(config.timeout_ms, HasherConfig::default().timeout_ms);
    }
}
