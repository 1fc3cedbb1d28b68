use std::path::Path;

use config::{Config, Environment, File, FileFormat, Map};
use eyre::{Context, Result};

use crate::config::models::ServerConfig;

/// Prefix of environment variables that override file settings,
/// e.g. `FORWARDER_BACKENDS__PRIMARY=https://api.example.com`.
pub const ENV_PREFIX: &str = "FORWARDER";

/// Load configuration from an optional file plus the process environment.
/// Supports multiple formats: YAML, JSON, TOML, etc.
pub async fn load_config(config_path: Option<&str>) -> Result<ServerConfig> {
    load_config_sync(config_path, None)
}

/// Load configuration synchronously.
///
/// `env_override` replaces the process environment as the variable source, which
/// keeps tests independent from whatever the host shell exports.
pub fn load_config_sync(
    config_path: Option<&str>,
    env_override: Option<Map<String, String>>,
) -> Result<ServerConfig> {
    let mut builder = Config::builder();

    if let Some(config_path) = config_path {
        let path = Path::new(config_path);
        builder = builder.add_source(
            File::new(
                path.to_str()
                    .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", path.display()))?,
                file_format(path),
            )
            .required(false),
        );
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .source(env_override),
    );

    let settings = builder.build().with_context(|| {
        format!(
            "Failed to build config from {}",
            config_path.unwrap_or("environment")
        )
    })?;

    let server_config: ServerConfig = settings.try_deserialize().with_context(|| {
        format!(
            "Failed to deserialize config from {}",
            config_path.unwrap_or("environment")
        )
    })?;

    Ok(server_config)
}

/// Determine file format based on extension
fn file_format(path: &Path) -> FileFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        _ => FileFormat::Toml,
    }
}
