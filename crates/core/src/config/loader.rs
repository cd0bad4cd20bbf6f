use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::{Path, PathBuf};

use super::{types::Config, validate::validate_config, ConfigError};

/// Environment variables with this prefix override file values.
/// Nested keys are separated by `__`, e.g. `MARGINALIA_TMDB__API_KEY`.
pub const ENV_PREFIX: &str = "MARGINALIA_";

/// Cover cache directory name used when `covers.use_cache` is set without a
/// `covers.cache_dir`.
pub const COVER_CACHE_DIR: &str = "covers";

/// Load, resolve and validate the configuration at `path`.
///
/// Layers, lowest first: built-in defaults, the TOML file, `MARGINALIA_*`
/// environment variables. Relative cache locations are taken relative to
/// the file's directory so a run works from any working directory.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let mut config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    if let Some(base) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        anchor(&mut config.cache.path, base);
        if let Some(dir) = config.covers.cache_dir.as_mut() {
            anchor(dir, base);
        }
    }

    finish(config)
}

/// Parse and validate a TOML document, without environment overrides.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    finish(config)
}

fn finish(mut config: Config) -> Result<Config, ConfigError> {
    if config.covers.use_cache && config.covers.cache_dir.is_none() {
        config.covers.cache_dir = Some(default_cover_cache_dir(&config.cache.path));
    }

    validate_config(&config)?;
    Ok(config)
}

/// `covers/` beside the response cache database.
fn default_cover_cache_dir(cache_path: &Path) -> PathBuf {
    match cache_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(COVER_CACHE_DIR),
        _ => PathBuf::from(COVER_CACHE_DIR),
    }
}

fn anchor(path: &mut PathBuf, base: &Path) {
    if path.is_relative() {
        *path = base.join(&*path);
    }
}
