use std::path::Path;

use config::ConfigError;
use serde::de::DeserializeOwned;

use crate::environment::Environment;

/// Directory containing configuration files relative to application root.
const CONFIGURATION_DIR: &str = "configuration";

/// Base configuration file loaded for all environments.
const BASE_CONFIG_FILE: &str = "base.yaml";

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "APP";

/// Separator between environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
///
/// Example: `APP_LOGGER__LEVEL` sets the `logger.level` field.
const ENV_SEPARATOR: &str = "__";

/// Loads hierarchical configuration from the `configuration` directory of the current
/// working directory, for the environment named by `APP_ENVIRONMENT`.
///
/// See [`load_config_from`] for the layering rules.
pub fn load_config<T>() -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let base_path = std::env::current_dir().map_err(|err| {
        ConfigError::Message(format!("failed to determine the current directory: {err}"))
    })?;

    let environment = Environment::load()
        .map_err(|err| ConfigError::Message(format!("failed to parse APP_ENVIRONMENT: {err}")))?;

    load_config_from(&base_path.join(CONFIGURATION_DIR), environment)
}

/// Loads hierarchical configuration from YAML files and environment variables.
///
/// Loads configuration in this order:
/// 1. Base configuration from `{directory}/base.yaml`
/// 2. Environment-specific file from `{directory}/{environment}.yaml`, when present
/// 3. Environment variable overrides prefixed with `APP`
///
/// Nested keys use double underscores: `APP_LOGGER__PATH` → `logger.path`.
pub fn load_config_from<T>(directory: &Path, environment: Environment) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let environment_filename = format!("{environment}.yaml");

    let environment_source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR)
        // Numbers and booleans such as `APP_LOGGER__ROTATION__COMPRESS=false` keep their type.
        .try_parsing(true);

    let settings = config::Config::builder()
        .add_source(config::File::from(directory.join(BASE_CONFIG_FILE)))
        .add_source(config::File::from(directory.join(environment_filename)).required(false))
        // E.g. `APP_LOGGER__LEVEL=debug` sets `Settings { logger: LoggerConfig { level } }`.
        .add_source(environment_source)
        .build()?;

    settings.try_deserialize::<T>()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde::Deserialize;

    use crate::{Environment, LoggerConfig, load_config_from};

    #[derive(Debug, Deserialize)]
    struct Settings {
        logger: LoggerConfig,
    }

    #[derive(Debug, Deserialize)]
    struct OverrideSettings {
        override_target: OverrideTarget,
    }

    #[derive(Debug, Deserialize)]
    struct OverrideTarget {
        value: String,
        retries: u32,
    }

    #[test]
    fn environment_file_overrides_base() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("base.yaml"),
            "logger:\n  path: /var/log/app/app.log\n  level: info\n",
        )
        .unwrap();
        fs::write(dir.path().join("dev.yaml"), "logger:\n  level: debug\n").unwrap();

        let settings: Settings = load_config_from(dir.path(), Environment::Dev).unwrap();

        assert_eq!(settings.logger.path.to_str(), Some("/var/log/app/app.log"));
        assert_eq!(settings.logger.level, "debug");
        assert_eq!(settings.logger.rotation.max_backups, 30);
    }

    #[test]
    fn missing_environment_file_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("base.yaml"),
            "logger:\n  path: app.log\n  rotation:\n    max_size_bytes: 1024\n    max_backups: 2\n    compress: false\n",
        )
        .unwrap();

        let settings: Settings = load_config_from(dir.path(), Environment::Prod).unwrap();

        assert_eq!(settings.logger.level, "");
        assert_eq!(settings.logger.rotation.max_size_bytes, 1024);
        assert_eq!(settings.logger.rotation.max_backups, 2);
        assert!(!settings.logger.rotation.compress);
    }

    #[test]
    fn missing_base_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();

        assert!(load_config_from::<Settings>(dir.path(), Environment::Prod).is_err());
    }

    #[test]
    fn environment_variables_override_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("base.yaml"),
            "override_target:\n  value: from-file\n  retries: 1\n",
        )
        .unwrap();

        unsafe {
            std::env::set_var("APP_OVERRIDE_TARGET__VALUE", "from-env");
            std::env::set_var("APP_OVERRIDE_TARGET__RETRIES", "5");
        }
        let settings: OverrideSettings = load_config_from(dir.path(), Environment::Prod).unwrap();
        unsafe {
            std::env::remove_var("APP_OVERRIDE_TARGET__VALUE");
            std::env::remove_var("APP_OVERRIDE_TARGET__RETRIES");
        }

        assert_eq!(settings.override_target.value, "from-env");
        assert_eq!(settings.override_target.retries, 5);
    }
}
