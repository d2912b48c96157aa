mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

use crate::similarity::MAX_DIFF;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    apply_env_overrides(&mut config);

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./crossid.toml",
        "./config.toml",
        "~/.config/crossid/config.toml",
        "/etc/crossid/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    // Return default config if no file found
    let mut config = Config::default();
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Fill missing API keys from the environment, adding an entry for a provider
/// whose key is set but which the file does not mention.
pub fn apply_env_overrides(config: &mut Config) {
    for kind in [ProviderKind::Tmdb, ProviderKind::Omdb] {
        let Some(key) = std::env::var(kind.api_key_env())
            .ok()
            .filter(|k| !k.trim().is_empty())
        else {
            continue;
        };

        let mut mentioned = false;
        for provider in config.providers.iter_mut().filter(|p| p.name == kind) {
            mentioned = true;
            if provider.api_key.is_empty() {
                provider.api_key = key.clone();
            }
        }
        if !mentioned {
            tracing::debug!("Adding {} provider from {}", kind, kind.api_key_env());
            config.providers.push(ProviderConfig::new(kind, key));
        }
    }
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.resolver.max_pages == 0 {
        anyhow::bail!("resolver.max_pages must be at least 1");
    }

    if config.resolver.max_diff.is_nan()
        || config.resolver.max_diff <= 0.0
        || config.resolver.max_diff > MAX_DIFF
    {
        anyhow::bail!("resolver.max_diff must be in (0, {}]", MAX_DIFF);
    }

    if config.cache.capacity == 0 {
        anyhow::bail!("cache.capacity must be at least 1");
    }

    if config.cache.ttl_secs == 0 {
        anyhow::bail!("cache.ttl_secs must be at least 1");
    }

    if config.batch.concurrency == 0 {
        anyhow::bail!("batch.concurrency must be at least 1");
    }

    for provider in config.enabled_providers() {
        if provider.api_key.trim().is_empty() {
            anyhow::bail!(
                "Provider '{}' is enabled but has no API key (set it in the config or via {})",
                provider.name,
                provider.name.api_key_env()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        std::env::remove_var("TMDB_API_KEY");
        std::env::remove_var("OMDB_API_KEY");
    }

    #[test]
    fn defaults_match_engine_constants() {
        let config = Config::default();
        assert_eq!(config.resolver.max_pages, 5);
        assert_eq!(config.resolver.max_diff, 1000.0);
        assert!(!config.resolver.strict);
        assert_eq!(config.cache.capacity, 200);
        assert_eq!(config.cache.ttl_secs, 1800);
        assert!(config.web_search.enabled);
        assert_eq!(config.batch.concurrency, 4);
        assert!(config.providers.is_empty());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    #[serial]
    fn env_key_fills_missing_key() {
        clear_env();
        std::env::set_var("TMDB_API_KEY", "from-env");

        let mut config: Config = toml::from_str(
            r#"
            [[providers]]
            name = "tmdb"
            language = "it-IT"
            "#,
        )
        .unwrap();
        apply_env_overrides(&mut config);
        clear_env();

        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].api_key, "from-env");
        assert_eq!(config.providers[0].language, "it-IT");
    }

    #[test]
    #[serial]
    fn env_key_adds_unmentioned_provider() {
        clear_env();
        std::env::set_var("OMDB_API_KEY", "omdb-env");

        let mut config = Config::default();
        apply_env_overrides(&mut config);
        clear_env();

        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].name, ProviderKind::Omdb);
        assert!(config.providers[0].enabled);
    }

    #[test]
    #[serial]
    fn file_key_wins_over_env() {
        clear_env();
        std::env::set_var("TMDB_API_KEY", "from-env");

        let mut config = Config {
            providers: vec![ProviderConfig::new(ProviderKind::Tmdb, "from-file")],
            ..Config::default()
        };
        apply_env_overrides(&mut config);
        clear_env();

        assert_eq!(config.providers[0].api_key, "from-file");
    }

    #[test]
    fn enabled_provider_without_key_is_rejected() {
        let config = Config {
            providers: vec![ProviderConfig::new(ProviderKind::Tmdb, "")],
            ..Config::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("TMDB_API_KEY"));

        let mut disabled = ProviderConfig::new(ProviderKind::Tmdb, "");
        disabled.enabled = false;
        let config = Config {
            providers: vec![disabled],
            ..Config::default()
        };
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn zero_limits_are_rejected() {
        let mut config = Config::default();
        config.resolver.max_pages = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.cache.capacity = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.cache.ttl_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.batch.concurrency = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn max_diff_above_sentinel_is_rejected() {
        let mut config = Config::default();
        config.resolver.max_diff = 5000.0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("max_diff"));

        config.resolver.max_diff = MAX_DIFF;
        assert!(validate_config(&config).is_ok());
    }
}
