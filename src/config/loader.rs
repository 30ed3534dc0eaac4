//! Configuration loader with environment variable expansion

use super::{Config, ConfigError, TOKEN_ENV_VAR};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    ///
    /// Expands `${VAR}` and `${VAR:-default}` placeholders before parsing,
    /// then falls back to `COURIER_API_TOKEN` for the API token and runs
    /// validation.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let expanded = Self::expand_env_vars(&content);
        let mut config: Config = serde_yaml::from_str(&expanded)?;

        if config.api.token.as_deref().map_or(true, str::is_empty) {
            config.api.token = std::env::var(TOKEN_ENV_VAR).ok().filter(|t| !t.is_empty());
        }

        config.validate()?;
        Ok(config)
    }

    /// Expand `${VAR_NAME}` and `${VAR_NAME:-default}` placeholders.
    ///
    /// A placeholder without a default is left untouched when the variable is
    /// not set, so validation can report the missing value in context.
    fn expand_env_vars(content: &str) -> String {
        let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").unwrap();
        let mut result = String::with_capacity(content.len());
        let mut last = 0;

        for cap in re.captures_iter(content) {
            let whole = cap.get(0).unwrap();
            result.push_str(&content[last..whole.start()]);

            let name = cap.get(1).unwrap().as_str();
            match std::env::var(name) {
                Ok(value) => result.push_str(&value),
                Err(_) => match cap.get(2) {
                    Some(default) => result.push_str(default.as_str()),
                    None => result.push_str(whole.as_str()),
                },
            }

            last = whole.end();
        }

        result.push_str(&content[last..]);
        result
    }
}
