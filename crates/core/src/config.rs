//! Environment and file helpers shared by the config types of each crate.

use std::env;
use std::path::Path;
use std::str::FromStr;

use serde::de::DeserializeOwned;

use crate::error::CoreError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Read an env var, falling back to `default` when unset.
pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read an env var, treating empty values as unset.
pub fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read and parse an env var. Unparseable values are logged and ignored.
pub fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env_opt(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparseable env override");
            None
        }
    }
}

/// Parse a TOML document into `T`.
pub fn parse_toml<T: DeserializeOwned>(toml_str: &str) -> Result<T, CoreError> {
    Ok(toml::from_str(toml_str)?)
}

/// Read a TOML file from disk and parse it into `T`.
pub fn read_toml_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, CoreError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    parse_toml(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        name: String,
        #[serde(default)]
        count: u32,
    }

    #[test]
    fn parse_toml_with_defaults() {
        let sample: Sample = parse_toml(r#"name = "abc""#).unwrap();
        assert_eq!(sample.name, "abc");
        assert_eq!(sample.count, 0);
    }

    #[test]
    fn parse_toml_reports_errors() {
        let err = parse_toml::<Sample>("name = ").unwrap_err();
        assert!(matches!(err, CoreError::ConfigParse(_)));
    }

    #[test]
    fn read_missing_file_is_io_error() {
        let err = read_toml_file::<Sample>("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, CoreError::Io(_)));
    }

    #[test]
    fn env_parse_reads_and_rejects() {
        std::env::set_var("TASKLANE_CORE_TEST_PARSE_OK", "42");
        std::env::set_var("TASKLANE_CORE_TEST_PARSE_BAD", "forty-two");
        assert_eq!(env_parse::<u64>("TASKLANE_CORE_TEST_PARSE_OK"), Some(42));
        assert_eq!(env_parse::<u64>("TASKLANE_CORE_TEST_PARSE_BAD"), None);
        assert_eq!(env_parse::<u64>("TASKLANE_CORE_TEST_PARSE_UNSET"), None);
    }

    #[test]
    fn env_opt_treats_empty_as_unset() {
        std::env::set_var("TASKLANE_CORE_TEST_EMPTY", "");
        assert_eq!(env_opt("TASKLANE_CORE_TEST_EMPTY"), None);
        assert_eq!(env_or("TASKLANE_CORE_TEST_EMPTY_UNSET", "fallback"), "fallback");
    }
}
