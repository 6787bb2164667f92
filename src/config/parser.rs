//! Configuration file parser
//!
//! One `param value` pair per line, `#` starts a comment line:
//!
//! ```text
//! first-available-dim 4
//! max-dims 25
//! default-history 1
//! max-global-dims none
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use tracing::warn;

use super::AllocatorConfig;

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigParseError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Invalid line format
    #[error("Invalid line format at line {0}: {1}")]
    Format(usize, String),

    /// Invalid parameter value
    #[error("Invalid value for parameter '{0}' at line {1}: {2}")]
    Value(String, usize, String),

    /// The values parse but do not form a usable configuration
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Parse a configuration file
pub fn parse_config_file(path: &Path) -> Result<AllocatorConfig, ConfigParseError> {
    let file = File::open(path)?;
    parse_lines(BufReader::new(file))
}

/// Parse configuration text
pub fn parse_config_str(text: &str) -> Result<AllocatorConfig, ConfigParseError> {
    parse_lines(text.as_bytes())
}

fn parse_lines(reader: impl BufRead) -> Result<AllocatorConfig, ConfigParseError> {
    let mut config = AllocatorConfig::default();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.splitn(2, char::is_whitespace).collect();
        if parts.len() != 2 {
            return Err(ConfigParseError::Format(line_num + 1, line.to_string()));
        }

        let param = parts[0].trim().to_lowercase();
        let value = parts[1].trim();
        apply_config_param(&mut config, &param, value, line_num + 1)?;
    }

    config
        .validate()
        .map_err(|err| ConfigParseError::Invalid(err.to_string()))?;
    Ok(config)
}

/// Apply a configuration parameter to the config
fn apply_config_param(
    config: &mut AllocatorConfig,
    param: &str,
    value: &str,
    line_num: usize,
) -> Result<(), ConfigParseError> {
    match param {
        "first-available-dim" => {
            config.first_available_dim = parse_value(param, value, line_num)?;
        }
        "max-dims" => {
            config.max_dims = parse_value(param, value, line_num)?;
        }
        "default-history" => {
            config.default_history = parse_value(param, value, line_num)?;
        }
        "max-global-dims" => {
            config.max_global_dims = match value.to_lowercase().as_str() {
                "none" | "0" => None,
                _ => Some(parse_value(param, value, line_num)?),
            };
        }
        _ => {
            warn!(param, line = line_num, "unknown configuration parameter, skipping");
        }
    }

    Ok(())
}

/// Parse a value that implements FromStr
fn parse_value<T: FromStr>(param: &str, value: &str, line_num: usize) -> Result<T, ConfigParseError> {
    value
        .parse::<T>()
        .map_err(|_| ConfigParseError::Value(param.to_string(), line_num, value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_basic_config() {
        let config_content = r#"
# Reserve two visible axes
first-available-dim 2
max-dims 12

default-history 2
max-global-dims 4
"#;

        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();
        write(path, config_content).unwrap();

        let config = parse_config_file(path).unwrap();
        assert_eq!(config.first_available_dim, 2);
        assert_eq!(config.max_dims, 12);
        assert_eq!(config.default_history, 2);
        assert_eq!(config.max_global_dims, Some(4));
    }

    #[test]
    fn test_unknown_params_are_skipped() {
        let config = parse_config_str("verbose yes\nmax-global-dims none\n").unwrap();
        assert_eq!(config, AllocatorConfig::default());
    }

    #[test]
    fn test_bad_lines() {
        assert!(matches!(
            parse_config_str("max-dims"),
            Err(ConfigParseError::Format(1, _))
        ));
        assert!(matches!(
            parse_config_str("# header\nmax-dims -3"),
            Err(ConfigParseError::Value(_, 2, _))
        ));
        assert!(matches!(
            parse_config_str("first-available-dim 30"),
            Err(ConfigParseError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse_config_file(&dir.path().join("absent.conf")).unwrap_err();
        assert!(matches!(err, ConfigParseError::Io(_)));
    }
}
