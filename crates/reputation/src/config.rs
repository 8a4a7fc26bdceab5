//! Configuration management for the Tabetti reputation tools.
//!
//! This module handles loading configuration from:
//! - TOML files (with `${VAR_NAME}` expansion)
//! - Environment variables (override TOML)
//! - Default values (fallbacks)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding `database.url`.
pub const ENV_DATABASE_URL: &str = "TABETTI_DATABASE_URL";

/// Environment variable overriding `logging.level`.
pub const ENV_LOG_LEVEL: &str = "TABETTI_LOG_LEVEL";

/// Main configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Batch maintenance configuration
    #[serde(default)]
    pub maintenance: MaintenanceConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://tabetti.db")
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Batch maintenance configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    /// Customers fetched per page during `recompute-trust`
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_database_url() -> String {
    "sqlite://tabetti.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_batch_size() -> u32 {
    200
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then apply environment overrides.
    ///
    /// Environment variables can be referenced using `${VAR_NAME}` syntax.
    /// For example: `url = "sqlite://${TABETTI_DATA_DIR}/tabetti.db"`
    ///
    /// # Example
    /// ```no_run
    /// # use tabetti_reputation::config::Config;
    /// let config = Config::from_file("tabetti.toml")?;
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let expanded = expand_env_vars(&contents)
            .with_context(|| format!("Failed to expand config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&expanded)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Load from `path` if given, else from `tabetti.toml` if present, else
    /// defaults. Environment overrides apply in every case.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        let fallback = Path::new("tabetti.toml");
        if fallback.exists() {
            return Self::from_file(fallback);
        }

        let mut config = Config::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (no env overrides).
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml).context("Failed to parse TOML configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Apply `TABETTI_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_DATABASE_URL) {
            self.database.url = url;
        }
        if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }
        if !self.database.url.starts_with("sqlite:") {
            anyhow::bail!(
                "Database URL must be a sqlite URL (got '{}')",
                self.database.url
            );
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be > 0");
        }
        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot exceed max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.maintenance.batch_size == 0 {
            anyhow::bail!("Maintenance batch_size must be > 0");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Logging level must be one of: {} (got '{}')",
                valid_levels.join(", "),
                self.logging.level
            );
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!(
                "Logging format must be one of: {} (got '{}')",
                valid_formats.join(", "),
                self.logging.format
            );
        }

        Ok(())
    }
}

/// TOML string the scanner is currently inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringKind {
    /// `"..."`
    Basic,
    /// `'...'`
    Literal,
    /// `"""..."""`
    MultilineBasic,
    /// `'''...'''`
    MultilineLiteral,
}

impl StringKind {
    fn quote(self) -> char {
        match self {
            StringKind::Basic | StringKind::MultilineBasic => '"',
            StringKind::Literal | StringKind::MultilineLiteral => '\'',
        }
    }

    fn is_multiline(self) -> bool {
        matches!(self, StringKind::MultilineBasic | StringKind::MultilineLiteral)
    }

    fn allows_escapes(self) -> bool {
        matches!(self, StringKind::Basic | StringKind::MultilineBasic)
    }
}

/// Whether the two characters after the current one repeat `quote`.
fn next_two_are(chars: &std::iter::Peekable<std::str::Chars<'_>>, quote: char) -> bool {
    let mut ahead = chars.clone();
    ahead.next() == Some(quote) && ahead.next() == Some(quote)
}

/// Expand `${VAR_NAME}` placeholders.
///
/// Placeholders inside comments (a `#` outside any quoted string, up to the end
/// of the line) are left untouched. Basic, literal and triple-quoted multiline
/// strings are tracked so a `#` or lone quote inside them never starts a
/// comment. Referencing an unset variable is an error.
fn expand_env_vars(input: &str) -> Result<String> {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut string: Option<StringKind> = None;
    let mut in_comment = false;
    let mut escape_next = false;

    while let Some(ch) = chars.next() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
            }
            result.push(ch);
            continue;
        }

        if escape_next {
            escape_next = false;
            result.push(ch);
            continue;
        }

        match (ch, string) {
            ('\\', Some(kind)) if kind.allows_escapes() => {
                escape_next = true;
                result.push(ch);
            }
            ('"' | '\'', None) => {
                let triple = next_two_are(&chars, ch);
                string = Some(match (ch, triple) {
                    ('"', true) => StringKind::MultilineBasic,
                    ('"', false) => StringKind::Basic,
                    (_, true) => StringKind::MultilineLiteral,
                    (_, false) => StringKind::Literal,
                });
                result.push(ch);
                if triple {
                    result.extend(chars.by_ref().take(2));
                }
            }
            (c, Some(kind)) if c == kind.quote() => {
                if !kind.is_multiline() {
                    string = None;
                    result.push(ch);
                } else if next_two_are(&chars, c) {
                    string = None;
                    result.push(ch);
                    result.extend(chars.by_ref().take(2));
                } else {
                    // Lone quote inside a multiline string.
                    result.push(ch);
                }
            }
            ('#', None) => {
                in_comment = true;
                result.push(ch);
            }
            ('$', _) if chars.peek() == Some(&'{') => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(c) => name.push(c),
                        None => anyhow::bail!("Unterminated environment placeholder: ${{{}", name),
                    }
                }
                if name.is_empty() {
                    anyhow::bail!("Empty environment placeholder: ${{}}");
                }
                let value = std::env::var(&name)
                    .with_context(|| format!("Environment variable not set: {}", name))?;
                result.push_str(&value);
            }
            _ => result.push(ch),
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.database.url, "sqlite://tabetti.db");
        assert_eq!(config.maintenance.batch_size, 200);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = Config::from_toml_str(
            r#"
            [database]
            url = "sqlite://other.db"

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.url, "sqlite://other.db");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_validation_errors() {
        let bad = [
            "[database]\nurl = \"\"",
            "[database]\nurl = \"postgres://db\"",
            "[database]\nmax_connections = 0",
            "[database]\nmin_connections = 9\nmax_connections = 2",
            "[maintenance]\nbatch_size = 0",
            "[logging]\nlevel = \"loud\"",
            "[logging]\nformat = \"xml\"",
        ];
        for toml in bad {
            assert!(Config::from_toml_str(toml).is_err(), "accepted: {}", toml);
        }
    }

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TABETTI_TEST_DIR", "/var/lib/tabetti");

        let input = "url = \"sqlite://${TABETTI_TEST_DIR}/t.db\"\n# ${NOT_SET_ANYWHERE}\n";
        let out = expand_env_vars(input).unwrap();
        assert_eq!(
            out,
            "url = \"sqlite:///var/lib/tabetti/t.db\"\n# ${NOT_SET_ANYWHERE}\n"
        );
    }

    #[test]
    fn test_expand_missing_var_fails() {
        assert!(expand_env_vars("x = \"${TABETTI_TEST_DEFINITELY_UNSET}\"").is_err());
        assert!(expand_env_vars("x = \"${UNTERMINATED").is_err());
    }

    #[test]
    fn test_hash_inside_string_is_not_comment() {
        std::env::set_var("TABETTI_TEST_NAME", "tabetti");
        let out = expand_env_vars("x = \"#${TABETTI_TEST_NAME}\"").unwrap();
        assert_eq!(out, "x = \"#tabetti\"");
    }

    #[test]
    fn test_multiline_strings_keep_quote_state() {
        std::env::set_var("TABETTI_TEST_SUFFIX", "tail");

        let input = "note = \"\"\"\nsay \"hi\" # ${TABETTI_TEST_SUFFIX}\n\"\"\"\n";
        let out = expand_env_vars(input).unwrap();
        assert_eq!(out, "note = \"\"\"\nsay \"hi\" # tail\n\"\"\"\n");

        let input = "raw = \'\'\'it's # ${TABETTI_TEST_SUFFIX}\'\'\'\n# ${NOT_SET_ANYWHERE}\n";
        let out = expand_env_vars(input).unwrap();
        assert_eq!(out, "raw = \'\'\'it's # tail\'\'\'\n# ${NOT_SET_ANYWHERE}\n");
    }

    #[test]
    fn test_comment_after_multiline_string_closes() {
        let input = "a = \"\"\"x\"\"\" # ${NOT_SET_ANYWHERE}\n";
        assert_eq!(expand_env_vars(input).unwrap(), input);
    }
}
