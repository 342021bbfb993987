use crate::error::{GovernanceError, Result};
use std::path::PathBuf;

pub const DEFAULT_DATA_PATH: &str = "cloudmart_multi_account.csv";
pub const DEFAULT_TOP_DEPARTMENTS: usize = 10;
pub const DEFAULT_LOWEST_N: usize = 5;
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Runtime settings. Resolved from the environment (and `.env`), then overridden by CLI flags.
#[derive(Debug, Clone, PartialEq)]
pub struct GovernanceConfig {
    pub data_path: PathBuf,
    pub output_dir: PathBuf,
    pub top_departments: usize,
    pub lowest_completeness_n: usize,
    pub log_filter: String,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            output_dir: PathBuf::from("."),
            top_departments: DEFAULT_TOP_DEPARTMENTS,
            lowest_completeness_n: DEFAULT_LOWEST_N,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl GovernanceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(path) = lookup("TAGGING_DATA_PATH") {
            config.data_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup("TAGGING_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(n) = lookup("TAGGING_TOP_DEPARTMENTS") {
            config.top_departments = parse_count("TAGGING_TOP_DEPARTMENTS", &n)?;
        }
        if let Some(n) = lookup("TAGGING_LOWEST_N") {
            config.lowest_completeness_n = parse_count("TAGGING_LOWEST_N", &n)?;
        }
        if let Some(filter) = lookup("TAGGING_LOG").or_else(|| lookup("RUST_LOG")) {
            config.log_filter = filter;
        }
        Ok(config)
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| GovernanceError::Config(format!("{} must be a non-negative integer, got '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = GovernanceConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, GovernanceConfig::default());
        assert_eq!(config.data_path, PathBuf::from("cloudmart_multi_account.csv"));
    }

    #[test]
    fn test_env_overrides() {
        let config = GovernanceConfig::from_lookup(lookup(&[
            ("TAGGING_DATA_PATH", "/data/export.csv"),
            ("TAGGING_TOP_DEPARTMENTS", " 3 "),
            ("RUST_LOG", "debug"),
        ]))
        .unwrap();
        assert_eq!(config.data_path, PathBuf::from("/data/export.csv"));
        assert_eq!(config.top_departments, 3);
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn test_tagging_log_wins_over_rust_log() {
        let config = GovernanceConfig::from_lookup(lookup(&[
            ("TAGGING_LOG", "warn"),
            ("RUST_LOG", "debug"),
        ]))
        .unwrap();
        assert_eq!(config.log_filter, "warn");
    }

    #[test]
    fn test_invalid_count() {
        let err = GovernanceConfig::from_lookup(lookup(&[("TAGGING_LOWEST_N", "five")])).unwrap_err();
        assert!(matches!(err, GovernanceError::Config(_)));
    }
}
