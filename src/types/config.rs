use crate::error::CheckerError;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_EXTENSIONS: [&str; 7] = [".js", ".py", ".java", ".cpp", ".rs", ".ts", ".go"];
pub const DEFAULT_EXCLUDE_DIRS: [&str; 1] = [".git"];
pub const DEFAULT_ORACLE_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_ORACLE_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CheckerConfig {
    pub discovery: Option<DiscoveryConfig>,
    pub aggregation: Option<AggregationConfig>,
    pub oracle: Option<OracleConfig>,
    pub workspace: Option<WorkspaceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    pub extensions: Option<Vec<String>>,
    #[serde(default)]
    pub case_insensitive: bool,
    pub exclude_dirs: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadErrorPolicy {
    #[default]
    Abort,
    Skip,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregationConfig {
    pub on_read_error: Option<ReadErrorPolicy>,
    pub max_corpus_bytes: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key_env: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceConfig {
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverySettings {
    pub extensions: Vec<String>,
    pub case_insensitive: bool,
    pub exclude_dirs: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateOptions {
    pub on_read_error: ReadErrorPolicy,
    pub max_corpus_bytes: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ORACLE_ENDPOINT.to_string(),
            model: DEFAULT_ORACLE_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout: Duration::from_secs(120),
            max_retries: 2,
            initial_backoff: Duration::from_millis(2000),
        }
    }
}

impl CheckerConfig {
    pub fn discovery_settings(&self) -> DiscoverySettings {
        let discovery = self.discovery.as_ref();
        DiscoverySettings {
            extensions: discovery
                .and_then(|discovery| discovery.extensions.clone())
                .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()),
            case_insensitive: discovery
                .map(|discovery| discovery.case_insensitive)
                .unwrap_or(false),
            exclude_dirs: discovery
                .and_then(|discovery| discovery.exclude_dirs.clone())
                .unwrap_or_else(|| {
                    DEFAULT_EXCLUDE_DIRS
                        .iter()
                        .map(|dir| dir.to_string())
                        .collect()
                }),
        }
    }

    pub fn aggregate_options(&self) -> AggregateOptions {
        match &self.aggregation {
            Some(aggregation) => AggregateOptions {
                on_read_error: aggregation.on_read_error.unwrap_or_default(),
                max_corpus_bytes: aggregation.max_corpus_bytes,
            },
            None => AggregateOptions::default(),
        }
    }

    pub fn oracle_settings(&self) -> OracleSettings {
        let defaults = OracleSettings::default();
        match &self.oracle {
            Some(oracle) => OracleSettings {
                endpoint: oracle.endpoint.clone().unwrap_or(defaults.endpoint),
                model: oracle.model.clone().unwrap_or(defaults.model),
                api_key_env: oracle.api_key_env.clone().unwrap_or(defaults.api_key_env),
                timeout: oracle
                    .timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.timeout),
                max_retries: oracle.max_retries.unwrap_or(defaults.max_retries),
                initial_backoff: oracle
                    .initial_backoff_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.initial_backoff),
            },
            None => defaults,
        }
    }

    pub fn work_root(&self) -> Option<PathBuf> {
        self.workspace
            .as_ref()
            .and_then(|workspace| workspace.root.clone())
    }

    pub fn validate(&self) -> Result<(), CheckerError> {
        if let Some(discovery) = &self.discovery {
            if let Some(extensions) = &discovery.extensions {
                if extensions.is_empty() {
                    return Err(CheckerError::ConfigParse(
                        "discovery.extensions cannot be empty".to_string(),
                    ));
                }
                let mut seen = HashSet::new();
                for extension in extensions {
                    let normalized = extension.trim().trim_start_matches('.');
                    if normalized.is_empty() {
                        return Err(CheckerError::ConfigParse(
                            "discovery.extensions entries must be non-empty".to_string(),
                        ));
                    }
                    if normalized.contains(['/', '\\']) {
                        return Err(CheckerError::ConfigParse(format!(
                            "discovery.extensions entry is not a file suffix: {extension}"
                        )));
                    }
                    if !seen.insert(normalized.to_string()) {
                        return Err(CheckerError::ConfigParse(format!(
                            "discovery.extensions contains duplicate entry: {extension}"
                        )));
                    }
                }
            }
        }

        if let Some(aggregation) = &self.aggregation {
            if aggregation.max_corpus_bytes == Some(0) {
                return Err(CheckerError::ConfigParse(
                    "aggregation.max_corpus_bytes must be greater than 0".to_string(),
                ));
            }
        }

        if let Some(oracle) = &self.oracle {
            if oracle.timeout_secs == Some(0) {
                return Err(CheckerError::ConfigParse(
                    "oracle.timeout_secs must be greater than 0".to_string(),
                ));
            }
            if let Some(endpoint) = &oracle.endpoint {
                if url::Url::parse(endpoint).is_err() {
                    return Err(CheckerError::ConfigParse(format!(
                        "oracle.endpoint is not a valid URL: {endpoint}"
                    )));
                }
            }
            if let Some(api_key_env) = &oracle.api_key_env {
                if api_key_env.trim().is_empty() {
                    return Err(CheckerError::ConfigParse(
                        "oracle.api_key_env must name an environment variable".to_string(),
                    ));
                }
            }
            if let Some(model) = &oracle.model {
                if model.trim().is_empty() {
                    return Err(CheckerError::ConfigParse(
                        "oracle.model cannot be empty".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}
