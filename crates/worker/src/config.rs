use std::path::PathBuf;
use std::time::Duration;

use podbridge_pipeline::inputs::InputMode;
use podbridge_pipeline::orchestrator::PipelineConfig;

/// A configuration variable that is set but cannot be used.
#[derive(Debug, thiserror::Error)]
#[error("{var} must be {expected}, got '{value}'")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub expected: &'static str,
}

/// Worker configuration, read once at startup and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub comfy_host: String,
    pub comfy_port: u16,
    /// Per-request timeout for everything but readiness probes.
    pub request_timeout: Duration,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub workflow_dir: PathBuf,
    /// How long to wait for the engine at boot.
    pub startup_timeout: Duration,
    /// Default per-job wait budget.
    pub job_timeout: Duration,
    pub poll_interval: Duration,
    pub input_mode: InputMode,
    /// Age after which output files are swept at startup; `None` disables.
    pub output_max_age: Option<Duration>,
    /// When set, serve the local HTTP API instead of the NDJSON loop.
    pub serve_api_port: Option<u16>,
}

impl BridgeConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default             |
    /// |------------------------------|---------------------|
    /// | `COMFY_HOST`                 | `127.0.0.1`         |
    /// | `COMFY_PORT`                 | `8188`              |
    /// | `COMFY_REQUEST_TIMEOUT_SECS` | `30`                |
    /// | `COMFY_INPUT_DIR`            | `/workspace/input`  |
    /// | `COMFY_OUTPUT_DIR`           | `/workspace/output` |
    /// | `WORKFLOW_DIR`               | `/workflows`        |
    /// | `STARTUP_TIMEOUT`            | `300`               |
    /// | `JOB_TIMEOUT`                | `600`               |
    /// | `POLL_INTERVAL_MS`           | `2000`              |
    /// | `INPUT_MODE`                 | `filesystem`        |
    /// | `OUTPUT_MAX_AGE_HOURS`       | `24` (`0` disables) |
    /// | `SERVE_API_PORT`             | unset               |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading through `lookup`.
    /// Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let input_mode = match get("INPUT_MODE") {
            Some(value) => value.parse().map_err(|_| ConfigError {
                var: "INPUT_MODE",
                value,
                expected: "'filesystem' or 'upload'",
            })?,
            None => InputMode::default(),
        };

        let output_max_age_hours: u64 = parse_or(&get, "OUTPUT_MAX_AGE_HOURS", 24)?;
        let serve_api_port = match get("SERVE_API_PORT") {
            Some(value) => Some(parse_value("SERVE_API_PORT", value)?),
            None => None,
        };

        Ok(Self {
            comfy_host: get("COMFY_HOST").unwrap_or_else(|| "127.0.0.1".into()),
            comfy_port: parse_or(&get, "COMFY_PORT", 8188)?,
            request_timeout: Duration::from_secs(parse_or(&get, "COMFY_REQUEST_TIMEOUT_SECS", 30)?),
            input_dir: path_or(&get, "COMFY_INPUT_DIR", "/workspace/input"),
            output_dir: path_or(&get, "COMFY_OUTPUT_DIR", "/workspace/output"),
            workflow_dir: path_or(&get, "WORKFLOW_DIR", "/workflows"),
            startup_timeout: Duration::from_secs(parse_or(&get, "STARTUP_TIMEOUT", 300)?),
            job_timeout: Duration::from_secs(parse_or(&get, "JOB_TIMEOUT", 600)?),
            poll_interval: Duration::from_millis(parse_or(&get, "POLL_INTERVAL_MS", 2000)?),
            input_mode,
            output_max_age: (output_max_age_hours > 0)
                .then(|| Duration::from_secs(output_max_age_hours.saturating_mul(3600))),
            serve_api_port,
        })
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            input_dir: self.input_dir.clone(),
            output_dir: self.output_dir.clone(),
            workflow_dir: self.workflow_dir.clone(),
            input_mode: self.input_mode,
            default_timeout: self.job_timeout,
            poll_interval: self.poll_interval,
        }
    }
}

trait Numeric: std::str::FromStr {
    const EXPECTED: &'static str;
}

impl Numeric for u16 {
    const EXPECTED: &'static str = "a valid u16";
}

impl Numeric for u64 {
    const EXPECTED: &'static str = "a valid u64";
}

fn parse_value<T: Numeric>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError {
        var,
        value,
        expected: T::EXPECTED,
    })
}

fn parse_or<T: Numeric>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(var) {
        Some(value) => parse_value(var, value),
        None => Ok(default),
    }
}

fn path_or(get: &impl Fn(&str) -> Option<String>, var: &str, default: &str) -> PathBuf {
    PathBuf::from(get(var).unwrap_or_else(|| default.to_string()))
}
