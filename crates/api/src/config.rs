use std::path::PathBuf;
use std::time::Duration;

/// Errors raised while reading configuration. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Settings consumed by the job engine.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Service tag stamped on every admitted job.
    pub service_id: String,
    /// Program and fixed leading arguments for every job.
    pub command_line: Vec<String>,
    /// Parent directory of the per-job working directories.
    pub file_root_directory: PathBuf,
    /// Store stdout as an empty string.
    pub suppress_stdout: bool,
    /// Interval between two store polls while waiting on a job.
    pub poll_interval: Duration,
    /// How long to wait for a job to record its start.
    pub start_wait_timeout: Duration,
    /// Bound on the synchronous completion wait. `None` waits forever.
    pub completion_wait_timeout: Option<Duration>,
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// How long shutdown waits for running executions (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Longest accepted parameter name (default: `64`).
    pub max_param_name_len: usize,
    /// Request body limit in bytes (default: 1 MiB).
    pub max_body_bytes: usize,
    pub execution: ExecutionConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                    |
    /// |--------------------------------|----------------------------|
    /// | `DATABASE_URL`                 | required                   |
    /// | `SERVICE_ID`                   | required                   |
    /// | `COMMAND_LINE`                 | required                   |
    /// | `FILE_ROOT_DIRECTORY`          | required                   |
    /// | `SUPPRESS_STDOUT`              | `false`                    |
    /// | `POLL_INTERVAL_MS`             | `500`                      |
    /// | `START_WAIT_TIMEOUT_MS`        | `2000`                     |
    /// | `COMPLETION_WAIT_TIMEOUT_SECS` | unset (wait forever)       |
    /// | `MAX_PARAM_NAME_LEN`           | `64`                       |
    /// | `MAX_BODY_BYTES`               | `1048576`                  |
    /// | `HOST`                         | `0.0.0.0`                  |
    /// | `PORT`                         | `3000`                     |
    /// | `CORS_ORIGINS`                 | `http://localhost:5173`    |
    /// | `SHUTDOWN_TIMEOUT_SECS`        | `30`                       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let execution = ExecutionConfig {
            service_id: vars.required("SERVICE_ID")?,
            command_line: parse_command_line(&vars.required("COMMAND_LINE")?)?,
            file_root_directory: PathBuf::from(vars.required("FILE_ROOT_DIRECTORY")?),
            suppress_stdout: vars.flag("SUPPRESS_STDOUT", false)?,
            poll_interval: Duration::from_millis(vars.number("POLL_INTERVAL_MS", 500)?),
            start_wait_timeout: Duration::from_millis(vars.number("START_WAIT_TIMEOUT_MS", 2000)?),
            completion_wait_timeout: vars
                .optional_number("COMPLETION_WAIT_TIMEOUT_SECS")?
                .map(Duration::from_secs),
        };

        if execution.poll_interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "POLL_INTERVAL_MS",
                reason: "must be greater than zero".into(),
            });
        }

        let cors_origins = vars
            .get("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            database_url: vars.required("DATABASE_URL")?,
            host: vars.get("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: vars.number("PORT", 3000)?,
            cors_origins,
            shutdown_timeout_secs: vars.number("SHUTDOWN_TIMEOUT_SECS", 30)?,
            max_param_name_len: vars.number("MAX_PARAM_NAME_LEN", 64)?,
            max_body_bytes: vars.number("MAX_BODY_BYTES", 1024 * 1024)?,
            execution,
        })
    }
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn number<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.optional_number(key)?.unwrap_or(default))
    }

    fn optional_number<T>(&self, key: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                    key,
                    reason: e.to_string(),
                })
            })
            .transpose()
    }

    fn flag(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                other => Err(ConfigError::Invalid {
                    key,
                    reason: format!("expected a boolean, got '{other}'"),
                }),
            },
        }
    }
}

/// Parse `COMMAND_LINE`: a JSON array of strings, or one bare token.
fn parse_command_line(raw: &str) -> Result<Vec<String>, ConfigError> {
    let raw = raw.trim();
    let tokens = if raw.starts_with('[') {
        serde_json::from_str::<Vec<String>>(raw).map_err(|e| ConfigError::Invalid {
            key: "COMMAND_LINE",
            reason: e.to_string(),
        })?
    } else {
        vec![raw.to_string()]
    };

    if tokens.first().map_or(true, |program| program.trim().is_empty()) {
        return Err(ConfigError::Invalid {
            key: "COMMAND_LINE",
            reason: "the program name is empty".into(),
        });
    }
    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
