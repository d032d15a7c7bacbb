//! Service configuration read from the environment.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use intake::ErrorStatusPolicy;
use launcher::{LauncherConfig, DEFAULT_CONTAINER_PREFIX};
use listener::{ServerConfig, DEFAULT_HOST, DEFAULT_PORT};
use store::DEFAULT_ISSUE_TABLE;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is required but not set")]
    Missing { key: &'static str },

    #[error("invalid {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// SQLite file; `None` keeps everything in memory.
    pub database_path: Option<PathBuf>,
    pub issue_table: String,
    pub queue_name: String,
    pub launcher: LauncherConfig,
    pub status_policy: ErrorStatusPolicy,
    pub log_format: LogFormat,
    pub otlp_endpoint: Option<String>,
    pub metrics_addr: Option<SocketAddr>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup. Empty values count as unset.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let port = match vars.get("PORT") {
            Some(port) => port.parse().map_err(|e| ConfigError::Invalid {
                key: "PORT",
                message: format!("{e}"),
            })?,
            None => DEFAULT_PORT,
        };

        let launcher = LauncherConfig {
            image: vars.require("TASK_IMAGE")?,
            network: vars.get("TASK_NETWORK"),
            container_prefix: vars.get_or("TASK_CONTAINER_PREFIX", DEFAULT_CONTAINER_PREFIX),
            pull_image: vars.flag("TASK_PULL_IMAGE")?,
        };

        let status_policy = match vars.get("ERROR_STATUS_POLICY") {
            Some(policy) => policy.parse().map_err(|message| ConfigError::Invalid {
                key: "ERROR_STATUS_POLICY",
                message,
            })?,
            None => ErrorStatusPolicy::default(),
        };

        let log_format = match vars.get("LOG_FORMAT").as_deref() {
            None => LogFormat::default(),
            Some(format) => match format.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => {
                    return Err(ConfigError::Invalid {
                        key: "LOG_FORMAT",
                        message: format!("'{other}' (expected json or pretty)"),
                    })
                }
            },
        };

        let metrics_addr = vars
            .get("METRICS_LISTEN_ADDR")
            .map(|addr| {
                addr.parse().map_err(|e| ConfigError::Invalid {
                    key: "METRICS_LISTEN_ADDR",
                    message: format!("{e}"),
                })
            })
            .transpose()?;

        Ok(Self {
            server: ServerConfig {
                host: vars.get_or("HOST", DEFAULT_HOST),
                port,
            },
            database_path: vars.get("DATABASE_PATH").map(PathBuf::from),
            issue_table: identifier(
                "ISSUE_TABLE",
                vars.get_or("ISSUE_TABLE", DEFAULT_ISSUE_TABLE),
            )?,
            queue_name: identifier("QUEUE_NAME", vars.require("QUEUE_NAME")?)?,
            launcher,
            status_policy,
            log_format,
            otlp_endpoint: vars.get("OTEL_EXPORTER_OTLP_ENDPOINT"),
            metrics_addr,
        })
    }
}

fn identifier(key: &'static str, value: String) -> Result<String, ConfigError> {
    store::sql_identifier(&value).map_err(|e| ConfigError::Invalid {
        key,
        message: e.to_string(),
    })
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_owned())
    }

    fn require(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing { key })
    }

    fn flag(&self, key: &'static str) -> Result<bool, ConfigError> {
        match self.get(key).map(|v| v.to_ascii_lowercase()).as_deref() {
            None | Some("0" | "false" | "no" | "off") => Ok(false),
            Some("1" | "true" | "yes" | "on") => Ok(true),
            Some(other) => Err(ConfigError::Invalid {
                key,
                message: format!("'{other}' is not a boolean"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_vars(|key| vars.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("QUEUE_NAME", "nemo_ai_tasks"),
        ("TASK_IMAGE", "worker:1"),
    ];

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let cfg = config(&REQUIRED).unwrap();

        assert_eq!(cfg.server.addr(), "0.0.0.0:8080");
        assert_eq!(cfg.database_path, None);
        assert_eq!(cfg.issue_table, "jira_webhook_events");
        assert_eq!(cfg.queue_name, "nemo_ai_tasks");
        assert_eq!(cfg.launcher.image, "worker:1");
        assert_eq!(cfg.launcher.container_prefix, "jira-task");
        assert!(!cfg.launcher.pull_image);
        assert_eq!(cfg.status_policy, ErrorStatusPolicy::ContainerTaskErrors);
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.otlp_endpoint, None);
        assert_eq!(cfg.metrics_addr, None);
    }

    #[test]
    fn missing_queue_name_is_rejected() {
        let err = config(&[("TASK_IMAGE", "worker")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing { key: "QUEUE_NAME" });
    }

    #[test]
    fn blank_task_image_counts_as_missing() {
        let err = config(&[("QUEUE_NAME", "q"), ("TASK_IMAGE", "  ")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing { key: "TASK_IMAGE" });
    }

    #[test]
    fn overrides_are_read() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("HOST", "127.0.0.1"),
            ("PORT", "3000"),
            ("DATABASE_PATH", "/var/lib/intake.db"),
            ("ISSUE_TABLE", "events"),
            ("TASK_NETWORK", "tasks"),
            ("TASK_PULL_IMAGE", "true"),
            ("ERROR_STATUS_POLICY", "strict"),
            ("LOG_FORMAT", "pretty"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4317"),
            ("METRICS_LISTEN_ADDR", "0.0.0.0:9000"),
        ]);
        let cfg = config(&pairs).unwrap();

        assert_eq!(cfg.server.addr(), "127.0.0.1:3000");
        assert_eq!(cfg.database_path, Some(PathBuf::from("/var/lib/intake.db")));
        assert_eq!(cfg.issue_table, "events");
        assert_eq!(cfg.launcher.network.as_deref(), Some("tasks"));
        assert!(cfg.launcher.pull_image);
        assert_eq!(cfg.status_policy, ErrorStatusPolicy::Strict);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.otlp_endpoint.as_deref(), Some("http://localhost:4317"));
        assert_eq!(cfg.metrics_addr, Some("0.0.0.0:9000".parse().unwrap()));
    }

    #[test]
    fn invalid_values_abort() {
        for (key, value) in [
            ("PORT", "eighty"),
            ("ERROR_STATUS_POLICY", "sometimes"),
            ("LOG_FORMAT", "xml"),
            ("TASK_PULL_IMAGE", "maybe"),
            ("METRICS_LISTEN_ADDR", "localhost"),
            ("ISSUE_TABLE", "events; DROP"),
        ] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push((key, value));
            let err = config(&pairs).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { key: k, .. } if k == key),
                "{key}={value} gave {err:?}"
            );
        }
    }

    #[test]
    fn queue_name_must_be_an_identifier() {
        let err = config(&[("QUEUE_NAME", "nemo-ai-tasks.fifo"), ("TASK_IMAGE", "w")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "QUEUE_NAME", .. }));
    }

    #[test]
    fn config_from_env_reads_process_environment() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");

        env::set_var("QUEUE_NAME", "env_queue");
        env::set_var("TASK_IMAGE", "env-image");

        let cfg = AppConfig::from_env().expect("should parse config");
        assert_eq!(cfg.queue_name, "env_queue");
        assert_eq!(cfg.launcher.image, "env-image");

        env::remove_var("QUEUE_NAME");
        env::remove_var("TASK_IMAGE");
    }
}
