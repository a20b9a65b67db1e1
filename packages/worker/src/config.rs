use std::collections::HashMap;
use std::path::PathBuf;

use common::{TaskConfig, TaskLimits, TestsConfig};
use config::{Config, ConfigError, Environment, File};
use depot::DatabaseConfig;
use serde::Deserialize;
use tracing::Level;
use tracing::metadata::ParseLevelError;

/// Worker pool settings.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkerSettings {
    /// Number of solutions graded at once. Default: 1.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    1
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

/// How checks are executed.
#[derive(Debug, Deserialize, Clone)]
pub struct CheckSettings {
    /// Scratch root for transient program, input, and module files. Default: "check".
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// Interpreter that runs submitted programs. Default: "python3".
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// Solution file holding the program entrypoint. Default: "prog.py".
    #[serde(default = "default_program")]
    pub program: String,
    /// Interpreter that runs validator modules. Default: "python3".
    #[serde(default = "default_interpreter")]
    pub validator_interpreter: String,
}

fn default_directory() -> PathBuf {
    PathBuf::from("check")
}
fn default_interpreter() -> String {
    "python3".into()
}
fn default_program() -> String {
    "prog.py".into()
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            interpreter: default_interpreter(),
            program: default_program(),
            validator_interpreter: default_interpreter(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `tracing` filter level. Default: "info".
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".into()
}

impl LoggingConfig {
    /// Parsed `level`.
    pub fn max_level(&self) -> Result<Level, ParseLevelError> {
        self.level.parse()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

/// Grader application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct GraderAppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub worker: WorkerSettings,
    #[serde(default)]
    pub check: CheckSettings,
    #[serde(default)]
    pub tests: TestsConfig,
    /// Per-task configuration keyed by task ID.
    #[serde(default)]
    pub tasks: HashMap<String, TaskConfig>,
}

impl GraderAppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("GRADER_CONFIG").unwrap_or_else(|_| "config/config".to_string());

        let s = Config::builder()
            .set_default("database.url", "sqlite://grader.db?mode=rwc")?
            .set_default("logging.level", "info")?
            .set_default("worker.concurrency", 1_i64)?
            .set_default("check.directory", "check")?
            .set_default("check.interpreter", "python3")?
            .set_default("check.program", "prog.py")?
            .set_default("check.validator_interpreter", "python3")?
            .add_source(File::with_name(&config_path).required(false))
            .add_source(Environment::with_prefix("GRADER").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    /// Limits for `task_id`, falling back to the `tests` defaults.
    pub fn limits(&self, task_id: &str) -> TaskLimits {
        TaskLimits::resolve(self.tasks.get(task_id), &self.tests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn clear_env() {
        for key in ["GRADER_CONFIG", "GRADER__WORKER__CONCURRENCY", "GRADER__CHECK__INTERPRETER"] {
            // SAFETY: tests touching the environment are serialized.
            unsafe { std::env::remove_var(key) };
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_file() {
        clear_env();
        // SAFETY: serialized.
        unsafe { std::env::set_var("GRADER_CONFIG", "/nonexistent/grader") };

        let config = GraderAppConfig::load().unwrap();
        assert_eq!(config.worker.concurrency, 1);
        assert_eq!(config.check.interpreter, "python3");
        assert_eq!(config.check.program, "prog.py");
        assert_eq!(config.tests.max_size, 100);
        assert!(config.tasks.is_empty());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_file_and_env_layers() {
        clear_env();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[check]
interpreter = "python3.12"

[tests]
default_time_limit = 4

[tasks.task1]
time_limit = 1
checks = ["instructor:task1/deadline"]

[tasks.task1.check_args]
"instructor:task1/size" = 512
"#
        )
        .unwrap();
        file.flush().unwrap();

        // SAFETY: serialized.
        unsafe {
            std::env::set_var("GRADER_CONFIG", file.path());
            std::env::set_var("GRADER__WORKER__CONCURRENCY", "4");
        }

        let config = GraderAppConfig::load().unwrap();
        assert_eq!(config.check.interpreter, "python3.12");
        assert_eq!(config.worker.concurrency, 4);
        assert_eq!(config.limits("task1").time_limit, 1);
        assert_eq!(config.limits("other").time_limit, 4);
        let task = &config.tasks["task1"];
        assert_eq!(task.checks, vec!["instructor:task1/deadline".to_string()]);
        assert_eq!(
            task.args_for("instructor:task1/size").unwrap().args,
            vec![serde_json::json!(512)]
        );
        clear_env();
    }

    #[test]
    fn test_log_level_parsing() {
        let mut logging = LoggingConfig::default();
        assert_eq!(logging.max_level().unwrap(), Level::INFO);
        logging.level = "DEBUG".into();
        assert_eq!(logging.max_level().unwrap(), Level::DEBUG);
        logging.level = "verbose".into();
        assert!(logging.max_level().is_err());
    }
}
