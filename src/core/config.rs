//! Pipeline configuration
//!
//! A pipeline is one bounded queue plus a registry of sinks. Both are plain
//! serde structs so the whole setup can come from a JSON file:
//!
//! ```json
//! {
//!   "queue": { "capacity": 10000, "overflow_policy": { "policy": "drop_oldest" } },
//!   "sinks": [
//!     { "kind": "console", "min_level": "INFO" },
//!     { "kind": "rotating_file", "min_level": "ERROR", "path": "logs/error.log",
//!       "max_bytes": 20971520, "backup_count": 10 }
//!   ]
//! }
//! ```

use super::dispatcher::DEFAULT_QUEUE_CAPACITY;
use super::error::{LoggerError, Result};
use super::log_level::LogLevel;
use super::overflow_policy::OverflowPolicy;
use super::sink::Sink;
use crate::sinks::{ConsoleSink, RotatingFileSink, RotationPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const MIB: u64 = 1024 * 1024;

fn default_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_true() -> bool {
    true
}

fn default_alert_level() -> LogLevel {
    LogLevel::Error
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

/// One sink in the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    Console {
        #[serde(default)]
        min_level: LogLevel,
        #[serde(default = "default_true")]
        use_colors: bool,
    },
    RotatingFile {
        min_level: LogLevel,
        path: PathBuf,
        max_bytes: u64,
        backup_count: usize,
    },
    DatabaseAlert {
        #[serde(default = "default_alert_level")]
        min_level: LogLevel,
        path: PathBuf,
    },
}

impl SinkConfig {
    pub fn min_level(&self) -> LogLevel {
        match self {
            SinkConfig::Console { min_level, .. }
            | SinkConfig::RotatingFile { min_level, .. }
            | SinkConfig::DatabaseAlert { min_level, .. } => *min_level,
        }
    }

    /// Construct the sink this entry describes
    ///
    /// An alert database that cannot be opened yields a disabled alert sink
    /// rather than an error.
    pub fn build(&self) -> Result<Box<dyn Sink>> {
        match self {
            SinkConfig::Console {
                min_level,
                use_colors,
            } => Ok(Box::new(ConsoleSink::new(*min_level).with_colors(*use_colors))),
            SinkConfig::RotatingFile {
                min_level,
                path,
                max_bytes,
                backup_count,
            } => {
                let policy = RotationPolicy::new()
                    .with_max_bytes(*max_bytes)
                    .with_backup_count(*backup_count);
                Ok(Box::new(RotatingFileSink::new(path, *min_level, policy)?))
            }
            #[cfg(feature = "database")]
            SinkConfig::DatabaseAlert { min_level, path } => Ok(Box::new(
                crate::sinks::DatabaseAlertSink::open_or_disabled(path, *min_level),
            )),
            #[cfg(not(feature = "database"))]
            SinkConfig::DatabaseAlert { .. } => Err(LoggerError::config(
                "SinkConfig",
                "database_alert sink requires the \"database\" feature",
            )),
        }
    }
}

/// A rotating file the query engine may read, addressed by file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTarget {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

impl PipelineConfig {
    /// Console plus the DEBUG, INFO and ERROR file tiers and the alert database
    ///
    /// Low-severity tiers see the most volume, so they get the smallest size
    /// limits and the fewest backups.
    ///
    /// # Examples
    ///
    /// ```
    /// use tiered_log_pipeline::PipelineConfig;
    ///
    /// let mut config = PipelineConfig::standard("logs");
    /// assert!(config.validate().is_ok());
    /// assert_eq!(config.file_targets().len(), 3);
    /// ```
    pub fn standard(log_dir: impl AsRef<Path>) -> Self {
        let dir = log_dir.as_ref();
        let mut sinks = vec![
            SinkConfig::Console {
                min_level: LogLevel::Info,
                use_colors: true,
            },
            SinkConfig::RotatingFile {
                min_level: LogLevel::Debug,
                path: dir.join("debug.log"),
                max_bytes: 5 * MIB,
                backup_count: 3,
            },
            SinkConfig::RotatingFile {
                min_level: LogLevel::Info,
                path: dir.join("info.log"),
                max_bytes: 10 * MIB,
                backup_count: 5,
            },
            SinkConfig::RotatingFile {
                min_level: LogLevel::Error,
                path: dir.join("error.log"),
                max_bytes: 20 * MIB,
                backup_count: 10,
            },
        ];
        if cfg!(feature = "database") {
            sinks.push(SinkConfig::DatabaseAlert {
                min_level: LogLevel::Error,
                path: dir.join("alerts.db"),
            });
        }

        Self {
            queue: QueueConfig::default(),
            sinks,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            LoggerError::io_operation(
                "reading pipeline config",
                format!("Failed to read '{}'", path.display()),
                e,
            )
        })?;
        Self::from_json_str(&json)
    }

    /// Check the configuration, raising alert thresholds below ERROR
    pub fn validate(&mut self) -> Result<()> {
        if self.queue.capacity == 0 {
            return Err(LoggerError::config("QueueConfig", "capacity must be positive"));
        }

        for sink in &mut self.sinks {
            match sink {
                SinkConfig::RotatingFile {
                    path, max_bytes, ..
                } => {
                    if *max_bytes == 0 {
                        return Err(LoggerError::config(
                            "SinkConfig",
                            format!("rotating_file '{}' needs max_bytes > 0", path.display()),
                        ));
                    }
                    if path.file_name().is_none() {
                        return Err(LoggerError::config(
                            "SinkConfig",
                            format!("rotating_file path '{}' has no file name", path.display()),
                        ));
                    }
                }
                SinkConfig::DatabaseAlert { min_level, .. } => {
                    *min_level = (*min_level).max(LogLevel::Error);
                }
                SinkConfig::Console { .. } => {}
            }
        }
        Ok(())
    }

    /// Build every configured sink, in registry order
    pub fn build_sinks(&self) -> Result<Vec<Box<dyn Sink>>> {
        self.sinks.iter().map(SinkConfig::build).collect()
    }

    /// Rotating file targets keyed by file name, for the query side
    pub fn file_targets(&self) -> Vec<LogTarget> {
        self.sinks
            .iter()
            .filter_map(|sink| match sink {
                SinkConfig::RotatingFile { path, .. } => Some(LogTarget {
                    name: path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    path: path.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}
