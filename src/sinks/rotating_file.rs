//! Size-rotated JSON-lines file sink
//!
//! One sink per severity tier. Before each write the sink checks whether the
//! line would push the active file past its size threshold; if so the active
//! file becomes backup `.1`, older backups shift up by one, and the backup
//! beyond the retention count is deleted.

use crate::core::error::{LoggerError, Result};
use crate::core::{fallback, LogLevel, PersistedRecord, Sink};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Size threshold and retention for one rotating file
///
/// # Examples
///
/// ```
/// use tiered_log_pipeline::sinks::RotationPolicy;
///
/// let policy = RotationPolicy::new()
///     .with_max_bytes(20 * 1024 * 1024)
///     .with_backup_count(10);
/// assert!(policy.rotates());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Rotate before a write that would grow the file past this size
    pub max_bytes: u64,
    /// Rotated files to keep; 0 disables rotation
    pub backup_count: usize,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024, // 10 MiB
            backup_count: 5,
        }
    }
}

impl RotationPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_backup_count(mut self, count: usize) -> Self {
        self.backup_count = count;
        self
    }

    /// A policy without a size limit or without backups never rotates
    #[must_use]
    pub fn rotates(&self) -> bool {
        self.max_bytes > 0 && self.backup_count > 0
    }
}

/// Path of backup `index` for `base`: `error.jsonl` -> `error.jsonl.3`
pub fn backup_path(base: &Path, index: usize) -> PathBuf {
    let filename = base
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("app.log");
    base.with_file_name(format!("{}.{}", filename, index))
}

/// # Examples
///
/// ```no_run
/// use tiered_log_pipeline::sinks::{RotatingFileSink, RotationPolicy};
/// use tiered_log_pipeline::LogLevel;
///
/// let policy = RotationPolicy::new().with_max_bytes(5 * 1024 * 1024).with_backup_count(3);
/// let sink = RotatingFileSink::new("logs/debug.jsonl", LogLevel::Debug, policy).unwrap();
/// ```
pub struct RotatingFileSink {
    name: String,
    base_path: PathBuf,
    min_level: LogLevel,
    policy: RotationPolicy,
    writer: Option<BufWriter<File>>,
    current_size: u64,
}

impl RotatingFileSink {
    /// Open (or create) the active file, creating parent directories
    pub fn new<P: AsRef<Path>>(path: P, min_level: LogLevel, policy: RotationPolicy) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();

        if let Some(parent) = base_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    LoggerError::io_operation(
                        "create log directory",
                        format!("Failed to create directory '{}'", parent.display()),
                        e,
                    )
                })?;
            }
        }

        let (file, current_size) = Self::open_active(&base_path)?;
        let name = format!(
            "rotating_file:{}",
            base_path.file_name().and_then(|n| n.to_str()).unwrap_or("log")
        );

        Ok(Self {
            name,
            base_path,
            min_level,
            policy,
            writer: Some(BufWriter::new(file)),
            current_size,
        })
    }

    fn open_active(path: &Path) -> Result<(File, u64)> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                LoggerError::file_sink(path.display().to_string(), format!("Failed to open: {}", e))
            })?;
        let size = file
            .metadata()
            .map_err(|e| {
                LoggerError::file_sink(
                    path.display().to_string(),
                    format!("Cannot access file metadata: {}", e),
                )
            })?
            .len();
        Ok((file, size))
    }

    fn should_rotate(&self, incoming: u64) -> bool {
        self.policy.rotates()
            && self.current_size > 0
            && self.current_size + incoming > self.policy.max_bytes
    }

    /// Close the active file, shift backups, and open a fresh active file
    fn rotate(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to flush before rotation: {}", e),
                )
            })?;
        }

        let oldest = backup_path(&self.base_path, self.policy.backup_count);
        if oldest.exists() {
            fs::remove_file(&oldest).map_err(|e| {
                LoggerError::file_rotation(
                    oldest.display().to_string(),
                    format!("Failed to remove oldest backup: {}", e),
                )
            })?;
        }

        for i in (1..self.policy.backup_count).rev() {
            let old_path = backup_path(&self.base_path, i);
            if old_path.exists() {
                fs::rename(&old_path, backup_path(&self.base_path, i + 1)).map_err(|e| {
                    LoggerError::file_rotation(
                        old_path.display().to_string(),
                        format!("Failed to shift backup: {}", e),
                    )
                })?;
            }
        }

        if self.base_path.exists() {
            fs::rename(&self.base_path, backup_path(&self.base_path, 1)).map_err(|e| {
                LoggerError::file_rotation(
                    self.base_path.display().to_string(),
                    format!("Failed to rotate active file: {}", e),
                )
            })?;
        }

        let (file, size) = Self::open_active(&self.base_path)?;
        self.writer = Some(BufWriter::new(file));
        self.current_size = size;
        Ok(())
    }

    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.base_path
    }

    #[must_use]
    pub fn policy(&self) -> &RotationPolicy {
        &self.policy
    }
}

impl Sink for RotatingFileSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }

    fn write(&mut self, record: &PersistedRecord) -> Result<()> {
        let mut line = record.to_line()?;
        line.push('\n');
        let bytes = line.len() as u64;

        if self.should_rotate(bytes) {
            if let Err(e) = self.rotate() {
                // Keep logging into whatever file we can open
                fallback::report(
                    "WARNING",
                    format_args!("Log rotation failed: {}. Continuing with current file.", e),
                );
                if self.writer.is_none() {
                    let (file, size) = Self::open_active(&self.base_path)?;
                    self.writer = Some(BufWriter::new(file));
                    self.current_size = size;
                }
                // Allow the file to outgrow its limit rather than retry every write
                self.current_size = 0;
            }
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::writer("Writer not initialized"))?;
        writer.write_all(line.as_bytes()).map_err(|e| {
            LoggerError::file_sink(
                self.base_path.display().to_string(),
                format!("Failed to write record: {}", e),
            )
        })?;
        self.current_size += bytes;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush().map_err(|e| {
                LoggerError::file_sink(
                    self.base_path.display().to_string(),
                    format!("Failed to flush: {}", e),
                )
            })?;
        }
        Ok(())
    }
}

impl Drop for RotatingFileSink {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }
}
