//! SQLite-backed alert sink and its read side
//!
//! Only ERROR and CRITICAL records reach this sink. Each becomes one row in
//! `system_alerts`, keyed by a fingerprint of timestamp and message so that a
//! replayed record does not produce a duplicate alert.

use crate::core::error::Result;
use crate::core::{fallback, LogLevel, PersistedRecord, Sink, TimestampFormat};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on waiting for a locked database inside the dispatch worker
const BUSY_TIMEOUT: Duration = Duration::from_millis(250);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS system_alerts (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp   TEXT NOT NULL,
    level       TEXT NOT NULL,
    logger      TEXT NOT NULL,
    message     TEXT NOT NULL,
    details     TEXT,
    fingerprint TEXT NOT NULL UNIQUE
);
CREATE INDEX IF NOT EXISTS idx_system_alerts_timestamp ON system_alerts(timestamp);
";

fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

/// Stable identity of an alert: hash of its timestamp and message
pub fn fingerprint(timestamp: &str, message: &str) -> String {
    let mut hasher = DefaultHasher::new();
    timestamp.hash(&mut hasher);
    message.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Whether an error only means another connection holds the lock
fn is_contention(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked)
    )
}

/// Persists ERROR+ records as alert rows
///
/// A failed insert is reported on stderr. Lock contention only loses that
/// one alert; any other failure disables the sink for good, so a broken
/// database costs the dispatch worker at most one busy timeout.
pub struct DatabaseAlertSink {
    /// `None` when the database could not be opened
    conn: Option<Connection>,
    path: PathBuf,
    min_level: LogLevel,
    disabled: bool,
}

impl DatabaseAlertSink {
    /// Open the alert database; thresholds below ERROR are raised to ERROR
    pub fn open<P: AsRef<Path>>(path: P, min_level: LogLevel) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = open_connection(&path)?;
        Ok(Self {
            conn: Some(conn),
            path,
            min_level: min_level.max(LogLevel::Error),
            disabled: false,
        })
    }

    /// Like [`open`](Self::open), but an unusable database yields a
    /// disabled sink instead of an error
    ///
    /// Pipeline startup uses this so that a missing alert database never
    /// takes the console and file sinks down with it.
    pub fn open_or_disabled<P: AsRef<Path>>(path: P, min_level: LogLevel) -> Self {
        let path = path.as_ref();
        match Self::open(path, min_level) {
            Ok(sink) => sink,
            Err(e) => {
                fallback::report(
                    "CRITICAL",
                    format_args!(
                        "Alert database '{}' unavailable ({}), alert sink disabled",
                        path.display(),
                        e
                    ),
                );
                Self {
                    conn: None,
                    path: path.to_path_buf(),
                    min_level: min_level.max(LogLevel::Error),
                    disabled: true,
                }
            }
        }
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn insert(conn: &Connection, record: &PersistedRecord) -> rusqlite::Result<()> {
        let timestamp = TimestampFormat::Rfc3339.format(&record.timestamp);
        let details = serde_json::json!({
            "module": record.module,
            "function": record.function,
            "line": record.line,
            "thread_name": record.thread_name,
            "task_name": record.task_name,
            "exc_info": record.exc_info,
            "extra": record.extra,
        });

        let mut stmt = conn.prepare_cached(
            "INSERT OR IGNORE INTO system_alerts \
             (timestamp, level, logger, message, details, fingerprint) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        stmt.execute(params![
            timestamp,
            record.level.to_str(),
            record.logger,
            record.message,
            details.to_string(),
            fingerprint(&timestamp, &record.message),
        ])?;
        Ok(())
    }
}

impl Sink for DatabaseAlertSink {
    fn name(&self) -> &str {
        "database_alert"
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }

    fn accepts(&self, level: LogLevel) -> bool {
        !self.disabled && level >= self.min_level
    }

    fn write(&mut self, record: &PersistedRecord) -> Result<()> {
        let Some(conn) = self.conn.as_ref().filter(|_| !self.disabled) else {
            return Ok(());
        };
        let Err(e) = Self::insert(conn, record) else {
            return Ok(());
        };

        if is_contention(&e) {
            fallback::report(
                "WARNING",
                format_args!(
                    "Alert database '{}' busy, alert skipped: [{}] {}",
                    self.path.display(),
                    record.level,
                    record.message
                ),
            );
        } else {
            self.disabled = true;
            fallback::report(
                "CRITICAL",
                format_args!(
                    "Alert database '{}' unavailable, alert sink disabled. Original alert: [{}] {}",
                    self.path.display(),
                    record.level,
                    record.message
                ),
            );
        }
        Err(e.into())
    }
}

/// One persisted alert row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemAlert {
    pub id: i64,
    pub timestamp: String,
    pub level: String,
    pub logger: String,
    pub message: String,
    pub details: Option<String>,
}

/// Alert message and how many times it was recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrequentError {
    pub message: String,
    pub count: i64,
}

/// Read access to the alert table for monitoring views
pub struct AlertStore {
    conn: Connection,
}

impl AlertStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            conn: open_connection(path.as_ref())?,
        })
    }

    /// Most recent alerts first
    pub fn latest_alerts(&self, limit: usize) -> Result<Vec<SystemAlert>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, timestamp, level, logger, message, details FROM system_alerts \
             ORDER BY timestamp DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(SystemAlert {
                id: row.get(0)?,
                timestamp: row.get(1)?,
                level: row.get(2)?,
                logger: row.get(3)?,
                message: row.get(4)?,
                details: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Messages ranked by occurrence, ties by message
    pub fn frequent_errors(&self, limit: usize) -> Result<Vec<FrequentError>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT message, COUNT(*) AS n FROM system_alerts \
             GROUP BY message ORDER BY n DESC, message ASC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(FrequentError {
                message: row.get(0)?,
                count: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn alert_by_fingerprint(&self, fingerprint: &str) -> Result<Option<SystemAlert>> {
        let alert = self
            .conn
            .query_row(
                "SELECT id, timestamp, level, logger, message, details FROM system_alerts \
                 WHERE fingerprint = ?1",
                params![fingerprint],
                |row| {
                    Ok(SystemAlert {
                        id: row.get(0)?,
                        timestamp: row.get(1)?,
                        level: row.get(2)?,
                        logger: row.get(3)?,
                        message: row.get(4)?,
                        details: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(alert)
    }
}
