//! Log query engine
//!
//! Each query reads the selected file from start to its current end, keeps
//! the records that pass the filter, groups them, and returns one page of
//! groups. Nothing is cached between calls: the files are append-only and
//! may have grown, or rotated, since the last query. A line still being
//! written when the file is read fails to parse and is skipped like any
//! other malformed line.

use super::filter::FilterSpec;
use super::page::{LogGroup, Page};
use crate::core::error::{LoggerError, Result};
use crate::core::{LogTarget, PersistedRecord, PipelineConfig};
use chrono::{DateTime, FixedOffset};
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};

/// Reads the rotating files a pipeline writes
///
/// Only configured targets can be queried, addressed by file name.
///
/// # Examples
///
/// ```no_run
/// use tiered_log_pipeline::query::{FilterSpec, GroupBy, LogQueryEngine};
/// use tiered_log_pipeline::PipelineConfig;
///
/// let engine = LogQueryEngine::from_config(&PipelineConfig::standard("logs"));
/// let filter = FilterSpec::new().group_by(GroupBy::GameId).keyword("timeout");
/// let page = engine.query("error.log", &filter, 1, 10);
/// if let Some(err) = page.error_message {
///     eprintln!("{}", err);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct LogQueryEngine {
    targets: Vec<LogTarget>,
}

impl LogQueryEngine {
    pub fn new(targets: Vec<LogTarget>) -> Self {
        Self { targets }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.file_targets())
    }

    /// Names accepted by `query`, in configuration order
    pub fn available_files(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn default_file(&self) -> Option<&str> {
        self.targets.first().map(|t| t.name.as_str())
    }

    fn resolve(&self, file: &str) -> Result<&LogTarget> {
        self.targets
            .iter()
            .find(|t| t.name == file)
            .ok_or_else(|| LoggerError::other(format!("Log file '{}' is not available", file)))
    }

    /// Every parseable record in `file`, in file order
    pub fn read_records(&self, file: &str) -> Result<Vec<PersistedRecord>> {
        let target = self.resolve(file)?;
        let handle = File::open(&target.path).map_err(|e| {
            LoggerError::io_operation(
                "reading log file",
                format!("Could not read log file '{}'", target.name),
                e,
            )
        })?;

        let mut reader = BufReader::new(handle);
        let mut records = Vec::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf).map_err(|e| {
                LoggerError::io_operation(
                    "reading log file",
                    format!("Could not read log file '{}'", target.name),
                    e,
                )
            })?;
            if read == 0 {
                break;
            }
            // Invalid UTF-8 only spoils its own line
            if let Some(record) = PersistedRecord::parse_line(&String::from_utf8_lossy(&buf)) {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Distinct logger names in `file`, sorted
    pub fn available_loggers(&self, file: &str) -> Result<Vec<String>> {
        let loggers: BTreeSet<String> = self
            .read_records(file)?
            .into_iter()
            .map(|r| r.logger)
            .collect();
        Ok(loggers.into_iter().collect())
    }

    /// Filter, group and paginate `file`
    ///
    /// Pages are 1-based and count groups, not records. A page past the end
    /// is empty rather than an error. Read failures come back in
    /// `Page::error_message`.
    pub fn query(&self, file: &str, filter: &FilterSpec, page: usize, page_size: usize) -> Page {
        let page = page.max(1);
        let page_size = page_size.max(1);

        match self.read_records(file) {
            Ok(records) => paginate(group_records(records, filter), page, page_size),
            Err(e) => Page::failed(e.to_string(), page, page_size),
        }
    }
}

/// Matching records grouped, groups ordered by their newest record
fn group_records(records: Vec<PersistedRecord>, filter: &FilterSpec) -> Vec<LogGroup> {
    let mut matched: Vec<(usize, PersistedRecord)> = records
        .into_iter()
        .enumerate()
        .filter(|(_, record)| filter.matches(record))
        .collect();

    // Newest first; equal timestamps keep the later line first
    matched.sort_by(|(ia, a), (ib, b)| b.timestamp.cmp(&a.timestamp).then(ib.cmp(ia)));

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(DateTime<FixedOffset>, LogGroup)> = Vec::new();
    for (_, record) in matched {
        let key = filter.group_key(&record);
        match index.get(&key) {
            Some(&slot) => groups[slot].1.records.push(record),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((
                    record.timestamp,
                    LogGroup {
                        key,
                        records: vec![record],
                    },
                ));
            }
        }
    }

    groups.sort_by(|(ta, a), (tb, b)| tb.cmp(ta).then_with(|| a.key.cmp(&b.key)));
    groups.into_iter().map(|(_, group)| group).collect()
}

fn paginate(groups: Vec<LogGroup>, page: usize, page_size: usize) -> Page {
    let total_groups = groups.len();
    let total_records = groups.iter().map(|g| g.records.len()).sum();
    let total_pages = total_groups.div_ceil(page_size);

    let groups = groups
        .into_iter()
        .skip((page - 1).saturating_mul(page_size))
        .take(page_size)
        .collect();

    Page {
        groups,
        total_groups,
        total_records,
        page,
        page_size,
        total_pages,
        error_message: None,
    }
}
