//! Record filters and grouping keys

use crate::core::PersistedRecord;
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Group key for records with no extractable game id
pub const UNCLASSIFIED: &str = "unclassified";

/// How query results are bucketed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    /// Calendar day in UTC, `YYYY-MM-DD`
    #[default]
    Date,
    GameId,
}

impl GroupBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::Date => "date",
            GroupBy::GameId => "game_id",
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "date" => Ok(GroupBy::Date),
            "game_id" => Ok(GroupBy::GameId),
            other => Err(format!("unknown group_by '{}'", other)),
        }
    }
}

fn game_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // `game_id=42`, `game_id: 42`, `game 42`, `game #42`; the bare `game`
        // forms need a digit so that "game over" is not an id
        Regex::new(
            r"(?i)\bgame_id\s*[=:]\s*([A-Za-z0-9_-]+)|\bgame(?:\s+#?|#)([A-Za-z0-9_-]*[0-9][A-Za-z0-9_-]*)",
        )
        .expect("game id pattern is valid")
    })
}

/// First game identifier mentioned in a free-text message
///
/// # Examples
///
/// ```
/// use tiered_log_pipeline::query::extract_game_id;
///
/// assert_eq!(extract_game_id("game_id=42 player=7 timeout"), Some("42"));
/// assert_eq!(extract_game_id("Starting game #17"), Some("17"));
/// assert_eq!(extract_game_id("game over"), None);
/// ```
pub fn extract_game_id(message: &str) -> Option<&str> {
    let caps = game_id_pattern().captures(message)?;
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
}

/// Conjunctive record filter plus grouping choice
///
/// Blank filter values are treated as absent. An empty logger set allows
/// every logger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub group_by: GroupBy,
    pub game_id: Option<String>,
    pub player_id: Option<String>,
    /// Case-insensitive substring of the message
    pub keyword: Option<String>,
    pub loggers: BTreeSet<String>,
}

fn non_blank(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl FilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn group_by(mut self, group_by: GroupBy) -> Self {
        self.group_by = group_by;
        self
    }

    #[must_use]
    pub fn game_id(mut self, game_id: impl Into<String>) -> Self {
        self.game_id = non_blank(game_id);
        self
    }

    #[must_use]
    pub fn player_id(mut self, player_id: impl Into<String>) -> Self {
        self.player_id = non_blank(player_id);
        self
    }

    #[must_use]
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = non_blank(keyword);
        self
    }

    #[must_use]
    pub fn logger(mut self, logger: impl Into<String>) -> Self {
        if let Some(name) = non_blank(logger) {
            self.loggers.insert(name);
        }
        self
    }

    #[must_use]
    pub fn loggers<I, S>(self, loggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        loggers.into_iter().fold(self, |filter, name| filter.logger(name))
    }

    /// Whether a record passes every active filter
    ///
    /// Checks run cheapest first and stop at the first failure.
    pub fn matches(&self, record: &PersistedRecord) -> bool {
        if !self.loggers.is_empty() && !self.loggers.contains(&record.logger) {
            return false;
        }

        if let Some(ref keyword) = self.keyword {
            if !record
                .message
                .to_lowercase()
                .contains(&keyword.to_lowercase())
            {
                return false;
            }
        }

        if let Some(ref game_id) = self.game_id {
            if !Self::mentions(record, "game_id", game_id) {
                return false;
            }
        }

        if let Some(ref player_id) = self.player_id {
            if !Self::mentions(record, "player_id", player_id) {
                return false;
            }
        }

        true
    }

    /// Substring of the message, or exact match on the structured field
    fn mentions(record: &PersistedRecord, field: &str, value: &str) -> bool {
        record.message.contains(value) || record.extra_text(field).as_deref() == Some(value)
    }

    /// Group a matching record falls into
    pub fn group_key(&self, record: &PersistedRecord) -> String {
        match self.group_by {
            GroupBy::Date => record
                .timestamp
                .with_timezone(&Utc)
                .format("%Y-%m-%d")
                .to_string(),
            GroupBy::GameId => record
                .extra_text("game_id")
                .or_else(|| extract_game_id(&record.message).map(str::to_string))
                .unwrap_or_else(|| UNCLASSIFIED.to_string()),
        }
    }
}
