//! Query endpoint contract
//!
//! Transport-agnostic: a host web framework hands over the query-string pairs
//! and whatever identity its session layer resolved, and writes back the
//! status and JSON body of the returned `QueryResponse`.

use super::engine::LogQueryEngine;
use super::filter::{FilterSpec, GroupBy};
use super::page::Page;
use crate::core::error::Result;
use serde::Serialize;

/// Groups per page when the caller does not choose
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// The authenticated caller, as resolved by the host's session layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub is_admin: bool,
}

impl Identity {
    pub fn admin(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            is_admin: true,
        }
    }

    pub fn user(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            is_admin: false,
        }
    }
}

/// Parsed query parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// `None` selects the first configured file
    pub log_file: Option<String>,
    pub filter: FilterSpec,
    pub page: usize,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            log_file: None,
            filter: FilterSpec::default(),
            page: 1,
        }
    }
}

impl QueryRequest {
    /// Build a request from decoded query-string pairs
    ///
    /// `selected_loggers` (or `selected_loggers[]`) may repeat. Blank values
    /// count as absent; an unparsable or zero `page` becomes 1 and an unknown
    /// `group_by` falls back to `date`. Unknown parameters are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use tiered_log_pipeline::query::{GroupBy, QueryRequest};
    ///
    /// let request = QueryRequest::from_query_pairs([
    ///     ("log_file", "error.log"),
    ///     ("group_by", "game_id"),
    ///     ("selected_loggers", "app.matchmaking"),
    ///     ("selected_loggers", "app.ws"),
    ///     ("filter_keyword", ""),
    ///     ("page", "abc"),
    /// ]);
    /// assert_eq!(request.filter.group_by, GroupBy::GameId);
    /// assert_eq!(request.filter.loggers.len(), 2);
    /// assert_eq!(request.filter.keyword, None);
    /// assert_eq!(request.page, 1);
    /// ```
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut request = Self::default();
        let mut filter = FilterSpec::new();

        for (key, value) in pairs {
            let value = value.as_ref().trim();
            match key.as_ref() {
                "log_file" if !value.is_empty() => request.log_file = Some(value.to_string()),
                "group_by" => filter = filter.group_by(value.parse().unwrap_or(GroupBy::Date)),
                "filter_game_id" => filter = filter.game_id(value),
                "filter_player_id" => filter = filter.player_id(value),
                "filter_keyword" => filter = filter.keyword(value),
                "selected_loggers" | "selected_loggers[]" => filter = filter.logger(value),
                "page" => request.page = value.parse::<usize>().unwrap_or(1).max(1),
                _ => {}
            }
        }

        request.filter = filter;
        request
    }
}

/// Body for the 401/403 responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// Outcome of one query request
///
/// A file problem is still `Ok`: the page carries `error_message`.
/// Only authentication problems produce a non-200 status.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResponse {
    Ok(Page),
    Unauthorized,
    Forbidden,
}

impl QueryResponse {
    pub fn status(&self) -> u16 {
        match self {
            QueryResponse::Ok(_) => 200,
            QueryResponse::Unauthorized => 401,
            QueryResponse::Forbidden => 403,
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, QueryResponse::Unauthorized | QueryResponse::Forbidden)
    }

    pub fn page(&self) -> Option<&Page> {
        match self {
            QueryResponse::Ok(page) => Some(page),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        let body = match self {
            QueryResponse::Ok(page) => serde_json::to_string(page)?,
            QueryResponse::Unauthorized => serde_json::to_string(&ErrorBody {
                detail: "Not authenticated".to_string(),
            })?,
            QueryResponse::Forbidden => serde_json::to_string(&ErrorBody {
                detail: "Admin privileges required".to_string(),
            })?,
        };
        Ok(body)
    }
}

/// Admin-only query endpoint over a `LogQueryEngine`
pub struct QueryService {
    engine: LogQueryEngine,
    page_size: usize,
}

impl QueryService {
    pub fn new(engine: LogQueryEngine) -> Self {
        Self {
            engine,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn engine(&self) -> &LogQueryEngine {
        &self.engine
    }

    pub fn handle(&self, identity: Option<&Identity>, request: &QueryRequest) -> QueryResponse {
        match identity {
            None => return QueryResponse::Unauthorized,
            Some(who) if !who.is_admin => return QueryResponse::Forbidden,
            Some(_) => {}
        }

        let file = match request.log_file.as_deref().or_else(|| self.engine.default_file()) {
            Some(file) => file,
            None => {
                return QueryResponse::Ok(Page::failed(
                    "No log files are configured",
                    request.page.max(1),
                    self.page_size,
                ))
            }
        };

        QueryResponse::Ok(
            self.engine
                .query(file, &request.filter, request.page, self.page_size),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::LogTarget;
    use std::path::PathBuf;

    fn service() -> QueryService {
        QueryService::new(LogQueryEngine::new(vec![LogTarget {
            name: "missing.log".to_string(),
            path: PathBuf::from("/nonexistent/dir/missing.log"),
        }]))
    }

    #[test]
    fn test_auth_gate() {
        let request = QueryRequest::default();
        assert_eq!(service().handle(None, &request).status(), 401);
        assert_eq!(
            service().handle(Some(&Identity::user("bob")), &request).status(),
            403
        );
        assert_eq!(
            service().handle(Some(&Identity::admin("root")), &request).status(),
            200
        );
    }

    #[test]
    fn test_file_error_is_a_200_with_message() {
        let response = service().handle(Some(&Identity::admin("root")), &QueryRequest::default());
        let page = response.page().unwrap();
        assert!(page.error_message.is_some());
        assert!(page.groups.is_empty());

        let json: serde_json::Value = serde_json::from_str(&response.to_json().unwrap()).unwrap();
        assert_eq!(json["logs"], serde_json::json!({}));
    }

    #[test]
    fn test_no_targets_configured() {
        let service = QueryService::new(LogQueryEngine::default());
        let response = service.handle(Some(&Identity::admin("root")), &QueryRequest::default());
        assert!(response.page().unwrap().is_error());
    }

    #[test]
    fn test_request_parsing() {
        let request = QueryRequest::from_query_pairs(vec![
            ("log_file".to_string(), " ".to_string()),
            ("group_by".to_string(), "weekly".to_string()),
            ("filter_game_id".to_string(), "42".to_string()),
            ("filter_player_id".to_string(), "7".to_string()),
            ("selected_loggers[]".to_string(), "app.ws".to_string()),
            ("page".to_string(), "3".to_string()),
            ("utm_source".to_string(), "x".to_string()),
        ]);
        assert_eq!(request.log_file, None);
        assert_eq!(request.filter.group_by, GroupBy::Date);
        assert_eq!(request.filter.game_id.as_deref(), Some("42"));
        assert_eq!(request.filter.player_id.as_deref(), Some("7"));
        assert!(request.filter.loggers.contains("app.ws"));
        assert_eq!(request.page, 3);

        let zero = QueryRequest::from_query_pairs([("page", "0")]);
        assert_eq!(zero.page, 1);
    }

    #[test]
    fn test_auth_bodies() {
        let body = QueryResponse::Unauthorized.to_json().unwrap();
        assert!(body.contains("Not authenticated"));
        assert!(QueryResponse::Forbidden.is_auth_failure());
    }
}
