//! Read side: filtering, grouping and paging persisted records

pub mod engine;
pub mod filter;
pub mod live_tail;
pub mod page;
pub mod service;

pub use engine::LogQueryEngine;
pub use filter::{extract_game_id, FilterSpec, GroupBy, UNCLASSIFIED};
pub use live_tail::{
    LiveTailPoller, PollError, ServiceSource, TailExit, TailHandle, TailSource,
    LIVE_TAIL_INTERVAL, REAUTH_TARGET,
};
pub use page::{LogGroup, Page};
pub use service::{ErrorBody, Identity, QueryRequest, QueryResponse, QueryService, DEFAULT_PAGE_SIZE};
