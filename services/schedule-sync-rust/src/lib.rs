//! NFL schedule and live score synchronization.
//!
//! Fetches weekly scoreboards from the upstream sports-data API and reconciles
//! them into season/team/game records through a [`storage::GameStore`]:
//! - Response cache in front of a bounded retry loop in front of a pooled client
//! - Team codes resolved through an alias table, teams created lazily
//! - Score-only sync never creates games or touches scheduling fields
//! - Multi-week runs are best-effort: a failed week is logged and skipped

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod espn;
pub mod feed;
pub mod http;
pub mod lifecycle;
pub mod model;
pub mod reconciler;
pub mod resolver;
pub mod retry;
pub mod storage;
pub mod sync;

pub use error::{SyncError, SyncResult, TransportError};
pub use sync::{SyncRequest, SyncService, SyncSettings, SyncTotals};
