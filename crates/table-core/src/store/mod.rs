//! Match record persistence.
//!
//! The table manager reads a match's configuration before handling a request
//! and writes back what it learns (dealer ports, parsed game definition).

pub mod atomic;
mod json;

pub use json::JsonMatchStore;

use crate::error::Result;
use crate::models::{MatchId, MatchRecord};
use async_trait::async_trait;

/// Storage for match records.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Load the record for `match_id`. Fails with `MatchNotFound` if absent.
    async fn load_match(&self, match_id: &MatchId) -> Result<MatchRecord>;

    /// Save the record, replacing any previous version.
    async fn save_match(&self, record: &MatchRecord) -> Result<()>;

    /// Drop records no longer worth keeping. Returns how many were removed.
    async fn delete_irrelevant_matches(&self) -> Result<usize>;
}
