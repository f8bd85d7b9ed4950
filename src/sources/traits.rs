//! Upstream fetch abstraction
//!
//! The scheduler only knows it can ask for a date range and get back the
//! provider's raw export. Tests substitute a mock.

use async_trait::async_trait;

use crate::errors::FetchError;
use crate::models::DateRange;

/// Source of the raw provider EPG export
#[async_trait]
pub trait EpgFetcher: Send + Sync {
    /// Download the export covering `range` (both ends inclusive)
    async fn fetch_epg(&self, range: &DateRange) -> Result<String, FetchError>;

    /// Short label used in logs
    fn describe(&self) -> String;

    /// Whether the returned document should be saved as the raw artifact
    ///
    /// False for sources that already read the raw artifact itself.
    fn persists_raw(&self) -> bool {
        true
    }
}
