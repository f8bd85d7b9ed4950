use async_trait::async_trait;
use std::path::PathBuf;
use tracing::info;

use super::traits::EpgFetcher;
use crate::errors::FetchError;
use crate::models::DateRange;

/// Developer mode source: replays a previously saved raw export
pub struct LocalExport {
    path: PathBuf,
}

impl LocalExport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl EpgFetcher for LocalExport {
    async fn fetch_epg(&self, range: &DateRange) -> Result<String, FetchError> {
        info!(
            "Developer mode: reading {} instead of requesting {} to {}",
            self.path.display(),
            range.start,
            range.end
        );
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| FetchError::LocalExport {
                path: self.path.display().to_string(),
                source,
            })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn persists_raw(&self) -> bool {
        false
    }
}
