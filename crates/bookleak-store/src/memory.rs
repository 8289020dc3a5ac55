//! Non-persistent cache for tests and one-off runs.

use bookleak_core::{ArchiveId, ArchiveStore, CacheError, EvalCache, EvalRequest, Game, Score};
use dashmap::DashMap;

/// In-memory [`EvalCache`] and [`ArchiveStore`].
///
/// Sharded maps keep lookups on one key from waiting on writes to another.
#[derive(Debug, Default)]
pub struct MemoryCache {
    evals: DashMap<EvalRequest, Score>,
    complete: DashMap<ArchiveId, bool>,
    archives: DashMap<ArchiveId, Vec<Game>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached evaluations.
    pub fn len(&self) -> usize {
        self.evals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evals.is_empty()
    }
}

impl EvalCache for MemoryCache {
    fn lookup(&self, request: &EvalRequest) -> Result<Option<Score>, CacheError> {
        Ok(self.evals.get(request).map(|s| s.value().clone()))
    }

    fn store(&self, request: &EvalRequest, score: &Score) -> Result<(), CacheError> {
        self.evals.insert(request.clone(), score.clone());
        Ok(())
    }

    fn is_month_complete(&self, archive: &ArchiveId) -> Result<bool, CacheError> {
        Ok(self.complete.get(archive).is_some_and(|c| *c))
    }

    fn mark_month_complete(&self, archive: &ArchiveId) -> Result<(), CacheError> {
        self.complete.insert(archive.clone(), true);
        Ok(())
    }
}

impl ArchiveStore for MemoryCache {
    fn load_archive(&self, archive: &ArchiveId) -> Result<Option<Vec<Game>>, CacheError> {
        Ok(self.archives.get(archive).map(|g| g.value().clone()))
    }

    fn save_archive(&self, archive: &ArchiveId, games: &[Game]) -> Result<(), CacheError> {
        self.archives.insert(archive.clone(), games.to_vec());
        Ok(())
    }
}
