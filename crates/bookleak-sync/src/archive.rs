//! Month-by-month game collection with archive reuse.

use async_trait::async_trait;
use bookleak_core::{ArchiveId, ArchiveStore, Game, Month, archive_reusable};
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::SyncError;

/// Where monthly game archives come from.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Months that have an archive, oldest first.
    async fn months(&self, player: &str) -> Result<Vec<Month>, SyncError>;

    async fn fetch_month(&self, player: &str, month: Month) -> Result<Vec<Game>, SyncError>;
}

#[derive(Debug, Clone)]
pub struct CollectOptions {
    /// Ignore cached archives (fetched months are still written back).
    pub no_cache: bool,
    pub today: NaiveDate,
    /// Concurrent month downloads.
    pub concurrency: usize,
    /// Skip months before this one.
    pub since: Option<Month>,
}

impl CollectOptions {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            no_cache: false,
            today,
            concurrency: 4,
            since: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct Collected {
    /// Ordered by end time, then id.
    pub games: Vec<Game>,
    pub fetched: usize,
    pub reused: usize,
    pub failed: Vec<(Month, String)>,
}

fn cached_games(
    store: &dyn ArchiveStore,
    id: &ArchiveId,
    options: &CollectOptions,
) -> Option<Vec<Game>> {
    if options.no_cache {
        return None;
    }
    let complete = match store.is_month_complete(id) {
        Ok(flag) => flag,
        Err(e) => {
            warn!(archive = %id, error = %e, "month flag unreadable, refetching");
            return None;
        }
    };
    if !archive_reusable(options.today, id.month(), complete) {
        return None;
    }
    match store.load_archive(id) {
        Ok(games) => games,
        Err(e) => {
            warn!(archive = %id, error = %e, "cached archive unreadable, refetching");
            None
        }
    }
}

/// Collect every game of `player`, reusing completed past months from `store`.
///
/// Listing the archives is the only fatal step; a month that fails to download is
/// logged and reported in [`Collected::failed`].
pub async fn collect_games(
    source: &dyn ArchiveSource,
    store: &dyn ArchiveStore,
    player: &str,
    options: &CollectOptions,
) -> Result<Collected, SyncError> {
    let months: Vec<Month> = source
        .months(player)
        .await?
        .into_iter()
        .filter(|m| options.since.is_none_or(|since| *m >= since))
        .collect();

    let mut collected = Collected::default();
    let mut to_fetch = Vec::new();
    for month in months {
        let id = ArchiveId::new(player, month);
        match cached_games(store, &id, options) {
            Some(games) => {
                debug!(archive = %id, games = games.len(), "reusing cached archive");
                collected.reused += 1;
                collected.games.extend(games);
            }
            None => to_fetch.push(id),
        }
    }

    let results: Vec<_> = stream::iter(to_fetch)
        .map(|id| async move {
            let games = source.fetch_month(player, id.month()).await;
            (id, games)
        })
        .buffer_unordered(options.concurrency.max(1))
        .collect()
        .await;

    for (id, result) in results {
        match result {
            Ok(games) => {
                if let Err(e) = store.save_archive(&id, &games) {
                    warn!(archive = %id, error = %e, "archive not cached");
                } else if let Err(e) = store.mark_month_complete(&id) {
                    warn!(archive = %id, error = %e, "month not marked complete");
                }
                collected.fetched += 1;
                collected.games.extend(games);
            }
            Err(e) => {
                warn!(archive = %id, error = %e, "skipping month");
                collected.failed.push((id.month(), e.to_string()));
            }
        }
    }

    collected.failed.sort_by_key(|(month, _)| *month);
    collected
        .games
        .sort_by(|a, b| a.played_at.cmp(&b.played_at).then_with(|| a.id.cmp(&b.id)));
    info!(
        player,
        games = collected.games.len(),
        fetched = collected.fetched,
        reused = collected.reused,
        failed = collected.failed.len(),
        "collected games"
    );
    Ok(collected)
}
