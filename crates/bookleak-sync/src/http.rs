//! HTTP client for the Chess.com published-data API.

use async_trait::async_trait;
use bookleak_core::{Game, Month};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::SyncError;
use crate::archive::ArchiveSource;
use crate::chesscom::{ArchiveList, MonthArchive};

pub const DEFAULT_BASE_URL: &str = "https://api.chess.com/pub";

/// The API rejects requests without a user agent.
const USER_AGENT: &str = concat!("bookleak/", env!("CARGO_PKG_VERSION"));

pub struct ChessComClient {
    client: reqwest::Client,
    base_url: String,
}

impl ChessComClient {
    /// `base_url` should be like `https://api.chess.com/pub` (no trailing slash).
    pub fn new(base_url: impl Into<String>) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn archives_url(&self, player: &str) -> String {
        format!(
            "{}/player/{}/games/archives",
            self.base_url,
            player.trim().to_lowercase()
        )
    }

    fn month_url(&self, player: &str, month: Month) -> String {
        format!(
            "{}/player/{}/games/{:04}/{:02}",
            self.base_url,
            player.trim().to_lowercase(),
            month.year(),
            month.month()
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SyncError> {
        debug!(url = %url, "GET");
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl ArchiveSource for ChessComClient {
    async fn months(&self, player: &str) -> Result<Vec<Month>, SyncError> {
        let list: ArchiveList = self.get_json(&self.archives_url(player)).await?;
        let months = list.months();
        info!(player, count = months.len(), "listed monthly archives");
        Ok(months)
    }

    async fn fetch_month(&self, player: &str, month: Month) -> Result<Vec<Game>, SyncError> {
        let archive: MonthArchive = self.get_json(&self.month_url(player, month)).await?;
        let total = archive.games.len();
        let games: Vec<Game> = archive
            .games
            .into_iter()
            .filter_map(|raw| {
                let url = raw.url.clone();
                match raw.into_game(player) {
                    Ok(game) => Some(game),
                    Err(e) => {
                        warn!(game = %url, error = %e, "skipping game");
                        None
                    }
                }
            })
            .collect();
        info!(player, %month, total, kept = games.len(), "fetched archive");
        Ok(games)
    }
}
