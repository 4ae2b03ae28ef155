use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

use konect_types::RoomId;

/// Client settings, read from the environment (and `.env` when the binary
/// loads one).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: Url,
    pub session_path: PathBuf,
    pub history_limit: u32,
    pub notice_ttl: Duration,
}

const DEFAULT_SERVER_URL: &str = "http://localhost:3000";

impl ClientConfig {
    /// Settings for `server_url` with every other field at its default.
    pub fn new(server_url: Url) -> Self {
        Self {
            server_url,
            session_path: PathBuf::from("konect-session.json"),
            history_limit: 50,
            notice_ttl: Duration::from_secs(5),
        }
    }

    pub fn from_env() -> Result<Self> {
        let raw_url =
            std::env::var("KONECT_SERVER_URL").unwrap_or_else(|_| DEFAULT_SERVER_URL.into());
        let defaults = Self::new(
            Url::parse(&raw_url)
                .with_context(|| format!("invalid KONECT_SERVER_URL '{}'", raw_url))?,
        );

        let session_path = std::env::var("KONECT_SESSION_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.session_path);
        let history_limit: u32 = std::env::var("KONECT_HISTORY_LIMIT")
            .unwrap_or_else(|_| defaults.history_limit.to_string())
            .parse()
            .context("invalid KONECT_HISTORY_LIMIT")?;
        let notice_secs: u64 = std::env::var("KONECT_NOTICE_SECS")
            .unwrap_or_else(|_| defaults.notice_ttl.as_secs().to_string())
            .parse()
            .context("invalid KONECT_NOTICE_SECS")?;

        Ok(Self {
            server_url: defaults.server_url,
            session_path,
            history_limit,
            notice_ttl: Duration::from_secs(notice_secs),
        })
    }

    /// Push channel endpoint for a room: same host, `ws`/`wss` scheme.
    pub fn channel_url(&self, room_id: &RoomId) -> Result<Url> {
        channel_url(&self.server_url, room_id)
    }
}

pub(crate) fn channel_url(server_url: &Url, room_id: &RoomId) -> Result<Url> {
    let mut url = server_url.join(&format!("/ws/{}", room_id))?;
    let scheme = if server_url.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(scheme)
        .map_err(|_| anyhow::anyhow!("cannot use scheme {} for {}", scheme, url))?;
    Ok(url)
}
