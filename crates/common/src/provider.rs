use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{Bar, Resolution, Result};

/// Handle for one established provider connection.
///
/// Returned by [`MarketDataProvider::initialize`] and passed by reference
/// into every fetch. There is no process-wide connection state.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub provider: String,
    /// True when credentials were verified against the provider.
    pub authenticated: bool,
    pub opened_at: DateTime<Utc>,
}

impl Session {
    pub fn new(provider: impl Into<String>, authenticated: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            provider: provider.into(),
            authenticated,
            opened_at: Utc::now(),
        }
    }
}

/// Abstraction over the source of OHLCV bars.
///
/// `BinanceClient` implements this against the public kline endpoint.
/// Tests implement it with in-memory fixtures.
///
/// `Ok(None)` and `Ok(Some(vec![]))` both mean "no data" and are not errors.
/// Retrying failed requests is the implementor's concern.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Open (and authenticate, when credentials exist) a session.
    async fn initialize(&self) -> Result<Session>;

    /// Bars with `start <= timestamp < end`, oldest first.
    async fn fetch_range(
        &self,
        session: &Session,
        instrument: &str,
        resolution: Resolution,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Vec<Bar>>>;

    /// The most recent `count` bars, oldest first.
    async fn fetch_recent(
        &self,
        session: &Session,
        instrument: &str,
        resolution: Resolution,
        count: usize,
    ) -> Result<Option<Vec<Bar>>>;
}
