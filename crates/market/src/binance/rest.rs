use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, info, warn};
use url::Url;

use common::{Bar, Error, MarketDataProvider, Resolution, Result, Session};

const BASE_URL: &str = "https://api.binance.com";

/// Hard limit on rows per kline request.
const MAX_KLINES_PER_REQUEST: usize = 1000;

/// Retry policy for kline requests. Transport errors, HTTP 429/418 and 5xx
/// are retried with a fixed pause; everything else fails immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// REST market-data client for Binance spot klines.
pub struct BinanceClient {
    base_url: String,
    credentials: Option<(String, String)>,
    retry: RetryPolicy,
    http: Client,
}

impl BinanceClient {
    /// Anonymous client; klines are public.
    pub fn new() -> Result<Self> {
        Ok(Self {
            base_url: BASE_URL.to_string(),
            credentials: None,
            retry: RetryPolicy::default(),
            http: Client::builder()
                .use_rustls_tls()
                .timeout(Duration::from_secs(30))
                .build()
                .map_err(|e| Error::Http(e.to_string()))?,
        })
    }

    /// Attach API credentials. `initialize` then verifies them.
    pub fn with_credentials(mut self, api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.credentials = Some((api_key.into(), secret.into()));
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn sign(secret: &str, query: &str) -> String {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let base = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        Url::parse_with_params(&base, params).map_err(|e| Error::Http(e.to_string()))
    }

    async fn signed_get(&self, path: &str, api_key: &str, secret: &str) -> Result<String> {
        let query = format!("timestamp={}", Utc::now().timestamp_millis());
        let signature = Self::sign(secret, &query);
        let url = format!(
            "{}{}?{query}&signature={signature}",
            self.base_url.trim_end_matches('/'),
            path
        );

        let resp = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", api_key)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Exchange(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }

    /// GET with the retry policy applied.
    async fn get_with_retry(&self, url: &Url) -> Result<String> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.get_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    warn!(attempt, error = %e, backoff = ?self.retry.backoff, "Kline request failed, retrying");
                    tokio::time::sleep(self.retry.backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once(&self, url: &Url) -> Result<String> {
        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if status.is_success() {
            return Ok(body);
        }
        if is_retryable_status(status) {
            // Surfaced as Http so the retry loop treats it as transient.
            return Err(Error::Http(format!("HTTP {status}: {body}")));
        }
        Err(Error::Exchange(format!("HTTP {status}: {body}")))
    }

    async fn klines(
        &self,
        instrument: &str,
        resolution: Resolution,
        start_ms: Option<i64>,
        end_ms: Option<i64>,
        limit: usize,
    ) -> Result<Vec<Bar>> {
        let mut params = vec![
            ("symbol", instrument.to_string()),
            ("interval", resolution.interval_code().to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(start) = start_ms {
            params.push(("startTime", start.to_string()));
        }
        if let Some(end) = end_ms {
            params.push(("endTime", end.to_string()));
        }
        let url = self.endpoint("/api/v3/klines", &params)?;
        debug!(%instrument, %resolution, ?start_ms, ?end_ms, "Requesting klines");

        let body = self.get_with_retry(&url).await?;
        parse_klines(&body)
    }
}

#[async_trait]
impl MarketDataProvider for BinanceClient {
    async fn initialize(&self) -> Result<Session> {
        match &self.credentials {
            Some((api_key, secret)) => {
                self.signed_get("/api/v3/account", api_key, secret).await?;
                info!("Binance session authenticated");
                Ok(Session::new("binance", true))
            }
            None => {
                let url = self.endpoint("/api/v3/ping", &[])?;
                self.get_with_retry(&url).await?;
                info!("Binance session opened without credentials (public market data only)");
                Ok(Session::new("binance", false))
            }
        }
    }

    async fn fetch_range(
        &self,
        _session: &Session,
        instrument: &str,
        resolution: Resolution,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Option<Vec<Bar>>> {
        let end_ms = end.timestamp_millis() - 1;
        let mut cursor = start.timestamp_millis();
        let mut bars = Vec::new();

        while cursor <= end_ms {
            let page = self
                .klines(instrument, resolution, Some(cursor), Some(end_ms), MAX_KLINES_PER_REQUEST)
                .await?;
            let Some(last) = page.last() else { break };
            cursor = last.timestamp.timestamp_millis() + 1;
            let full = page.len() == MAX_KLINES_PER_REQUEST;
            bars.extend(page);
            if !full {
                break;
            }
        }

        Ok(if bars.is_empty() { None } else { Some(bars) })
    }

    async fn fetch_recent(
        &self,
        _session: &Session,
        instrument: &str,
        resolution: Resolution,
        count: usize,
    ) -> Result<Option<Vec<Bar>>> {
        let mut pages: Vec<Vec<Bar>> = Vec::new();
        let mut remaining = count;
        let mut end_ms: Option<i64> = None;

        // Walk backwards from the latest candle.
        while remaining > 0 {
            let limit = remaining.min(MAX_KLINES_PER_REQUEST);
            let page = self.klines(instrument, resolution, None, end_ms, limit).await?;
            let Some(first) = page.first() else { break };
            end_ms = Some(first.timestamp.timestamp_millis() - 1);
            let short = page.len() < limit;
            remaining -= page.len().min(remaining);
            pages.push(page);
            if short {
                break;
            }
        }

        let bars: Vec<Bar> = pages.into_iter().rev().flatten().collect();
        Ok(if bars.is_empty() { None } else { Some(bars) })
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 || status.is_server_error()
}

// ─── Kline JSON parsing ──────────────────────────────────────────────────────

/// Parse the kline array payload:
/// `[[open_time_ms, "open", "high", "low", "close", "volume", close_time_ms, ...], ...]`
pub(crate) fn parse_klines(body: &str) -> Result<Vec<Bar>> {
    let rows: Vec<Vec<Value>> = serde_json::from_str(body)?;
    rows.iter().map(|row| parse_kline_row(row)).collect()
}

fn parse_kline_row(row: &[Value]) -> Result<Bar> {
    if row.len() < 6 {
        return Err(Error::Exchange(format!(
            "kline row has {} fields, expected at least 6",
            row.len()
        )));
    }
    let open_time = row[0]
        .as_i64()
        .ok_or_else(|| Error::Exchange(format!("kline open time is not an integer: {}", row[0])))?;
    let timestamp = Utc
        .timestamp_millis_opt(open_time)
        .single()
        .ok_or_else(|| Error::Exchange(format!("kline open time out of range: {open_time}")))?;

    Ok(Bar {
        timestamp,
        open: number(&row[1], "open")?,
        high: number(&row[2], "high")?,
        low: number(&row[3], "low")?,
        close: number(&row[4], "close")?,
        volume: number(&row[5], "volume")?,
    })
}

fn number(value: &Value, field: &str) -> Result<f64> {
    let parsed = match value {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.ok_or_else(|| Error::Exchange(format!("kline {field} is not numeric: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kline_payload() {
        let body = r#"[
            [1499040000000, "0.01634790", "0.80000000", "0.01575800", "0.01577100", "148976.11427815",
             1499644799999, "2434.19055334", 308, "1756.87402397", "28.46694368", "0"]
        ]"#;
        let bars = parse_klines(body).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].timestamp.timestamp_millis(), 1499040000000);
        assert!((bars[0].close - 0.015771).abs() < 1e-12);
        assert!((bars[0].volume - 148976.11427815).abs() < 1e-6);
    }

    #[test]
    fn rejects_non_numeric_price() {
        let body = r#"[[1499040000000, "abc", "1", "1", "1", "1"]]"#;
        assert!(matches!(parse_klines(body), Err(Error::Exchange(_))));
    }

    #[test]
    fn rejects_short_rows() {
        let body = r#"[[1499040000000, "1", "1"]]"#;
        assert!(matches!(parse_klines(body), Err(Error::Exchange(_))));
    }

    #[test]
    fn signature_is_hex_sha256_hmac() {
        let sig = BinanceClient::sign("secret", "timestamp=1");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
    }
}
