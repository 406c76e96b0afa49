use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV observation at a fixed resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Check the canonical OHLCV shape: finite prices, finite non-negative volume.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let prices = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ];
        for (name, value) in prices {
            if !value.is_finite() {
                return Err(format!("{name} is not a finite number ({value})"));
            }
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(format!("volume must be finite and >= 0 ({})", self.volume));
        }
        Ok(())
    }
}

/// Time granularity of a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Resolution {
    pub fn duration(&self) -> Duration {
        match self {
            Resolution::M1 => Duration::minutes(1),
            Resolution::M5 => Duration::minutes(5),
            Resolution::M15 => Duration::minutes(15),
            Resolution::M30 => Duration::minutes(30),
            Resolution::H1 => Duration::hours(1),
            Resolution::H4 => Duration::hours(4),
            Resolution::D1 => Duration::days(1),
        }
    }

    /// Interval code used by kline endpoints ("1m", "4h", ...).
    pub fn interval_code(&self) -> &'static str {
        match self {
            Resolution::M1 => "1m",
            Resolution::M5 => "5m",
            Resolution::M15 => "15m",
            Resolution::M30 => "30m",
            Resolution::H1 => "1h",
            Resolution::H4 => "4h",
            Resolution::D1 => "1d",
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::M1 => write!(f, "M1"),
            Resolution::M5 => write!(f, "M5"),
            Resolution::M15 => write!(f, "M15"),
            Resolution::M30 => write!(f, "M30"),
            Resolution::H1 => write!(f, "H1"),
            Resolution::H4 => write!(f, "H4"),
            Resolution::D1 => write!(f, "D1"),
        }
    }
}

/// Model-derived market signal fed to the parameter recommender.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketSignal {
    /// Share of recent rows the classifier expects to close higher, in `[0, 1]`.
    pub trend_strength: f64,
}

impl MarketSignal {
    pub fn new(trend_strength: f64) -> Self {
        Self { trend_strength }
    }

    /// Build from binary direction predictions. An empty slice yields 0.
    pub fn from_predictions(predictions: &[u8]) -> Self {
        if predictions.is_empty() {
            return Self::new(0.0);
        }
        let ups = predictions.iter().filter(|&&p| p == 1).count();
        Self::new(ups as f64 / predictions.len() as f64)
    }

    /// Trend strength forced into `[0, 1]`; NaN counts as no trend.
    pub fn clamped_trend(&self) -> f64 {
        if self.trend_strength.is_nan() {
            0.0
        } else {
            self.trend_strength.clamp(0.0, 1.0)
        }
    }
}

/// Emitted by the streaming poller whenever the latest bar timestamp changes.
#[derive(Debug, Clone)]
pub struct BarUpdate {
    pub instrument: String,
    pub resolution: Resolution,
    /// The full polled window, oldest first.
    pub bars: Vec<Bar>,
}

impl BarUpdate {
    pub fn latest(&self) -> Option<&Bar> {
        self.bars.last()
    }
}
