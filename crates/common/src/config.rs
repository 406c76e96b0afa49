use crate::{Error, Result};

/// Process configuration loaded from environment variables at startup.
///
/// Tuning knobs (windows, periods, thresholds) live in the TOML pipeline
/// file whose path is given here; this struct only carries what differs
/// per deployment.
#[derive(Debug, Clone)]
pub struct Config {
    // Exchange credentials. Market data is public, so both are optional.
    pub binance_api_key: Option<String>,
    pub binance_secret: Option<String>,

    // Pipeline config file path
    pub pipeline_config_path: String,

    // EA settings file to tune
    pub settings_path: Option<String>,

    /// Overrides the instrument list from the pipeline file when set.
    pub instruments: Option<Vec<String>>,

    /// Keep polling and re-tuning after the batch run.
    pub live: bool,
}

impl Config {
    /// Load configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let binance_api_key = optional_env("BINANCE_API_KEY");
        let binance_secret = optional_env("BINANCE_SECRET");
        if binance_api_key.is_some() != binance_secret.is_some() {
            return Err(Error::Config(
                "BINANCE_API_KEY and BINANCE_SECRET must be set together".into(),
            ));
        }

        let instruments = optional_env("BARTUNE_INSTRUMENTS").map(|v| parse_list(&v));
        if matches!(&instruments, Some(list) if list.is_empty()) {
            return Err(Error::Config(
                "BARTUNE_INSTRUMENTS is set but names no instrument".into(),
            ));
        }

        let live = match optional_env("BARTUNE_LIVE") {
            Some(v) => parse_bool("BARTUNE_LIVE", &v)?,
            None => false,
        };

        Ok(Config {
            binance_api_key,
            binance_secret,
            pipeline_config_path: optional_env("BARTUNE_CONFIG")
                .unwrap_or_else(|| "config/bartune.toml".to_string()),
            settings_path: optional_env("BARTUNE_SETTINGS"),
            instruments,
            live,
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.binance_api_key.is_some() && self.binance_secret.is_some()
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!(
            "{key} must be a boolean, got: '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_trims_and_uppercases() {
        assert_eq!(parse_list(" btcusdt, ETHUSDT ,,"), vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("X", "Yes").unwrap());
        assert!(!parse_bool("X", "0").unwrap());
        assert!(matches!(parse_bool("X", "maybe"), Err(Error::Config(_))));
    }
}
