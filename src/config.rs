use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};

pub const DEFAULT_USER_AGENT: &str = "YC-Dynamic-Scraper/1.0";
pub const DEFAULT_PROXY_ENDPOINT: &str = "http://api.scraperapi.com";

const DIRECT_TIMEOUT: Duration = Duration::from_secs(30);
const RENDER_TIMEOUT: Duration = Duration::from_secs(60);

/// Runtime settings, sourced from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Settings {
    pub scraperapi_key: Option<String>,
    pub scraperapi_endpoint: String,
    pub limit: usize,
    pub delay: Duration,
    pub batch_size: usize,
    pub fallback_html: bool,
    pub max_pages: usize,
    pub user_agent: String,
    pub direct_timeout: Duration,
    pub render_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scraperapi_key: None,
            scraperapi_endpoint: DEFAULT_PROXY_ENDPOINT.to_string(),
            limit: 500,
            delay: Duration::from_millis(500),
            batch_size: 20,
            fallback_html: true,
            max_pages: 50,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            direct_timeout: DIRECT_TIMEOUT,
            render_timeout: RENDER_TIMEOUT,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup; unset or blank values take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Settings::default();

        let limit = match get("COMPANY_LIMIT") {
            Some(v) => v.parse::<usize>().with_context(|| {
                format!("COMPANY_LIMIT must be a non-negative integer, got {v:?}")
            })?,
            None => defaults.limit,
        };

        let batch_size = match get("BATCH_SAVE") {
            Some(v) => v
                .parse::<usize>()
                .with_context(|| format!("BATCH_SAVE must be a positive integer, got {v:?}"))?,
            None => defaults.batch_size,
        };
        if batch_size == 0 {
            bail!("BATCH_SAVE must be at least 1");
        }

        let delay = match get("DELAY_SECONDS") {
            Some(v) => {
                let secs = v
                    .parse::<f64>()
                    .with_context(|| format!("DELAY_SECONDS must be a number, got {v:?}"))?;
                if !secs.is_finite() || secs < 0.0 {
                    bail!("DELAY_SECONDS must be a finite, non-negative number, got {v:?}");
                }
                Duration::from_secs_f64(secs)
            }
            None => defaults.delay,
        };

        let max_pages = match get("MAX_PAGES") {
            Some(v) => v
                .parse::<usize>()
                .with_context(|| format!("MAX_PAGES must be a non-negative integer, got {v:?}"))?,
            None => defaults.max_pages,
        };

        Ok(Self {
            scraperapi_key: get("SCRAPERAPI_KEY"),
            scraperapi_endpoint: get("SCRAPERAPI_ENDPOINT").unwrap_or(defaults.scraperapi_endpoint),
            limit,
            delay,
            batch_size,
            fallback_html: get("USE_FALLBACK_HTML")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.fallback_html),
            max_pages,
            user_agent: get("USER_AGENT").unwrap_or(defaults.user_agent),
            ..defaults
        })
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.limit, 500);
        assert_eq!(s.batch_size, 20);
        assert_eq!(s.delay, Duration::from_millis(500));
        assert!(s.fallback_html);
        assert!(s.scraperapi_key.is_none());
        assert_eq!(s.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn overrides() {
        let s = settings(&[
            ("SCRAPERAPI_KEY", " abc "),
            ("COMPANY_LIMIT", "10"),
            ("DELAY_SECONDS", "0"),
            ("BATCH_SAVE", "3"),
            ("USE_FALLBACK_HTML", "No"),
        ])
        .unwrap();
        assert_eq!(s.scraperapi_key.as_deref(), Some("abc"));
        assert_eq!(s.limit, 10);
        assert_eq!(s.delay, Duration::ZERO);
        assert_eq!(s.batch_size, 3);
        assert!(!s.fallback_html);
    }

    #[test]
    fn flag_spellings() {
        for v in ["1", "true", "YES"] {
            assert!(parse_flag(v), "{v}");
        }
        for v in ["0", "false", "off"] {
            assert!(!parse_flag(v), "{v}");
        }
    }

    #[test]
    fn rejects_bad_values() {
        assert!(settings(&[("BATCH_SAVE", "0")]).is_err());
        assert!(settings(&[("COMPANY_LIMIT", "lots")]).is_err());
        assert!(settings(&[("DELAY_SECONDS", "-1")]).is_err());
        assert!(settings(&[("DELAY_SECONDS", "NaN")]).is_err());
    }

    #[test]
    fn blank_key_counts_as_unset() {
        let s = settings(&[("SCRAPERAPI_KEY", "   ")]).unwrap();
        assert!(s.scraperapi_key.is_none());
    }
}
