use crate::error::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;
use url::Url;

/// Base URL used when `MAPNOTE_API_URL` is not set.
pub const DEFAULT_API_URL: &str = "http://localhost:5183/api/";
/// Seconds before an unanswered request is abandoned.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Seconds a transient notification stays visible.
pub const DEFAULT_NOTIFY_SECS: u64 = 3;

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: Url,
    pub request_timeout: Duration,
    pub notification_duration: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists, ignore if it doesn't
        let _ = dotenv();

        let mut builder = Self::builder();
        if let Ok(url) = env::var("MAPNOTE_API_URL") {
            builder = builder.with_api_url(url);
        }
        if let Ok(secs) = env::var("MAPNOTE_TIMEOUT_SECS") {
            builder = builder.with_timeout_secs(parse_secs("MAPNOTE_TIMEOUT_SECS", &secs)?);
        }
        if let Ok(secs) = env::var("MAPNOTE_NOTIFY_SECS") {
            builder = builder.with_notification_secs(parse_secs("MAPNOTE_NOTIFY_SECS", &secs)?);
        }
        builder.build()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

fn parse_secs(var: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Config(format!("{var} must be a whole number of seconds, got {value:?}")))
}

/// Builder for [`Config`], used by the CLI to apply flag overrides.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    api_url: Option<String>,
    timeout_secs: Option<u64>,
    notification_secs: Option<u64>,
}

impl ConfigBuilder {
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_notification_secs(mut self, secs: u64) -> Self {
        self.notification_secs = Some(secs);
        self
    }

    pub fn build(self) -> Result<Config> {
        let api_base_url = normalize_base_url(self.api_url.as_deref().unwrap_or(DEFAULT_API_URL))?;

        if self.timeout_secs == Some(0) {
            return Err(AppError::config("request timeout must be at least one second"));
        }

        Ok(Config {
            api_base_url,
            request_timeout: Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            notification_duration: Duration::from_secs(
                self.notification_secs.unwrap_or(DEFAULT_NOTIFY_SECS),
            ),
        })
    }
}

/// Parses a base URL and makes sure it ends with `/` so that joins append.
fn normalize_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| AppError::Config(format!("Invalid API URL {raw:?}: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::Config(format!(
            "API URL must use http or https, got {}",
            url.scheme()
        )));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = Config::builder().build().unwrap();
        assert_eq!(config.api_base_url.as_str(), DEFAULT_API_URL);
        assert_eq!(config.notification_duration, Duration::from_secs(3));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let config = Config::builder()
            .with_api_url("https://geo.example.com/api")
            .build()
            .unwrap();
        assert_eq!(config.api_base_url.as_str(), "https://geo.example.com/api/");
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert!(Config::builder().with_api_url("not a url").build().is_err());
        assert!(Config::builder().with_api_url("ftp://host/api/").build().is_err());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        assert!(Config::builder().with_timeout_secs(0).build().is_err());
    }
}
