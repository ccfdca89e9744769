use std::time::Duration;

use url::Url;

use crate::{ConnectError, PopupSize};

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

const ENV_BASE_URL: &str = "INTEGRATION_CONNECT_BASE_URL";
const ENV_POLL_INTERVAL_MS: &str = "INTEGRATION_CONNECT_POLL_INTERVAL_MS";
const ENV_POLL_TIMEOUT_SECS: &str = "INTEGRATION_CONNECT_POLL_TIMEOUT_SECS";
const ENV_HTTP_TIMEOUT_SECS: &str = "INTEGRATION_CONNECT_HTTP_TIMEOUT_SECS";

#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Root of the integrations backend; endpoint paths are joined onto it.
    pub base_url: String,
    pub http_timeout: Option<Duration>,
    pub poll_interval: Duration,
    /// `None` polls for as long as the authorization window stays open.
    pub poll_timeout: Option<Duration>,
    pub popup_size: PopupSize,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ConnectConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http_timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: None,
            popup_size: PopupSize::default(),
        }
    }

    /// Reads overrides from `INTEGRATION_CONNECT_*` environment variables.
    pub fn from_env() -> Result<Self, ConnectError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConnectError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(ENV_BASE_URL).filter(|value| !value.is_empty()) {
            Some(base_url) => Self::new(base_url),
            None => Self::default(),
        };
        if let Some(millis) = parse_number(&lookup, ENV_POLL_INTERVAL_MS)? {
            config.poll_interval = Duration::from_millis(millis);
        }
        if let Some(secs) = parse_number(&lookup, ENV_POLL_TIMEOUT_SECS)? {
            config.poll_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(secs) = parse_number(&lookup, ENV_HTTP_TIMEOUT_SECS)? {
            config.http_timeout = Some(Duration::from_secs(secs));
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = Some(timeout);
        self
    }

    pub fn with_popup_size(mut self, popup_size: PopupSize) -> Self {
        self.popup_size = popup_size;
        self
    }

    pub fn validate(&self) -> Result<(), ConnectError> {
        if self.poll_interval.is_zero() {
            return Err(ConnectError::Config {
                message: "poll interval must be greater than zero".to_string(),
            });
        }
        Url::parse(&self.base_url)?;
        Ok(())
    }

    /// Joins an absolute endpoint path onto the base url, keeping any path
    /// prefix the base url already has.
    pub fn endpoint(&self, path: &str) -> Result<Url, ConnectError> {
        let mut base = Url::parse(&self.base_url)?;
        if !base.path().ends_with('/') {
            let prefixed = format!("{}/", base.path());
            base.set_path(&prefixed);
        }
        Ok(base.join(path.trim_start_matches('/'))?)
    }
}

fn parse_number<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConnectError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key).filter(|value| !value.trim().is_empty()) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|err| ConnectError::Config {
            message: format!("{key}={raw}: {err}"),
        })
}
