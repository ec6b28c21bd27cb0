use std::time::Duration;

use url::Url;

use crate::error::Error;

/// Tab-session protocol configuration.
///
/// The gateway base URL is a constructor parameter; everything else has a
/// default. Use [`from_env()`](SessionConfig::from_env) for convention-based
/// setup, or [`new()`](SessionConfig::new) with `with_*` methods.
///
/// ```rust,ignore
/// use tab_session::SessionConfig;
///
/// let config = SessionConfig::new("https://gateway.example.com".parse()?)
///     .with_token_header("x-tab-token")
///     .with_fail_safe(std::time::Duration::from_secs(3));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct SessionConfig {
    pub(crate) base_url: Url,
    pub(crate) sync_path: String,
    pub(crate) token_header: String,
    pub(crate) sync_timeout: Duration,
    pub(crate) fail_safe: Duration,
    pub(crate) token_key: String,
    pub(crate) user_id_key: String,
}

impl SessionConfig {
    /// Create config for the gateway at `base_url`.
    ///
    /// All optional fields use defaults. Override with `with_*` methods.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            sync_path: "/auth/sync".into(),
            token_header: "x-session-token".into(),
            sync_timeout: Duration::from_secs(10),
            fail_safe: Duration::from_secs(5),
            token_key: "token".into(),
            user_id_key: "userId".into(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `TAB_SESSION_BASE_URL`: gateway base URL
    ///
    /// # Optional env vars
    /// - `TAB_SESSION_SYNC_PATH`: resync endpoint path (default `/auth/sync`)
    /// - `TAB_SESSION_TOKEN_HEADER`: header carrying the tab token (default `x-session-token`)
    /// - `TAB_SESSION_SYNC_TIMEOUT_MS`: resync request timeout in milliseconds (default `10000`)
    /// - `TAB_SESSION_FAILSAFE_MS`: loading-mask ceiling in milliseconds (default `5000`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL is missing or any value is invalid.
    pub fn from_env() -> Result<Self, Error> {
        let base_url_str = std::env::var("TAB_SESSION_BASE_URL")
            .map_err(|_| Error::Config("TAB_SESSION_BASE_URL is required".into()))?;
        let base_url: Url = base_url_str
            .parse()
            .map_err(|e| Error::Config(format!("TAB_SESSION_BASE_URL: {e}")))?;

        let mut config = Self::new(base_url);

        if let Ok(path) = std::env::var("TAB_SESSION_SYNC_PATH") {
            config = config.with_sync_path(path);
        }
        if let Ok(header) = std::env::var("TAB_SESSION_TOKEN_HEADER") {
            if reqwest::header::HeaderName::from_bytes(header.as_bytes()).is_err() {
                return Err(Error::Config(format!(
                    "TAB_SESSION_TOKEN_HEADER: invalid header name '{header}'"
                )));
            }
            config = config.with_token_header(header);
        }
        if let Ok(ms) = std::env::var("TAB_SESSION_SYNC_TIMEOUT_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|e| Error::Config(format!("TAB_SESSION_SYNC_TIMEOUT_MS: {e}")))?;
            config = config.with_sync_timeout(Duration::from_millis(ms));
        }
        if let Ok(ms) = std::env::var("TAB_SESSION_FAILSAFE_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|e| Error::Config(format!("TAB_SESSION_FAILSAFE_MS: {e}")))?;
            config = config.with_fail_safe(Duration::from_millis(ms));
        }

        Ok(config)
    }

    /// Override the resync endpoint path (default `/auth/sync`).
    #[must_use]
    pub fn with_sync_path(mut self, path: impl Into<String>) -> Self {
        self.sync_path = path.into();
        self
    }

    /// Override the header carrying the tab token (default `x-session-token`).
    #[must_use]
    pub fn with_token_header(mut self, header: impl Into<String>) -> Self {
        self.token_header = header.into();
        self
    }

    /// Override the resync request timeout (default 10 s).
    ///
    /// A resync that times out counts as failed: the tab session is cleared
    /// and initialization continues.
    #[must_use]
    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }

    /// Override the loading-mask ceiling (default 5 s).
    #[must_use]
    pub fn with_fail_safe(mut self, ceiling: Duration) -> Self {
        self.fail_safe = ceiling;
        self
    }

    /// Override the tab-storage key names (default `token` / `userId`).
    #[must_use]
    pub fn with_storage_keys(
        mut self,
        token_key: impl Into<String>,
        user_id_key: impl Into<String>,
    ) -> Self {
        self.token_key = token_key.into();
        self.user_id_key = user_id_key.into();
        self
    }

    /// Gateway base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Header carrying the tab token.
    #[must_use]
    pub fn token_header(&self) -> &str {
        &self.token_header
    }

    /// Resync request timeout.
    #[must_use]
    pub fn sync_timeout(&self) -> Duration {
        self.sync_timeout
    }

    /// Loading-mask ceiling.
    #[must_use]
    pub fn fail_safe(&self) -> Duration {
        self.fail_safe
    }

    /// Absolute URL of the resync endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if the sync path cannot be joined onto the base URL.
    pub fn sync_url(&self) -> Result<Url, Error> {
        self.base_url
            .join(&self.sync_path)
            .map_err(|e| Error::Url(format!("{}: {e}", self.sync_path)))
    }
}
