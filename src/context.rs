use std::sync::Arc;

use url::Url;

use crate::config::SessionConfig;
use crate::error::Error;
use crate::fetch::AuthFetch;
use crate::page::{LoadingMask, PageHost};
use crate::reconcile::Reconciler;
use crate::store::{TabSession, TabStorage};
use crate::types::{LoginResponse, SessionDescriptor, UserId};

/// Session state of one tab, owned explicitly instead of living in globals.
///
/// Owns the cookie-carrying HTTP client, the tab session and the loading
/// mask, and hands the same instances to the [`Reconciler`] and the
/// [`AuthFetch`], so both see one cookie jar and one tab session.
///
/// ```rust,ignore
/// let ctx = SessionContext::new(SessionConfig::from_env()?, WebSessionStorage::new()?, page)?;
/// if ctx.initialize(page_config_json).await {
///     return; // reloading
/// }
/// let me = ctx.fetch().get(ctx.url("/auth/me")?).await?;
/// ```
pub struct SessionContext<B, H> {
    config: SessionConfig,
    session: Arc<TabSession<B>>,
    mask: Arc<LoadingMask<H>>,
    reconciler: Reconciler<B, H>,
    fetch: AuthFetch<B, H>,
}

impl<B: TabStorage, H: PageHost> SessionContext<B, H> {
    /// Build a context with a fresh cookie-store-enabled HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the client cannot be built, or
    /// [`Error::Url`] / [`Error::InvalidHeader`] if the config is unusable.
    pub fn new(config: SessionConfig, storage: B, host: Arc<H>) -> Result<Self, Error> {
        let http = reqwest::Client::builder().cookie_store(true).build()?;
        Self::with_http_client(config, storage, host, http)
    }

    /// Use a custom HTTP client. It must keep cookies (`cookie_store(true)`
    /// or a shared jar) for the cookie session to work.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] / [`Error::InvalidHeader`] if the config is unusable.
    pub fn with_http_client(
        config: SessionConfig,
        storage: B,
        host: Arc<H>,
        http: reqwest::Client,
    ) -> Result<Self, Error> {
        let session = Arc::new(TabSession::with_keys(
            storage,
            config.token_key.clone(),
            config.user_id_key.clone(),
        ));
        let mask = Arc::new(LoadingMask::new(host.clone()));
        let reconciler = Reconciler::new(
            http.clone(),
            session.clone(),
            mask.clone(),
            config.sync_url()?,
            config.sync_timeout,
            config.fail_safe,
        );
        let fetch = AuthFetch::new(http, session.clone(), host, &config.token_header)?;

        Ok(Self {
            config,
            session,
            mask,
            reconciler,
            fetch,
        })
    }

    /// Page-load entry point. Shows the loading mask and reconciles.
    ///
    /// Returns `true` if the rest of the page must not initialize because a
    /// reload is under way.
    pub async fn initialize(&self, raw_page_config: Option<String>) -> bool {
        self.mask.show();
        self.reconciler.initialize(raw_page_config).await
    }

    /// Forget the tab's identity (logout).
    pub fn reset(&self) {
        self.session.clear();
        tracing::info!("Tab session reset");
    }

    /// Store the identity returned by a programmatic login.
    pub fn adopt_login(&self, login: LoginResponse) {
        let descriptor = SessionDescriptor::from(login);
        self.session.write(&descriptor);
        tracing::info!(user_id = %descriptor.user_id, "Login adopted into tab session");
    }

    #[must_use]
    pub fn current_user(&self) -> Option<UserId> {
        self.session.read().map(|d| d.user_id)
    }

    /// Resolve `path` against the gateway base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if `path` cannot be joined.
    pub fn url(&self, path: &str) -> Result<Url, Error> {
        self.config
            .base_url
            .join(path)
            .map_err(|e| Error::Url(format!("{path}: {e}")))
    }

    #[must_use]
    pub fn fetch(&self) -> &AuthFetch<B, H> {
        &self.fetch
    }

    #[must_use]
    pub fn reconciler(&self) -> &Reconciler<B, H> {
        &self.reconciler
    }

    #[must_use]
    pub fn session(&self) -> &TabSession<B> {
        &self.session
    }

    #[must_use]
    pub fn mask(&self) -> &LoadingMask<H> {
        &self.mask
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}
