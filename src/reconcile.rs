//! Page-load reconciliation of the tab session against the cookie session.
//!
//! The server renders its cookie identity into the page as a
//! [`PageSessionConfig`]. The tab remembers its own identity in a
//! [`TabSession`]. Tabs of one browser share the cookie but not the tab
//! session, so after another tab logs in as someone else the two disagree.
//! [`Reconciler::initialize`] runs once per page load, before anything else,
//! and either brings them back into agreement or reloads the page.
//!
//! | Tab session       | Page config                    | Action                          |
//! |-------------------|--------------------------------|---------------------------------|
//! | any               | absent / malformed             | continue                        |
//! | any               | `syncSession` + token          | adopt page, strip URL markers   |
//! | empty             | present                        | adopt page                      |
//! | same user id      | present                        | continue                        |
//! | other user id     | present, not a fresh login     | resync cookie, reload or clear  |

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::error::Error;
use crate::page::{FailSafe, LoadingMask, PageHost, strip_login_markers};
use crate::store::{TabSession, TabStorage};
use crate::types::{PageSessionConfig, SessionDescriptor, SessionToken};

/// What reconciliation decided to do with the tab session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The page carries no session config (anonymous page).
    NoPageSession,
    /// The page load follows a login: the page identity wins.
    ///
    /// `None` if the page sent a token without a user id; the tab session is
    /// cleared then.
    FreshLogin(Option<SessionDescriptor>),
    /// First load in this tab: adopt the page identity.
    ///
    /// `None` if the page identity is incomplete.
    FirstLoad(Option<SessionDescriptor>),
    /// Tab and cookie agree.
    InSync,
    /// Tab and cookie disagree: push the tab's identity back into the cookie.
    Resync { remembered: SessionDescriptor },
}

/// Result of a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Safe to initialize the rest of the page.
    Continue,
    /// A reload is under way; initialization must stop now.
    Stop,
}

impl Outcome {
    #[must_use]
    pub fn should_stop(self) -> bool {
        matches!(self, Self::Stop)
    }
}

/// Decides how to reconcile `tab` with `page`. Performs no I/O.
///
/// A fresh login is checked before the tab session is consulted, so a
/// mismatch explained by a login never triggers a resync.
#[must_use]
pub fn decide(page: Option<&PageSessionConfig>, tab: Option<&SessionDescriptor>) -> Decision {
    let Some(page) = page else {
        return Decision::NoPageSession;
    };
    if page.is_fresh_login() {
        return Decision::FreshLogin(page.descriptor());
    }
    let Some(tab) = tab else {
        return Decision::FirstLoad(page.descriptor());
    };
    if page.user_id.as_ref() == Some(&tab.user_id) {
        return Decision::InSync;
    }
    Decision::Resync {
        remembered: tab.clone(),
    }
}

#[derive(Serialize)]
struct SyncRequest<'a> {
    token: &'a SessionToken,
}

/// Runs the page-load reconciliation protocol.
///
/// Holds a plain HTTP client, never an [`AuthFetch`](crate::fetch::AuthFetch):
/// the resync call must not go through stale-token recovery, which would
/// reload the page and re-enter reconciliation.
pub struct Reconciler<B, H> {
    http: reqwest::Client,
    session: Arc<TabSession<B>>,
    mask: Arc<LoadingMask<H>>,
    sync_url: Url,
    sync_timeout: Duration,
    fail_safe: Duration,
}

// Manual Clone: avoid derive adding `B: Clone, H: Clone` bounds.
impl<B, H> Clone for Reconciler<B, H> {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            session: self.session.clone(),
            mask: self.mask.clone(),
            sync_url: self.sync_url.clone(),
            sync_timeout: self.sync_timeout,
            fail_safe: self.fail_safe,
        }
    }
}

impl<B: TabStorage, H: PageHost> Reconciler<B, H> {
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        session: Arc<TabSession<B>>,
        mask: Arc<LoadingMask<H>>,
        sync_url: Url,
        sync_timeout: Duration,
        fail_safe: Duration,
    ) -> Self {
        Self {
            http,
            session,
            mask,
            sync_url,
            sync_timeout,
            fail_safe,
        }
    }

    /// Reconcile under the fail-safe timer. Returns `true` if page
    /// initialization must stop because a reload is under way.
    ///
    /// Never fails: a panicking reconciliation is logged and treated as
    /// "continue".
    pub async fn initialize(&self, raw_page_config: Option<String>) -> bool {
        let fail_safe = FailSafe::arm(self.mask.clone(), self.fail_safe);

        let this = self.clone();
        let run = tokio::spawn(async move { this.run(raw_page_config.as_deref()).await });
        let outcome = match run.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Session reconciliation aborted");
                self.mask.hide();
                Outcome::Continue
            }
        };

        fail_safe.disarm();
        outcome.should_stop()
    }

    /// One reconciliation pass without the fail-safe timer.
    ///
    /// Hides the loading mask on every [`Outcome::Continue`].
    pub async fn run(&self, raw_page_config: Option<&str>) -> Outcome {
        let page = match raw_page_config.map(PageSessionConfig::parse).transpose() {
            Ok(page) => page.flatten(),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Malformed page session config, skipping reconciliation"
                );
                None
            }
        };

        let tab = self.session.read();
        let decision = decide(page.as_ref(), tab.as_ref());
        let outcome = self.apply(decision).await;

        if outcome == Outcome::Continue {
            self.mask.hide();
        }
        outcome
    }

    async fn apply(&self, decision: Decision) -> Outcome {
        match decision {
            Decision::NoPageSession => {
                tracing::debug!("No page session config");
                Outcome::Continue
            }
            Decision::FreshLogin(descriptor) => {
                match descriptor {
                    Some(descriptor) => {
                        self.session.write(&descriptor);
                        tracing::info!(
                            user_id = %descriptor.user_id,
                            "Fresh login adopted into tab session"
                        );
                    }
                    None => {
                        // The previous identity is no longer the cookie's; the next
                        // ordinary load adopts the cookie session as a first load.
                        self.session.clear();
                        tracing::warn!("Fresh login without user id, tab session cleared");
                    }
                }
                self.strip_login_markers();
                Outcome::Continue
            }
            Decision::FirstLoad(Some(descriptor)) => {
                self.session.write(&descriptor);
                tracing::info!(
                    user_id = %descriptor.user_id,
                    "Cookie session adopted into new tab"
                );
                Outcome::Continue
            }
            Decision::FirstLoad(None) => {
                tracing::debug!("Page session incomplete, nothing to adopt");
                Outcome::Continue
            }
            Decision::InSync => Outcome::Continue,
            Decision::Resync { remembered } => {
                tracing::warn!(
                    user_id = %remembered.user_id,
                    "Cookie session does not match tab session, resyncing"
                );
                match self.resync(&remembered.token).await {
                    Ok(()) => {
                        tracing::info!(user_id = %remembered.user_id, "Cookie resynced, reloading");
                        self.mask.host().reload();
                        Outcome::Stop
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Resync failed, clearing tab session");
                        self.session.clear();
                        Outcome::Continue
                    }
                }
            }
        }
    }

    async fn resync(&self, token: &SessionToken) -> Result<(), Error> {
        self.http
            .post(self.sync_url.clone())
            .timeout(self.sync_timeout)
            .json(&SyncRequest { token })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    fn strip_login_markers(&self) {
        let host = self.mask.host();
        if let Some(stripped) = host.current_url().as_ref().and_then(strip_login_markers) {
            host.replace_url(stripped);
        }
    }
}
