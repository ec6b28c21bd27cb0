use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use url::Url;

/// Query parameters that mark a page load as a fresh login.
const LOGIN_MARKERS: &[&str] = &["login", "token", "userId", "syncSession", "sync"];

/// Consumer-provided hooks into the page hosting the session.
///
/// # Example
///
/// ```rust,ignore
/// impl PageHost for WebPage {
///     fn hide_loading_mask(&self) {
///         self.mask.style().set_property("display", "none").ok();
///     }
///
///     fn reload(&self) {
///         self.window.location().reload().ok();
///     }
///     // ...
/// }
/// ```
pub trait PageHost: Send + Sync + 'static {
    /// Cover the UI until the tab's identity is settled.
    fn show_loading_mask(&self);

    fn hide_loading_mask(&self);

    /// Full page reload. Rebuilds all in-memory state and re-runs reconciliation.
    fn reload(&self);

    /// The URL currently shown in the address bar, if the host has one.
    fn current_url(&self) -> Option<Url>;

    /// Replace the visible URL without navigating or adding a history entry.
    fn replace_url(&self, url: Url);
}

/// Loading mask whose hide reaches the host at most once per page load.
pub struct LoadingMask<H> {
    host: Arc<H>,
    hidden: AtomicBool,
}

impl<H: PageHost> LoadingMask<H> {
    #[must_use]
    pub fn new(host: Arc<H>) -> Self {
        Self {
            host,
            hidden: AtomicBool::new(false),
        }
    }

    pub fn show(&self) {
        self.hidden.store(false, Ordering::SeqCst);
        self.host.show_loading_mask();
    }

    /// Hides the mask. Returns `false` if it was already hidden.
    pub fn hide(&self) -> bool {
        if self.hidden.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.host.hide_loading_mask();
        true
    }

    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn host(&self) -> &Arc<H> {
        &self.host
    }
}

/// Independent timer that hides the loading mask after a hard ceiling.
///
/// Dropping a `FailSafe` leaves the timer running; only [`disarm`](Self::disarm)
/// cancels it. Must be armed inside a tokio runtime.
pub struct FailSafe {
    timer: JoinHandle<()>,
}

impl FailSafe {
    #[must_use]
    pub fn arm<H: PageHost>(mask: Arc<LoadingMask<H>>, ceiling: Duration) -> Self {
        let timer = tokio::spawn(async move {
            tokio::time::sleep(ceiling).await;
            if mask.hide() {
                tracing::warn!(
                    ?ceiling,
                    "Session reconciliation exceeded ceiling, loading mask force-hidden"
                );
            }
        });
        Self { timer }
    }

    pub fn disarm(self) {
        self.timer.abort();
    }
}

/// Removes the one-time login markers from `url`.
///
/// Returns `None` when the URL carries none, so callers can skip the
/// history rewrite.
#[must_use]
pub fn strip_login_markers(url: &Url) -> Option<Url> {
    let query = url.query()?;
    let segments: Vec<&str> = query.split('&').collect();
    let kept: Vec<&str> = segments
        .iter()
        .copied()
        .filter(|segment| !is_login_marker(segment))
        .collect();
    if kept.len() == segments.len() {
        return None;
    }

    let mut stripped = url.clone();
    if kept.iter().all(|segment| segment.is_empty()) {
        stripped.set_query(None);
    } else {
        stripped.set_query(Some(&kept.join("&")));
    }
    Some(stripped)
}

/// Compares the decoded key of one raw `key=value` segment.
fn is_login_marker(segment: &str) -> bool {
    let raw_key = segment.split('=').next().unwrap_or_default();
    url::form_urlencoded::parse(raw_key.as_bytes())
        .next()
        .is_some_and(|(key, _)| LOGIN_MARKERS.contains(&key.as_ref()))
}
