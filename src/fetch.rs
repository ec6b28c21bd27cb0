use std::sync::Arc;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use url::Url;

use crate::error::Error;
use crate::page::PageHost;
use crate::store::{TabSession, TabStorage};

/// Method, headers and body of a request sent through [`AuthFetch`].
///
/// Headers are normalized into a [`HeaderMap`] as they are added. The body is
/// buffered so the request can be re-sent on stale-token recovery.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    method: Method,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl FetchOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add one header, replacing any previous value of the same name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if the name or value is not valid HTTP.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, Error> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Add headers from any `(name, value)` collection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] on the first invalid name or value.
    pub fn headers<I, K, V>(self, headers: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        headers
            .into_iter()
            .try_fold(self, |opts, (k, v)| opts.header(k.as_ref(), v.as_ref()))
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body and set `Content-Type`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if `value` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, Error> {
        self.body = Some(serde_json::to_vec(value)?);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    #[must_use]
    pub fn header_map(&self) -> &HeaderMap {
        &self.headers
    }
}

/// HTTP client that sends the tab token alongside the ambient cookies.
///
/// A 401 or 400 on a request that carried a token is treated as a stale
/// token: the tab session is cleared and the request is re-sent once with
/// cookies only. If that retry succeeds the page is reloaded so every module
/// rebuilds against the cookie identity.
///
/// ```rust,ignore
/// let response = auth_fetch
///     .fetch(url, FetchOptions::new().method(Method::POST).json(&body)?)
///     .await?;
/// if response.status().is_success() { /* ... */ }
/// ```
pub struct AuthFetch<B, H> {
    http: reqwest::Client,
    session: Arc<TabSession<B>>,
    host: Arc<H>,
    token_header: HeaderName,
}

// Manual Clone: avoid derive adding `B: Clone, H: Clone` bounds.
impl<B, H> Clone for AuthFetch<B, H> {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            session: self.session.clone(),
            host: self.host.clone(),
            token_header: self.token_header.clone(),
        }
    }
}

impl<B: TabStorage, H: PageHost> AuthFetch<B, H> {
    /// `http` must carry the cookie store shared with the rest of the page.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if `token_header` is not a valid header name.
    pub fn new(
        http: reqwest::Client,
        session: Arc<TabSession<B>>,
        host: Arc<H>,
        token_header: &str,
    ) -> Result<Self, Error> {
        let token_header = HeaderName::from_bytes(token_header.as_bytes())
            .map_err(|e| Error::InvalidHeader(format!("{token_header}: {e}")))?;
        Ok(Self {
            http,
            session,
            host,
            token_header,
        })
    }

    /// Send a request with the tab token attached.
    ///
    /// Non-2xx statuses are returned, not turned into errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the request (or its one retry) fails at the
    /// transport level.
    pub async fn fetch(
        &self,
        url: Url,
        options: FetchOptions,
    ) -> Result<reqwest::Response, Error> {
        let mut headers = options.headers.clone();
        let attached = match self.session.read() {
            Some(descriptor) => match HeaderValue::from_str(descriptor.token.as_str()) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(self.token_header.clone(), value);
                    true
                }
                Err(_) => {
                    tracing::warn!(
                        user_id = %descriptor.user_id,
                        "Tab token is not a valid header value, sending cookie-only"
                    );
                    false
                }
            },
            None => false,
        };

        let response = self
            .send(url.clone(), options.method.clone(), headers, options.body.clone())
            .await?;

        if !attached || !is_stale_token(response.status()) {
            return Ok(response);
        }

        tracing::warn!(
            status = response.status().as_u16(),
            url = %url,
            "Tab token rejected, retrying with cookie session"
        );
        self.session.clear();

        let mut headers = options.headers;
        headers.remove(&self.token_header);
        let retry = self.send(url, options.method, headers, options.body).await?;

        if retry.status().is_success() {
            tracing::info!("Cookie session accepted, reloading page");
            self.host.reload();
        } else {
            tracing::warn!(
                status = retry.status().as_u16(),
                "Cookie session retry also rejected"
            );
        }
        Ok(retry)
    }

    /// `GET url` through [`fetch`](Self::fetch).
    ///
    /// # Errors
    ///
    /// See [`fetch`](Self::fetch).
    pub async fn get(&self, url: Url) -> Result<reqwest::Response, Error> {
        self.fetch(url, FetchOptions::new()).await
    }

    /// `POST url` with a JSON body through [`fetch`](Self::fetch).
    ///
    /// # Errors
    ///
    /// See [`fetch`](Self::fetch); also [`Error::Json`] if `body` does
    /// not serialize.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: Url,
        body: &T,
    ) -> Result<reqwest::Response, Error> {
        let options = FetchOptions::new().method(Method::POST).json(body)?;
        self.fetch(url, options).await
    }

    async fn send(
        &self,
        url: Url,
        method: Method,
        headers: HeaderMap,
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::Response, Error> {
        let mut request = self.http.request(method, url).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }
        request.send().await.map_err(Into::into)
    }
}

fn is_stale_token(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::BAD_REQUEST
}
