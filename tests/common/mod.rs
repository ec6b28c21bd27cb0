#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tab_session::{
    MemoryStorage, PageHost, SessionConfig, SessionContext, SessionDescriptor, StorageError,
    TabStorage,
};
use url::Url;
use wiremock::{Match, MockServer, Request};

pub const TOKEN_HEADER: &str = "x-session-token";

/// Page host that records every call.
#[derive(Default)]
pub struct RecordingHost {
    pub shows: AtomicUsize,
    pub hides: AtomicUsize,
    pub reloads: AtomicUsize,
    pub current: Mutex<Option<Url>>,
    pub replaced: Mutex<Vec<Url>>,
}

impl RecordingHost {
    pub fn at(url: &str) -> Self {
        Self {
            current: Mutex::new(Some(url.parse().unwrap())),
            ..Self::default()
        }
    }

    pub fn hides(&self) -> usize {
        self.hides.load(Ordering::SeqCst)
    }

    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    pub fn replaced(&self) -> Vec<Url> {
        self.replaced.lock().unwrap().clone()
    }
}

impl PageHost for RecordingHost {
    fn show_loading_mask(&self) {
        self.shows.fetch_add(1, Ordering::SeqCst);
    }

    fn hide_loading_mask(&self) {
        self.hides.fetch_add(1, Ordering::SeqCst);
    }

    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }

    fn current_url(&self) -> Option<Url> {
        self.current.lock().unwrap().clone()
    }

    fn replace_url(&self, url: Url) {
        *self.current.lock().unwrap() = Some(url.clone());
        self.replaced.lock().unwrap().push(url);
    }
}

/// Memory storage that counts mutations.
#[derive(Default)]
pub struct CountingStorage {
    inner: MemoryStorage,
    pub mutations: AtomicUsize,
}

impl CountingStorage {
    pub fn mutations(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }
}

impl TabStorage for CountingStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.inner.set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        self.inner.remove_item(key)
    }
}

/// Storage that is never available.
pub struct DisabledStorage;

impl TabStorage for DisabledStorage {
    fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Unavailable("private mode".into()))
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("private mode".into()))
    }

    fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("private mode".into()))
    }
}

/// Matches requests that do not carry the given header.
pub struct NoHeader(pub &'static str);

impl Match for NoHeader {
    fn matches(&self, request: &Request) -> bool {
        !request.headers.contains_key(self.0)
    }
}

pub fn config_for(base: &str) -> SessionConfig {
    SessionConfig::new(base.parse().unwrap()).with_fail_safe(Duration::from_secs(5))
}

/// Context against `server`, with the tab session pre-seeded when `tab` is set.
pub fn context<B: TabStorage + Default>(
    server: &MockServer,
    host: Arc<RecordingHost>,
    tab: Option<SessionDescriptor>,
) -> SessionContext<B, RecordingHost> {
    let ctx = SessionContext::new(config_for(&server.uri()), B::default(), host).unwrap();
    if let Some(tab) = tab {
        ctx.session().write(&tab);
    }
    ctx
}

/// Storage whose contents stay observable from outside the context.
#[derive(Clone, Default)]
pub struct SharedStorage(pub Arc<MemoryStorage>);

impl TabStorage for SharedStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.0.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.0.set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.0.remove_item(key)
    }
}

/// Storage whose reads panic, as a broken host binding would.
#[derive(Default)]
pub struct PanicStorage;

impl TabStorage for PanicStorage {
    fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
        panic!("tab storage binding crashed");
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Ok(())
    }

    fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }
}
