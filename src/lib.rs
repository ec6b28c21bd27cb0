#![doc = include_str!("../README.md")]

pub mod config;
pub mod context;
pub mod error;
pub mod fetch;
pub mod page;
pub mod reconcile;
pub mod store;
pub mod types;

// Re-exports for convenient access
pub use config::SessionConfig;
pub use context::SessionContext;
pub use error::{Error, StorageError};
pub use fetch::{AuthFetch, FetchOptions};
pub use page::{FailSafe, LoadingMask, PageHost, strip_login_markers};
pub use reconcile::{Decision, Outcome, Reconciler, decide};
pub use store::{MemoryStorage, TabSession, TabStorage};
pub use types::{
    LoginResponse, LoginUser, PageSessionConfig, SessionDescriptor, SessionToken, UserId,
};

/// Re-export of the HTTP method type used by [`FetchOptions`].
pub use reqwest::Method;
