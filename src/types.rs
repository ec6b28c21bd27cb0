use std::fmt;

use derive_more::{Display, From, Into};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Error;

/// Identifier of an authenticated user, as issued by the auth service.
///
/// Opaque to this crate. Some gateways render numeric ids into the page, so
/// deserialization accepts JSON numbers as well as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Display, From, Into)]
#[serde(transparent)]
pub struct UserId(pub String);

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct UserIdVisitor;

        impl serde::de::Visitor<'_> for UserIdVisitor {
            type Value = UserId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a user id string or integer")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<UserId, E> {
                Ok(UserId(v.to_owned()))
            }

            fn visit_string<E: serde::de::Error>(self, v: String) -> Result<UserId, E> {
                Ok(UserId(v))
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<UserId, E> {
                Ok(UserId(v.to_string()))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<UserId, E> {
                Ok(UserId(v.to_string()))
            }
        }

        deserializer.deserialize_any(UserIdVisitor)
    }
}

/// Opaque bearer credential bound to one tab.
///
/// `Debug` never prints the credential.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct SessionToken(pub String);

impl SessionToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionToken {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

/// One authenticated identity as known to one context (cookie or tab).
///
/// Always fully populated: an empty descriptor is `Option::None`, so a token
/// without a user id (or the reverse) cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescriptor {
    pub token: SessionToken,
    pub user_id: UserId,
}

impl SessionDescriptor {
    #[must_use]
    pub fn new(token: impl Into<SessionToken>, user_id: impl Into<UserId>) -> Self {
        Self {
            token: token.into(),
            user_id: user_id.into(),
        }
    }
}

/// Session descriptor rendered into the page by the server at load time.
///
/// Read once per page load. `sync_session` is set only on the load that
/// immediately follows a login action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSessionConfig {
    #[serde(default)]
    pub token: Option<SessionToken>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub sync_session: bool,
}

impl PageSessionConfig {
    /// Parses the JSON object embedded in the page.
    ///
    /// A blank string or a JSON `null` means the page carries no session
    /// config and yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the JSON is malformed.
    pub fn parse(raw: &str) -> Result<Option<Self>, Error> {
        if raw.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(raw).map_err(Into::into)
    }

    /// The server's cookie identity, if both halves are present.
    #[must_use]
    pub fn descriptor(&self) -> Option<SessionDescriptor> {
        match (&self.token, &self.user_id) {
            (Some(token), Some(user_id)) => Some(SessionDescriptor {
                token: token.clone(),
                user_id: user_id.clone(),
            }),
            _ => None,
        }
    }

    /// True when this page load directly follows a login action.
    #[must_use]
    pub fn is_fresh_login(&self) -> bool {
        self.sync_session && self.token.is_some()
    }
}

fn null_as_false<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

/// Payload of the gateway's login endpoint.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct LoginResponse {
    pub token: SessionToken,
    pub user: LoginUser,
}

/// User section of a [`LoginResponse`]. Fields beyond `id` are kept raw.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct LoginUser {
    pub id: UserId,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl From<LoginResponse> for SessionDescriptor {
    fn from(login: LoginResponse) -> Self {
        Self {
            token: login.token,
            user_id: login.user.id,
        }
    }
}
