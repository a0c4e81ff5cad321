use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{
        HeaderMap,
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
};
use tracing::debug;

use super::AppState;
use super::error::ApiError;

/// Cookie carrying the session token when no bearer header is sent.
pub const SESSION_COOKIE: &str = "vantage.session_token";

pub trait SessionVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticSessions {
    users_by_token: HashMap<String, String>,
}

impl StaticSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.users_by_token.insert(token.into(), user_id.into());
        self
    }

    /// Parses `TOKEN=USER` entries.
    pub fn from_entries<S: AsRef<str>>(entries: &[S]) -> Result<Self, String> {
        let mut sessions = Self::new();
        for entry in entries {
            let entry = entry.as_ref();
            let parsed = entry
                .split_once('=')
                .map(|(token, user)| (token.trim(), user.trim()))
                .filter(|(token, user)| !token.is_empty() && !user.is_empty());
            let Some((token, user)) = parsed else {
                return Err(format!(
                    "invalid session entry `{entry}`; expected TOKEN=USER"
                ));
            };
            sessions = sessions.with_session(token, user);
        }
        Ok(sessions)
    }

    pub fn len(&self) -> usize {
        self.users_by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users_by_token.is_empty()
    }
}

impl SessionVerifier for StaticSessions {
    fn verify(&self, token: &str) -> Option<String> {
        self.users_by_token.get(token).cloned()
    }
}

/// Authenticated user id, extracted from a bearer token or the session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(&parts.headers) else {
            debug!("no session token on request");
            return Err(ApiError::Unauthorized("Authentication required"));
        };

        match state.sessions.verify(&token) {
            Some(user_id) => {
                debug!(user = %user_id, "session verified");
                Ok(AuthUser(user_id))
            }
            None => Err(ApiError::Unauthorized("Invalid or expired session")),
        }
    }
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
