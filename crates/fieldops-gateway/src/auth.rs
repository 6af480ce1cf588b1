//! Bearer credential supply
//!
//! The drafts API requires a bearer token on every call. Tokens are owned by an
//! external auth collaborator; the client only asks for the current one right
//! before each request, so a token refreshed mid-session is picked up.

use std::sync::RwLock;

/// Source of the bearer token used for drafts API calls.
pub trait CredentialProvider: Send + Sync {
    /// Current token, or `None` when the user is not signed in.
    fn bearer_token(&self) -> Option<String>;
}

/// A token set by the host and swapped on login/logout.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    token: RwLock<Option<String>>,
}

impl StaticCredentials {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token.filter(|t| !t.trim().is_empty())),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Replace the token (login, refresh, or `None` on logout)
    pub fn set(&self, token: Option<String>) {
        let mut guard = self.token.write().unwrap_or_else(|e| e.into_inner());
        *guard = token.filter(|t| !t.trim().is_empty());
    }
}

impl CredentialProvider for StaticCredentials {
    fn bearer_token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
