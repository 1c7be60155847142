//! Session store: the single owner of authentication state.
//!
//! SYSTEM CONTEXT
//! ==============
//! Route guards, banners and the redirect policy read the session through
//! [`SessionStore::snapshot`] or a [`SessionStore::subscribe`] receiver. Only
//! the store writes it.
//!
//! ERROR HANDLING
//! ==============
//! Introspection separates a confirmed-invalid token (session cleared) from
//! every other failure (token kept for a later retry). The two follow-up
//! status checks default differently on failure: profile completion fails
//! closed (`false`), password setup fails open (`false`, i.e. not required).
//!
//! ORDERING
//! ========
//! Each introspection takes a sequence number when issued. Its result is
//! applied only if nothing newer (another introspection, a login, a logout)
//! has been applied since, so a slow stale response never overwrites fresh
//! state.

pub mod location;
pub mod storage;

use std::sync::{Arc, Mutex};

use reqwest::Url;
use serde::Serialize;
use tokio::sync::watch;

use crate::gateway::{Credentials, Gateway, GatewayError, Identity};
use crate::redirect::LOGIN_PATH;
use crate::validation::{self, ValidationError};
use location::{Location, strip_query_param};
use storage::{Storage, TOKEN_STORAGE_KEY};

/// Query parameter the OAuth callback delivers the token in.
pub const TOKEN_QUERY_PARAM: &str = "token";

// =============================================================================
// SESSION
// =============================================================================

/// Authentication state for the current user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub token: Option<String>,
    pub identity: Option<Identity>,
    pub profile_completed: bool,
    pub password_setup_required: bool,
    pub loading: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self { token: None, identity: None, profile_completed: true, password_setup_required: false, loading: true }
    }
}

impl Session {
    /// Empty, fully loaded session.
    #[must_use]
    pub fn signed_out() -> Self {
        Self { loading: false, ..Self::default() }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.identity.is_some()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("not signed in")]
    NotAuthenticated,
}

impl SessionError {
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::Gateway(e) => e.user_message(),
            Self::NotAuthenticated => "Please sign in first.".to_owned(),
        }
    }
}

/// Result of one introspection round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntrospectOutcome {
    /// Token valid; identity and password flag applied.
    Valid,
    /// Token confirmed invalid; session cleared.
    Invalid,
    /// Gateway unreachable or misbehaving; token kept.
    Unavailable,
    /// A newer result was applied first; this one was discarded.
    Stale,
    /// No token to introspect.
    NoToken,
}

// =============================================================================
// STORE
// =============================================================================

#[derive(Debug, Default)]
struct Sequence {
    issued: u64,
    applied: u64,
}

pub struct SessionStore {
    gateway: Arc<dyn Gateway>,
    storage: Arc<dyn Storage>,
    location: Arc<dyn Location>,
    sequence: Mutex<Sequence>,
    state: watch::Sender<Session>,
}

impl SessionStore {
    #[must_use]
    pub fn new(gateway: Arc<dyn Gateway>, storage: Arc<dyn Storage>, location: Arc<dyn Location>) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self { gateway, storage, location, sequence: Mutex::new(Sequence::default()), state }
    }

    /// Current session state.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Receiver notified on every session change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn location(&self) -> &Arc<dyn Location> {
        &self.location
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Populate the session on application start.
    ///
    /// A `token` query parameter (OAuth redirect) beats the persisted token
    /// and is scrubbed from the location before validation starts.
    pub async fn mount(&self) -> Session {
        let from_url = self.location.query_param(TOKEN_QUERY_PARAM).map(|token| {
            self.scrub_token_from_location();
            token
        });
        let token = match from_url.filter(|t| !t.is_empty()) {
            Some(token) => {
                self.storage.set_item(TOKEN_STORAGE_KEY, &token);
                tracing::debug!("session token taken from callback URL");
                Some(token)
            }
            None => self.storage.get_item(TOKEN_STORAGE_KEY).filter(|t| !t.is_empty()),
        };

        let Some(token) = token else {
            self.state.send_replace(Session::signed_out());
            return self.snapshot();
        };

        self.state.send_modify(|s| {
            s.token = Some(token);
            s.identity = None;
            s.loading = true;
        });
        if self.introspect().await == IntrospectOutcome::Valid {
            self.check_profile_status().await;
        }
        self.snapshot()
    }

    /// Adopt a freshly issued token.
    ///
    /// Introspection is awaited before the profile check, so on return the
    /// flags belong to this token or the session reflects its rejection.
    pub async fn login(&self, token: &str) -> Session {
        self.storage.set_item(TOKEN_STORAGE_KEY, token);
        self.supersede_in_flight();
        self.state.send_modify(|s| {
            s.token = Some(token.to_owned());
            s.identity = None;
        });
        if self.introspect().await == IntrospectOutcome::Valid {
            self.check_profile_status().await;
            if let Some(identity) = self.snapshot().identity {
                tracing::info!(user_id = %identity.id, role = ?identity.role, "signed in");
            }
        }
        self.snapshot()
    }

    /// Validate credentials, exchange them for a token, then [`Self::login`].
    ///
    /// # Errors
    ///
    /// Returns `Validation` before any request for malformed input, `Gateway`
    /// when the token exchange fails.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, SessionError> {
        let credentials: Credentials = validation::validate_credentials(email, password)?;
        let token = self.gateway.login(&credentials).await?;
        Ok(self.login(&token).await)
    }

    /// Sign out locally no matter what the gateway says.
    pub async fn logout(&self) {
        let token = self.snapshot().token.or_else(|| self.storage.get_item(TOKEN_STORAGE_KEY));
        if let Some(token) = token {
            if let Err(e) = self.gateway.logout(&token).await {
                tracing::warn!(error = %e, "backend logout failed; clearing local session anyway");
            }
        }
        self.storage.remove_item(TOKEN_STORAGE_KEY);
        self.supersede_in_flight();
        self.state.send_replace(Session::signed_out());
        self.location.navigate(LOGIN_PATH);
        tracing::info!("signed out");
    }

    // -------------------------------------------------------------------------
    // Introspection & status checks
    // -------------------------------------------------------------------------

    /// Validate the current token and apply identity and password flag.
    pub async fn introspect(&self) -> IntrospectOutcome {
        let Some(token) = self.snapshot().token else {
            self.state.send_if_modified(|s| std::mem::replace(&mut s.loading, false));
            return IntrospectOutcome::NoToken;
        };

        let seq = self.issue();
        let result = match self.gateway.introspect(&token).await {
            Ok(result) if !result.valid => Err(GatewayError::InvalidToken),
            Ok(result) if result.identity().is_none() => {
                Err(GatewayError::Parse("valid introspection without id".to_owned()))
            }
            other => other,
        };
        match result {
            Ok(result) => {
                let applied = self.apply_if_current(seq, |s| {
                    s.token = Some(token.clone());
                    s.identity = result.identity();
                    s.password_setup_required = result.password_setup_required;
                    s.loading = false;
                });
                if applied { IntrospectOutcome::Valid } else { IntrospectOutcome::Stale }
            }
            Err(e) if e.is_invalid_token() => {
                let applied = self.apply_if_current(seq, |s| {
                    *s = Session::signed_out();
                });
                if !applied {
                    return IntrospectOutcome::Stale;
                }
                if self.storage.get_item(TOKEN_STORAGE_KEY).as_deref() == Some(token.as_str()) {
                    self.storage.remove_item(TOKEN_STORAGE_KEY);
                }
                tracing::info!("stored token rejected; session cleared");
                IntrospectOutcome::Invalid
            }
            Err(e) => {
                tracing::warn!(error = %e, code = e.error_code(), "introspection failed; keeping token for retry");
                let applied = self.apply_if_current(seq, |s| s.loading = false);
                if applied { IntrospectOutcome::Unavailable } else { IntrospectOutcome::Stale }
            }
        }
    }

    /// Refresh `profile_completed`; any failure sets it to `false`.
    pub async fn check_profile_status(&self) -> bool {
        let Some(token) = self.snapshot().token else {
            return self.snapshot().profile_completed;
        };
        let completed = match self.gateway.profile_status(&token).await {
            Ok(status) => status.profile_completed,
            Err(e) => {
                tracing::warn!(error = %e, "profile status check failed; assuming incomplete");
                false
            }
        };
        self.apply_for_token(&token, |s| s.profile_completed = completed);
        completed
    }

    /// Refresh `password_setup_required`; any failure sets it to `false`.
    pub async fn check_password_setup(&self) -> bool {
        let Some(token) = self.snapshot().token else {
            return self.snapshot().password_setup_required;
        };
        let required = match self.gateway.introspect(&token).await {
            Ok(result) => result.password_setup_required,
            Err(e) => {
                tracing::warn!(error = %e, "password setup check failed; assuming not required");
                false
            }
        };
        self.apply_for_token(&token, |s| s.password_setup_required = required);
        required
    }

    /// Set a local password for an OAuth-created account.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a short or mismatched pair, `NotAuthenticated`
    /// without a token, `Gateway` when the backend refuses.
    pub async fn setup_password(&self, password: &str, confirmation: &str) -> Result<(), SessionError> {
        validation::validate_password_setup(password, confirmation)?;
        let token = self.snapshot().token.ok_or(SessionError::NotAuthenticated)?;
        self.gateway.set_password(&token, password).await?;
        self.apply_for_token(&token, |s| s.password_setup_required = false);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn lock_sequence(&self) -> std::sync::MutexGuard<'_, Sequence> {
        self.sequence.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn issue(&self) -> u64 {
        let mut seq = self.lock_sequence();
        seq.issued += 1;
        seq.issued
    }

    /// Discard every introspection issued so far.
    fn supersede_in_flight(&self) {
        let mut seq = self.lock_sequence();
        seq.issued += 1;
        seq.applied = seq.issued;
    }

    fn apply_if_current(&self, issued: u64, f: impl FnOnce(&mut Session)) -> bool {
        let mut seq = self.lock_sequence();
        if issued <= seq.applied {
            tracing::debug!(issued, applied = seq.applied, "dropping stale introspection result");
            return false;
        }
        seq.applied = issued;
        self.state.send_modify(f);
        true
    }

    fn apply_for_token(&self, token: &str, f: impl FnOnce(&mut Session)) {
        let applied = self.state.send_if_modified(|s| {
            if s.token.as_deref() != Some(token) {
                return false;
            }
            f(s);
            true
        });
        if !applied {
            tracing::debug!("token changed during status check; result dropped");
        }
    }

    fn scrub_token_from_location(&self) {
        let href = self.location.href();
        match Url::parse(&href) {
            Ok(url) => self.location.replace(strip_query_param(&url, TOKEN_QUERY_PARAM).as_str()),
            Err(e) => tracing::warn!(error = %e, "could not parse location to scrub token"),
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
