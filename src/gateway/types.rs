//! Gateway types: wire envelope, identity payloads, and errors.
//!
//! Every gateway endpoint answers with the same envelope:
//! `{"code": 1000, "message": "...", "result": {...}}`. A `code` other than
//! [`SUCCESS_CODE`] is a backend rejection whose `message` is user-facing.

use serde::{Deserialize, Serialize};

/// Envelope code the gateway uses for success.
pub const SUCCESS_CODE: i32 = 1000;

/// Envelope codes the gateway uses for "token is not valid".
///
/// `1006` is the unauthenticated code, `1007` the expired/invalid token code.
pub const INVALID_TOKEN_CODES: &[i32] = &[1006, 1007];

const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by gateway calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The gateway answered with a non-success envelope code.
    #[error("gateway rejected request ({code}): {message}")]
    Rejected { code: i32, message: String },

    /// The gateway explicitly reported the bearer token as invalid.
    #[error("token is invalid")]
    InvalidToken,

    /// The request never produced a response (DNS, connect, timeout).
    #[error("request failed: {0}")]
    Transport(String),

    /// Non-success HTTP status without a usable envelope.
    #[error("unexpected response status {status}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl GatewayError {
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Rejected { .. } => "E_REJECTED",
            Self::InvalidToken => "E_INVALID_TOKEN",
            Self::Transport(_) => "E_TRANSPORT",
            Self::Status { .. } => "E_STATUS",
            Self::Parse(_) => "E_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    /// Whether a later attempt with the same inputs could succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status { status: 429 | 500..=599, .. })
    }

    /// True only when the gateway confirmed the token is bad.
    #[must_use]
    pub fn is_invalid_token(&self) -> bool {
        match self {
            Self::InvalidToken => true,
            Self::Rejected { code, .. } => INVALID_TOKEN_CODES.contains(code),
            _ => false,
        }
    }

    /// Text suitable for showing to the user.
    ///
    /// Backend rejections carry their own message; everything else falls back
    /// to a generic retry prompt.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message, .. } if !message.trim().is_empty() => message.clone(),
            Self::InvalidToken => "Your session has expired. Please sign in again.".to_owned(),
            _ => GENERIC_FAILURE_MESSAGE.to_owned(),
        }
    }
}

// =============================================================================
// ENVELOPE
// =============================================================================

/// Response envelope shared by every gateway endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub code: i32,
    pub message: Option<String>,
    pub result: Option<T>,
}

impl<T> Envelope<T> {
    /// Convert a non-success envelope into [`GatewayError::Rejected`].
    ///
    /// # Errors
    ///
    /// Returns `Rejected` when `code` is not [`SUCCESS_CODE`].
    pub fn into_success(self) -> Result<Self, GatewayError> {
        if self.code == SUCCESS_CODE {
            return Ok(self);
        }
        Err(GatewayError::Rejected { code: self.code, message: self.message.unwrap_or_default() })
    }

    /// Require a `result` payload on a success envelope.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` for non-success codes, `Parse` when `result` is absent.
    pub fn into_result(self) -> Result<T, GatewayError> {
        self.into_success()?
            .result
            .ok_or_else(|| GatewayError::Parse("missing result".to_owned()))
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Account role as reported by introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Student,
    Teacher,
    Parent,
    Admin,
    #[serde(other)]
    Other,
}

/// Identity fields decoded from a valid token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub role: Role,
}

/// `result` of the introspect endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Introspection {
    pub valid: bool,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub password_setup_required: bool,
}

impl Introspection {
    /// Identity for a valid result, `None` when invalid or incomplete.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        if !self.valid {
            return None;
        }
        Some(Identity {
            id: self.id.clone()?,
            email: self.email.clone().unwrap_or_default(),
            role: self.role.unwrap_or(Role::Other),
        })
    }
}

/// `result` of the login endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub token: String,
}

/// `result` of the profile completion status endpoint.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStatus {
    pub profile_completed: bool,
}

/// Email + password pair submitted to the login endpoint.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}
