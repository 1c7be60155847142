//! Gateway: the REST backend every session operation talks to.
//!
//! DESIGN
//! ======
//! `Gateway` is the seam between session state and the network. The session
//! store and verification flows only ever see the trait, so tests script it
//! and the binary plugs in [`HttpGateway`].

pub mod http;
pub mod types;

pub use http::HttpGateway;
pub use types::{Credentials, GatewayError, Identity, Introspection, ProfileStatus, Role};

/// Backend calls consumed by the session core.
#[async_trait::async_trait]
pub trait Gateway: Send + Sync {
    /// Validate a bearer token and return identity plus policy flags.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidToken`] when the gateway confirms the
    /// token is bad, any other variant for transient or malformed responses.
    async fn introspect(&self, token: &str) -> Result<Introspection, GatewayError>;

    /// Exchange credentials for a bearer token.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` with the backend message for bad credentials.
    async fn login(&self, credentials: &Credentials) -> Result<String, GatewayError>;

    /// Invalidate a token server-side.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails; callers treat it as advisory.
    async fn logout(&self, token: &str) -> Result<(), GatewayError>;

    /// Fetch whether the token's user has finished onboarding.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    async fn profile_status(&self, token: &str) -> Result<ProfileStatus, GatewayError>;

    /// Confirm an email verification code; returns the backend message.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` when the code is wrong or expired.
    async fn verify_email_otp(&self, email: &str, code: &str) -> Result<String, GatewayError>;

    /// Reissue the email verification code.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend refuses.
    async fn resend_otp(&self, email: &str) -> Result<(), GatewayError>;

    /// Confirm a guardian relationship code on behalf of the signed-in guardian.
    ///
    /// # Errors
    ///
    /// Returns `Rejected` when the code is wrong or expired.
    async fn verify_guardian(&self, token: &str, code: &str) -> Result<serde_json::Value, GatewayError>;

    /// Set a local password on an account created through OAuth.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend refuses.
    async fn set_password(&self, token: &str, password: &str) -> Result<(), GatewayError>;
}
