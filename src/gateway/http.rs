//! HTTP gateway client.
//!
//! Thin `reqwest` wrapper over the REST endpoints. Response decoding lives in
//! the pure `decode_*` functions so it can be tested without a server.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::Gateway;
use super::types::{Credentials, Envelope, GatewayError, Introspection, ProfileStatus, TokenGrant};
use crate::config::GatewayConfig;

const INTROSPECT_PATH: &str = "/identity/auth/introspect";
const LOGIN_PATH: &str = "/identity/auth/token";
const LOGOUT_PATH: &str = "/identity/auth/logout";
const PROFILE_STATUS_PATH: &str = "/identity/users/profile-status";
const VERIFY_EMAIL_PATH: &str = "/identity/auth/verify-email";
const RESEND_OTP_PATH: &str = "/identity/auth/resend-otp";
const VERIFY_GUARDIAN_PATH: &str = "/identity/guardians/verify";
const SET_PASSWORD_PATH: &str = "/identity/users/set-password";

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpGateway {
    http: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    /// Build a client from typed gateway config.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::HttpClientBuild`] if the HTTP client fails to build.
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| GatewayError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.base_url.clone() })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post<B, T>(&self, path: &str, token: Option<&str>, body: &B) -> Result<Envelope<T>, GatewayError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let mut request = self.http.post(self.url(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        read_envelope(response).await
    }

    async fn get<T>(&self, path: &str, token: &str) -> Result<Envelope<T>, GatewayError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        read_envelope(response).await
    }
}

async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<Envelope<T>, GatewayError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| GatewayError::Transport(e.to_string()))?;
    decode_envelope(status, &text)
}

#[async_trait::async_trait]
impl Gateway for HttpGateway {
    async fn introspect(&self, token: &str) -> Result<Introspection, GatewayError> {
        let body = serde_json::json!({ "token": token });
        let envelope = self.post::<_, Introspection>(INTROSPECT_PATH, None, &body).await;
        decode_introspection(envelope)
    }

    async fn login(&self, credentials: &Credentials) -> Result<String, GatewayError> {
        let grant: TokenGrant = self
            .post(LOGIN_PATH, None, credentials)
            .await?
            .into_result()?;
        Ok(grant.token)
    }

    async fn logout(&self, token: &str) -> Result<(), GatewayError> {
        let body = serde_json::json!({ "token": token });
        self.post::<_, serde_json::Value>(LOGOUT_PATH, None, &body)
            .await?
            .into_success()?;
        Ok(())
    }

    async fn profile_status(&self, token: &str) -> Result<ProfileStatus, GatewayError> {
        self.get(PROFILE_STATUS_PATH, token).await?.into_result()
    }

    async fn verify_email_otp(&self, email: &str, code: &str) -> Result<String, GatewayError> {
        let body = serde_json::json!({ "email": email, "otp": code });
        let envelope = self
            .post::<_, serde_json::Value>(VERIFY_EMAIL_PATH, None, &body)
            .await?
            .into_success()?;
        Ok(envelope.message.unwrap_or_default())
    }

    async fn resend_otp(&self, email: &str) -> Result<(), GatewayError> {
        let body = serde_json::json!({ "email": email });
        self.post::<_, serde_json::Value>(RESEND_OTP_PATH, None, &body)
            .await?
            .into_success()?;
        Ok(())
    }

    async fn verify_guardian(&self, token: &str, code: &str) -> Result<serde_json::Value, GatewayError> {
        let body = serde_json::json!({ "verificationCode": code });
        let envelope = self
            .post::<_, serde_json::Value>(VERIFY_GUARDIAN_PATH, Some(token), &body)
            .await?
            .into_success()?;
        Ok(envelope.result.unwrap_or(serde_json::Value::Null))
    }

    async fn set_password(&self, token: &str, password: &str) -> Result<(), GatewayError> {
        let body = serde_json::json!({ "password": password });
        self.post::<_, serde_json::Value>(SET_PASSWORD_PATH, Some(token), &body)
            .await?
            .into_success()?;
        Ok(())
    }
}

// =============================================================================
// DECODING
// =============================================================================

/// Decode a response body into an envelope.
///
/// A body that parses as an envelope wins regardless of HTTP status, so
/// backend rejections keep their message. Otherwise 401 maps to
/// [`GatewayError::InvalidToken`] and any other failure to `Status`/`Parse`.
pub(crate) fn decode_envelope<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<Envelope<T>, GatewayError> {
    match serde_json::from_str::<Envelope<T>>(body) {
        Ok(envelope) => Ok(envelope),
        Err(_) if status == StatusCode::UNAUTHORIZED => Err(GatewayError::InvalidToken),
        Err(_) if !status.is_success() => Err(GatewayError::Status { status: status.as_u16(), body: body.to_owned() }),
        Err(e) => Err(GatewayError::Parse(e.to_string())),
    }
}

/// Collapse every "token is bad" signal into [`GatewayError::InvalidToken`].
pub(crate) fn decode_introspection(
    envelope: Result<Envelope<Introspection>, GatewayError>,
) -> Result<Introspection, GatewayError> {
    let introspection = envelope?.into_result().map_err(|e| {
        if e.is_invalid_token() { GatewayError::InvalidToken } else { e }
    })?;
    if !introspection.valid {
        return Err(GatewayError::InvalidToken);
    }
    if introspection.identity().is_none() {
        return Err(GatewayError::Parse("valid introspection without id".to_owned()));
    }
    Ok(introspection)
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
