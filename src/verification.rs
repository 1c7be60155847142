//! Verification flows: email OTP, guardian codes, and the resend cooldown.
//!
//! DESIGN
//! ======
//! A [`VerificationFlow`] is a small state machine:
//! `Idle → Submitting → Success | Error`. `Error` keeps the failure message
//! for display and accepts a new submission, so it behaves like `Idle` for
//! input purposes. `Success` is terminal; the flow navigates to its
//! destination after a short pause.
//!
//! The resend cooldown is independent of submission state and counts down in
//! whole-second ticks.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

use crate::gateway::{Gateway, GatewayError};
use crate::redirect::{LOGIN_PATH, PROFILE_PATH};
use crate::session::location::Location;
use crate::validation::{self, ValidationError};

pub const EMAIL_OTP_LEN: usize = 6;
pub const GUARDIAN_CODE_LEN: usize = 8;
pub const RESEND_COOLDOWN_TICKS: u32 = 60;
pub const RESEND_TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("a submission is already in progress")]
    InFlight,
    #[error("already verified")]
    AlreadyVerified,
    #[error("please wait {remaining}s before requesting another code")]
    CoolingDown { remaining: u32 },
}

impl VerificationError {
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Gateway(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

// =============================================================================
// KIND
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationKind {
    /// Confirms a newly registered email address.
    EmailOtp,
    /// Links a guardian account to a student account.
    Guardian,
}

impl VerificationKind {
    #[must_use]
    pub fn code_len(self) -> usize {
        match self {
            Self::EmailOtp => EMAIL_OTP_LEN,
            Self::Guardian => GUARDIAN_CODE_LEN,
        }
    }

    #[must_use]
    pub fn destination(self) -> &'static str {
        match self {
            Self::EmailOtp => LOGIN_PATH,
            Self::Guardian => PROFILE_PATH,
        }
    }

    #[must_use]
    pub fn success_delay(self) -> Duration {
        match self {
            Self::EmailOtp => Duration::from_secs(3),
            Self::Guardian => Duration::from_millis(1500),
        }
    }
}

// =============================================================================
// OTP INPUT
// =============================================================================

/// Digits of `raw` in order, at most `len` of them.
#[must_use]
pub fn sanitize_code(raw: &str, len: usize) -> String {
    raw.chars().filter(char::is_ascii_digit).take(len).collect()
}

/// Fixed-width digit slots backing a code entry field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpInput {
    slots: Vec<Option<char>>,
}

impl OtpInput {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self { slots: vec![None; len] }
    }

    #[must_use]
    pub fn for_kind(kind: VerificationKind) -> Self {
        Self::new(kind.code_len())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Type one character into `index`. Non-digits and out-of-range indexes
    /// are ignored. Returns the slot focus should move to.
    pub fn input(&mut self, index: usize, ch: char) -> usize {
        if index >= self.slots.len() || !ch.is_ascii_digit() {
            return index.min(self.slots.len().saturating_sub(1));
        }
        self.slots[index] = Some(ch);
        (index + 1).min(self.slots.len() - 1)
    }

    /// Distribute pasted text across slots starting at `index`.
    ///
    /// Non-digits are dropped; digits past the last slot are discarded.
    /// Returns the slot focus should move to.
    pub fn paste(&mut self, index: usize, text: &str) -> usize {
        if index >= self.slots.len() {
            return self.slots.len().saturating_sub(1);
        }
        let digits = sanitize_code(text, self.slots.len() - index);
        let mut next = index;
        for (offset, ch) in digits.chars().enumerate() {
            self.slots[index + offset] = Some(ch);
            next = index + offset + 1;
        }
        next.min(self.slots.len() - 1)
    }

    /// Clear `index`, or the previous slot when `index` is already empty.
    /// Returns the slot focus should move to.
    pub fn backspace(&mut self, index: usize) -> usize {
        if index >= self.slots.len() {
            return self.slots.len().saturating_sub(1);
        }
        if self.slots[index].is_some() {
            self.slots[index] = None;
            return index;
        }
        let previous = index.saturating_sub(1);
        self.slots[previous] = None;
        previous
    }

    pub fn clear(&mut self) {
        self.slots.fill(None);
    }

    /// Entered digits in slot order.
    #[must_use]
    pub fn value(&self) -> String {
        self.slots.iter().flatten().collect()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// The full code, or an error naming the expected width.
    ///
    /// # Errors
    ///
    /// Returns `IncompleteCode` while any slot is empty.
    pub fn code(&self) -> Result<String, ValidationError> {
        if !self.is_complete() {
            return Err(ValidationError::IncompleteCode { expected: self.slots.len() });
        }
        Ok(self.value())
    }
}

// =============================================================================
// FLOW
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Idle,
    Submitting,
    Success,
    Error,
}

#[derive(Debug)]
struct FlowState {
    attempt: AttemptState,
    message: Option<String>,
}

pub struct VerificationFlow {
    kind: VerificationKind,
    gateway: Arc<dyn Gateway>,
    location: Arc<dyn Location>,
    success_delay: Duration,
    state: Mutex<FlowState>,
}

impl VerificationFlow {
    #[must_use]
    pub fn new(kind: VerificationKind, gateway: Arc<dyn Gateway>, location: Arc<dyn Location>) -> Self {
        Self {
            kind,
            gateway,
            location,
            success_delay: kind.success_delay(),
            state: Mutex::new(FlowState { attempt: AttemptState::Idle, message: None }),
        }
    }

    #[must_use]
    pub fn with_success_delay(mut self, delay: Duration) -> Self {
        self.success_delay = delay;
        self
    }

    #[must_use]
    pub fn kind(&self) -> VerificationKind {
        self.kind
    }

    #[must_use]
    pub fn state(&self) -> AttemptState {
        self.lock().attempt
    }

    /// Last success or failure message.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        self.lock().message.clone()
    }

    /// Submit an email OTP for `email`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a bad email or incomplete code (state
    /// unchanged), `InFlight`/`AlreadyVerified` when not accepting input,
    /// `Gateway` when the backend rejects the code.
    pub async fn verify_email(&self, email: &str, input: &OtpInput) -> Result<(), VerificationError> {
        let email = validation::validate_email(email).inspect_err(|e| self.note_invalid(e))?;
        let code = self.checked_code(input)?;
        self.begin()?;
        let result = self.gateway.verify_email_otp(&email, &code).await;
        self.finish(result).await
    }

    /// Submit a guardian relationship code on behalf of the signed-in guardian.
    ///
    /// # Errors
    ///
    /// Same as [`VerificationFlow::verify_email`].
    pub async fn verify_guardian(&self, token: &str, input: &OtpInput) -> Result<(), VerificationError> {
        let code = self.checked_code(input)?;
        self.begin()?;
        let result = self
            .gateway
            .verify_guardian(token, &code)
            .await
            .map(|_| "Guardian verified successfully".to_owned());
        self.finish(result).await
    }

    fn checked_code(&self, input: &OtpInput) -> Result<String, VerificationError> {
        let code = input.code().inspect_err(|e| self.note_invalid(e))?;
        if code.len() != self.kind.code_len() {
            let err = ValidationError::IncompleteCode { expected: self.kind.code_len() };
            self.note_invalid(&err);
            return Err(err.into());
        }
        Ok(code)
    }

    fn note_invalid(&self, err: &ValidationError) {
        let mut state = self.lock();
        if matches!(state.attempt, AttemptState::Idle | AttemptState::Error) {
            state.message = Some(err.to_string());
        }
    }

    fn begin(&self) -> Result<(), VerificationError> {
        let mut state = self.lock();
        match state.attempt {
            AttemptState::Submitting => Err(VerificationError::InFlight),
            AttemptState::Success => Err(VerificationError::AlreadyVerified),
            AttemptState::Idle | AttemptState::Error => {
                state.attempt = AttemptState::Submitting;
                state.message = None;
                Ok(())
            }
        }
    }

    async fn finish(&self, result: Result<String, GatewayError>) -> Result<(), VerificationError> {
        match result {
            Ok(message) => {
                {
                    let mut state = self.lock();
                    state.attempt = AttemptState::Success;
                    state.message = Some(message);
                }
                tracing::info!(kind = ?self.kind, "verification succeeded");
                if !self.success_delay.is_zero() {
                    tokio::time::sleep(self.success_delay).await;
                }
                self.location.navigate(self.kind.destination());
                Ok(())
            }
            Err(e) => {
                tracing::warn!(kind = ?self.kind, error = %e, "verification failed");
                let mut state = self.lock();
                state.attempt = AttemptState::Error;
                state.message = Some(e.user_message());
                Err(e.into())
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FlowState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// =============================================================================
// RESEND COOLDOWN
// =============================================================================

/// Countdown gating repeat resend requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResendCooldown {
    remaining: u32,
}

impl ResendCooldown {
    pub fn start(&mut self) {
        self.remaining = RESEND_COOLDOWN_TICKS;
    }

    /// Advance one tick; returns the ticks still remaining.
    pub fn tick(&mut self) -> u32 {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining
    }

    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    #[must_use]
    pub fn can_resend(&self) -> bool {
        self.remaining == 0
    }
}

/// Resend sub-flow: reissues the email code, then cools down.
pub struct ResendFlow {
    gateway: Arc<dyn Gateway>,
    state: Mutex<ResendState>,
}

#[derive(Debug, Default)]
struct ResendState {
    cooldown: ResendCooldown,
    sending: bool,
}

impl ResendFlow {
    #[must_use]
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway, state: Mutex::new(ResendState::default()) }
    }

    #[must_use]
    pub fn cooldown(&self) -> ResendCooldown {
        self.lock().cooldown
    }

    /// Whether a resend request is awaiting the gateway.
    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.lock().sending
    }

    /// Request a new code for `email`; starts the cooldown on success.
    ///
    /// # Errors
    ///
    /// Returns `CoolingDown` without calling the gateway while the cooldown
    /// runs, `InFlight` while another resend is pending, `Validation` for a
    /// bad email, `Gateway` when the backend refuses.
    pub async fn resend(&self, email: &str) -> Result<(), VerificationError> {
        let email = validation::validate_email(email)?;
        {
            let mut state = self.lock();
            if state.sending {
                return Err(VerificationError::InFlight);
            }
            let remaining = state.cooldown.remaining();
            if remaining > 0 {
                return Err(VerificationError::CoolingDown { remaining });
            }
            state.sending = true;
        }

        let result = self.gateway.resend_otp(&email).await;
        let mut state = self.lock();
        state.sending = false;
        result?;
        state.cooldown.start();
        tracing::info!("verification code resent");
        Ok(())
    }

    /// Advance the cooldown by one tick.
    pub fn tick(&self) -> u32 {
        self.lock().cooldown.tick()
    }

    /// Tick once per [`RESEND_TICK`] until the cooldown reaches zero.
    pub async fn run_cooldown(&self) {
        let mut interval = tokio::time::interval(RESEND_TICK);
        interval.tick().await;
        while !self.cooldown().can_resend() {
            interval.tick().await;
            self.tick();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ResendState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "verification_test.rs"]
mod tests;
