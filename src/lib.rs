//! MathMind session core.
//!
//! ARCHITECTURE
//! ============
//! - [`session`]: the session store, its persisted token and location seams.
//! - [`gateway`]: the REST backend trait and its `reqwest` implementation.
//! - [`redirect`]: togglable gating rules observing the session.
//! - [`verification`]: email OTP / guardian code flows and resend cooldown.
//! - [`validation`]: client-side form checks that never hit the network.
//! - [`config`]: gateway settings from environment variables.

pub mod config;
pub mod gateway;
pub mod redirect;
pub mod session;
pub mod validation;
pub mod verification;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use config::GatewayConfig;
pub use gateway::{Gateway, GatewayError, HttpGateway};
pub use redirect::{GatingRule, RedirectPolicy};
pub use session::{IntrospectOutcome, Session, SessionError, SessionStore};
