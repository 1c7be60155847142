//! Redirect policy driven by session gating flags.
//!
//! DESIGN
//! ======
//! Each [`GatingRule`] maps one session flag to a destination page and can be
//! toggled on its own. The default policy enables nothing, so observing the
//! session is a no-op until a deployment opts in.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::session::Session;
use crate::session::location::Location;

pub const LOGIN_PATH: &str = "/login";
pub const PROFILE_PATH: &str = "/profile";
pub const SETUP_PASSWORD_PATH: &str = "/setup-password";
pub const COMPLETE_PROFILE_PATH: &str = "/complete-profile";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatingRule {
    /// OAuth accounts without a local password go to the setup page.
    PasswordSetup,
    /// Accounts with unfinished onboarding go to the completion page.
    ProfileCompletion,
}

impl GatingRule {
    /// Evaluation order: password setup outranks profile completion.
    pub const ALL: [Self; 2] = [Self::PasswordSetup, Self::ProfileCompletion];

    #[must_use]
    pub fn target(self) -> &'static str {
        match self {
            Self::PasswordSetup => SETUP_PASSWORD_PATH,
            Self::ProfileCompletion => COMPLETE_PROFILE_PATH,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::PasswordSetup => "password_setup",
            Self::ProfileCompletion => "profile_completion",
        }
    }

    fn triggered_by(self, session: &Session) -> bool {
        match self {
            Self::PasswordSetup => session.password_setup_required,
            Self::ProfileCompletion => !session.profile_completed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedirectPolicy {
    password_setup: bool,
    profile_completion: bool,
}

impl RedirectPolicy {
    /// Policy with every rule enabled.
    #[must_use]
    pub fn all() -> Self {
        Self { password_setup: true, profile_completion: true }
    }

    #[must_use]
    pub fn with(mut self, rule: GatingRule) -> Self {
        self.set(rule, true);
        self
    }

    pub fn set(&mut self, rule: GatingRule, enabled: bool) {
        match rule {
            GatingRule::PasswordSetup => self.password_setup = enabled,
            GatingRule::ProfileCompletion => self.profile_completion = enabled,
        }
    }

    #[must_use]
    pub fn is_enabled(&self, rule: GatingRule) -> bool {
        match rule {
            GatingRule::PasswordSetup => self.password_setup,
            GatingRule::ProfileCompletion => self.profile_completion,
        }
    }

    /// Parse a comma-separated rule list (`password_setup`,
    /// `profile_completion`, `all`, `none`). Blank input is `none`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let mut policy = Self::default();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.to_ascii_lowercase().as_str() {
                "all" => policy = Self::all(),
                "none" => {}
                name => {
                    let rule = GatingRule::ALL.into_iter().find(|rule| rule.name() == name)?;
                    policy.set(rule, true);
                }
            }
        }
        Some(policy)
    }

    /// Destination the session should be sent to from `current_path`, if any.
    ///
    /// Nothing redirects while the session is still loading or has no
    /// identity, and a rule never redirects to the page it already targets.
    #[must_use]
    pub fn evaluate(&self, session: &Session, current_path: &str) -> Option<&'static str> {
        self.firing_rule(session, current_path).map(GatingRule::target)
    }

    fn firing_rule(&self, session: &Session, current_path: &str) -> Option<GatingRule> {
        if session.loading || session.identity.is_none() {
            return None;
        }
        GatingRule::ALL
            .into_iter()
            .filter(|rule| self.is_enabled(*rule))
            .find(|rule| rule.triggered_by(session))
            .filter(|rule| rule.target() != current_path)
    }

    /// Observe session changes and navigate whenever a rule fires.
    ///
    /// Runs until every sender for `sessions` is dropped.
    pub async fn watch(self, mut sessions: watch::Receiver<Session>, location: Arc<dyn Location>) {
        loop {
            let rule = {
                let session = sessions.borrow_and_update();
                self.firing_rule(&session, &location.path())
            };
            if let Some(rule) = rule {
                tracing::info!(rule = rule.name(), target = rule.target(), "gating redirect");
                location.navigate(rule.target());
            }
            if sessions.changed().await.is_err() {
                break;
            }
        }
    }

    /// Spawn [`RedirectPolicy::watch`] onto the current tokio runtime.
    #[must_use]
    pub fn spawn(self, sessions: watch::Receiver<Session>, location: Arc<dyn Location>) -> JoinHandle<()> {
        tokio::spawn(self.watch(sessions, location))
    }
}

#[cfg(test)]
#[path = "redirect_test.rs"]
mod tests;
