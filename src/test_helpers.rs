//! Scripted gateway and fixtures shared by unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::gateway::{Credentials, Gateway, GatewayError, Introspection, ProfileStatus, Role};
use crate::session::SessionStore;
use crate::session::location::MemoryLocation;
use crate::session::storage::MemoryStorage;

pub const APP_URL: &str = "https://app.mathmind.test/dashboard";

#[must_use]
pub fn valid_introspection(id: &str, role: Role, password_setup_required: bool) -> Introspection {
    Introspection {
        valid: true,
        id: Some(id.to_owned()),
        email: Some(format!("{id}@mathmind.test")),
        role: Some(role),
        password_setup_required,
    }
}

#[must_use]
pub fn transport_error() -> GatewayError {
    GatewayError::Transport("connection refused".to_owned())
}

// =========================================================================
// MockGateway
// =========================================================================

/// Gateway whose responses are scripted per call.
///
/// Introspection pops scripted results in call order and falls back to
/// `default_introspection`. [`MockGateway::hold_next_introspection`] parks
/// the next introspect call until the returned sender fires, and
/// [`MockGateway::hold_next_resend`] does the same for `resend_otp`.
pub struct MockGateway {
    introspections: Mutex<VecDeque<Result<Introspection, GatewayError>>>,
    default_introspection: Mutex<Result<Introspection, GatewayError>>,
    held: Mutex<Option<oneshot::Receiver<()>>>,
    held_resend: Mutex<Option<oneshot::Receiver<()>>>,
    pub login_result: Mutex<Result<String, GatewayError>>,
    pub logout_result: Mutex<Result<(), GatewayError>>,
    pub profile_result: Mutex<Result<ProfileStatus, GatewayError>>,
    pub verify_email_result: Mutex<Result<String, GatewayError>>,
    pub resend_result: Mutex<Result<(), GatewayError>>,
    pub guardian_result: Mutex<Result<serde_json::Value, GatewayError>>,
    pub set_password_result: Mutex<Result<(), GatewayError>>,
    calls: Mutex<Vec<String>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            introspections: Mutex::new(VecDeque::new()),
            default_introspection: Mutex::new(Ok(valid_introspection("u-1", Role::Student, false))),
            held: Mutex::new(None),
            held_resend: Mutex::new(None),
            login_result: Mutex::new(Ok("issued-token".to_owned())),
            logout_result: Mutex::new(Ok(())),
            profile_result: Mutex::new(Ok(ProfileStatus { profile_completed: true })),
            verify_email_result: Mutex::new(Ok("Email verified".to_owned())),
            resend_result: Mutex::new(Ok(())),
            guardian_result: Mutex::new(Ok(serde_json::json!({ "studentId": "s-1" }))),
            set_password_result: Mutex::new(Ok(())),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_introspection(&self, result: Result<Introspection, GatewayError>) {
        *self.default_introspection.lock().unwrap() = result;
    }

    pub fn push_introspection(&self, result: Result<Introspection, GatewayError>) {
        self.introspections.lock().unwrap().push_back(result);
    }

    pub fn hold_next_introspection(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.held.lock().unwrap() = Some(rx);
        tx
    }

    /// Park the next `resend_otp` call until the returned sender fires.
    pub fn hold_next_resend(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.held_resend.lock().unwrap() = Some(rx);
        tx
    }

    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    #[must_use]
    pub fn call_count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.as_str() == name).count()
    }

    fn record(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_owned());
    }
}

#[async_trait::async_trait]
impl Gateway for MockGateway {
    async fn introspect(&self, _token: &str) -> Result<Introspection, GatewayError> {
        self.record("introspect");
        let scripted = self.introspections.lock().unwrap().pop_front();
        let result = scripted.unwrap_or_else(|| self.default_introspection.lock().unwrap().clone());
        let held = self.held.lock().unwrap().take();
        if let Some(rx) = held {
            let _ = rx.await;
        }
        result
    }

    async fn login(&self, _credentials: &Credentials) -> Result<String, GatewayError> {
        self.record("login");
        self.login_result.lock().unwrap().clone()
    }

    async fn logout(&self, _token: &str) -> Result<(), GatewayError> {
        self.record("logout");
        self.logout_result.lock().unwrap().clone()
    }

    async fn profile_status(&self, _token: &str) -> Result<ProfileStatus, GatewayError> {
        self.record("profile_status");
        self.profile_result.lock().unwrap().clone()
    }

    async fn verify_email_otp(&self, _email: &str, _code: &str) -> Result<String, GatewayError> {
        self.record("verify_email_otp");
        self.verify_email_result.lock().unwrap().clone()
    }

    async fn resend_otp(&self, _email: &str) -> Result<(), GatewayError> {
        self.record("resend_otp");
        let result = self.resend_result.lock().unwrap().clone();
        let held = self.held_resend.lock().unwrap().take();
        if let Some(rx) = held {
            let _ = rx.await;
        }
        result
    }

    async fn verify_guardian(&self, _token: &str, _code: &str) -> Result<serde_json::Value, GatewayError> {
        self.record("verify_guardian");
        self.guardian_result.lock().unwrap().clone()
    }

    async fn set_password(&self, _token: &str, _password: &str) -> Result<(), GatewayError> {
        self.record("set_password");
        self.set_password_result.lock().unwrap().clone()
    }
}

// =========================================================================
// Store fixture
// =========================================================================

pub struct Fixture {
    pub gateway: Arc<MockGateway>,
    pub storage: Arc<MemoryStorage>,
    pub location: Arc<MemoryLocation>,
    pub store: Arc<SessionStore>,
}

#[must_use]
pub fn fixture_at(href: &str, storage: MemoryStorage) -> Fixture {
    let gateway = Arc::new(MockGateway::new());
    let storage = Arc::new(storage);
    let location = Arc::new(MemoryLocation::new(href).unwrap());
    let store = Arc::new(SessionStore::new(gateway.clone(), storage.clone(), location.clone()));
    Fixture { gateway, storage, location, store }
}

#[must_use]
pub fn fixture() -> Fixture {
    fixture_at(APP_URL, MemoryStorage::new())
}
