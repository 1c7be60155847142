use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use mathmind::config::ConfigError;
use mathmind::gateway::GatewayError;
use mathmind::session::location::{Location, LocationError, MemoryLocation};
use mathmind::session::storage::FileStorage;
use mathmind::verification::{OtpInput, ResendFlow, VerificationError, VerificationFlow, VerificationKind};
use mathmind::{Gateway, GatewayConfig, HttpGateway, RedirectPolicy, Session, SessionError, SessionStore};
use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("{}", .0.user_message())]
    Session(#[from] SessionError),
    #[error("{}", .0.user_message())]
    Verification(#[from] VerificationError),
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error("not signed in; run `mathmind login` first")]
    NotSignedIn,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "mathmind", about = "MathMind session and verification CLI")]
struct Cli {
    #[arg(long, env = "MATHMIND_GATEWAY_URL")]
    gateway_url: String,

    #[arg(long, env = "MATHMIND_APP_URL", default_value = "http://localhost:3000/")]
    app_url: String,

    #[arg(long, env = "MATHMIND_STATE_FILE", default_value = ".mathmind-session.json")]
    state_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Restore the persisted session and print it.
    Whoami,
    /// Complete an OAuth redirect carrying `?token=...`.
    Callback { url: String },
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "MATHMIND_PASSWORD")]
        password: String,
    },
    Logout,
    ProfileStatus,
    PasswordStatus,
    SetPassword {
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm: String,
    },
    VerifyEmail {
        #[arg(long)]
        email: String,
        #[arg(long)]
        code: String,
    },
    ResendOtp {
        #[arg(long)]
        email: String,
    },
    VerifyGuardian {
        #[arg(long)]
        code: String,
    },
}

struct CliContext {
    gateway: Arc<dyn Gateway>,
    storage: Arc<FileStorage>,
    redirect: RedirectPolicy,
}

impl CliContext {
    fn store_at(&self, href: &str) -> Result<SessionStore, CliError> {
        let location = Arc::new(MemoryLocation::new(href)?);
        Ok(SessionStore::new(self.gateway.clone(), self.storage.clone(), location))
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = GatewayConfig::from_env_with_base_url(&cli.gateway_url)?;
    let ctx = CliContext {
        gateway: Arc::new(HttpGateway::new(&config)?),
        storage: Arc::new(FileStorage::new(cli.state_file)),
        redirect: config.redirect,
    };
    tracing::debug!(gateway = %config.base_url, "cli configured");

    match cli.command {
        Command::Whoami => run_whoami(&ctx, &cli.app_url).await,
        Command::Callback { url } => run_whoami(&ctx, &url).await,
        Command::Login { email, password } => run_login(&ctx, &cli.app_url, &email, &password).await,
        Command::Logout => run_logout(&ctx, &cli.app_url).await,
        Command::ProfileStatus => run_profile_status(&ctx, &cli.app_url).await,
        Command::PasswordStatus => run_password_status(&ctx, &cli.app_url).await,
        Command::SetPassword { password, confirm } => run_set_password(&ctx, &cli.app_url, &password, &confirm).await,
        Command::VerifyEmail { email, code } => run_verify_email(&ctx, &cli.app_url, &email, &code).await,
        Command::ResendOtp { email } => run_resend_otp(&ctx, &email).await,
        Command::VerifyGuardian { code } => run_verify_guardian(&ctx, &cli.app_url, &code).await,
    }
}

async fn run_whoami(ctx: &CliContext, href: &str) -> Result<(), CliError> {
    let store = ctx.store_at(href)?;
    let session = store.mount().await;
    print_session(ctx, &store, &session)
}

async fn run_login(ctx: &CliContext, href: &str, email: &str, password: &str) -> Result<(), CliError> {
    let store = ctx.store_at(href)?;
    let session = store.sign_in(email, password).await?;
    print_session(ctx, &store, &session)
}

async fn run_logout(ctx: &CliContext, href: &str) -> Result<(), CliError> {
    let store = ctx.store_at(href)?;
    store.logout().await;
    print_json(&json!({ "ok": true, "location": store.location().href() }))
}

async fn run_profile_status(ctx: &CliContext, href: &str) -> Result<(), CliError> {
    let store = mounted_store(ctx, href).await?;
    let profile_completed = store.check_profile_status().await;
    print_json(&json!({ "profile_completed": profile_completed }))
}

async fn run_password_status(ctx: &CliContext, href: &str) -> Result<(), CliError> {
    let store = mounted_store(ctx, href).await?;
    let password_setup_required = store.check_password_setup().await;
    print_json(&json!({ "password_setup_required": password_setup_required }))
}

async fn run_set_password(ctx: &CliContext, href: &str, password: &str, confirm: &str) -> Result<(), CliError> {
    let store = mounted_store(ctx, href).await?;
    store.setup_password(password, confirm).await?;
    print_session(ctx, &store, &store.snapshot())
}

async fn run_verify_email(ctx: &CliContext, href: &str, email: &str, code: &str) -> Result<(), CliError> {
    let location = Arc::new(MemoryLocation::new(href)?);
    let flow = VerificationFlow::new(VerificationKind::EmailOtp, ctx.gateway.clone(), location.clone())
        .with_success_delay(Duration::ZERO);
    let input = otp_input(VerificationKind::EmailOtp, code);
    flow.verify_email(email, &input).await?;
    print_json(&json!({ "state": flow.state(), "message": flow.message(), "location": location.href() }))
}

async fn run_resend_otp(ctx: &CliContext, email: &str) -> Result<(), CliError> {
    let resend = ResendFlow::new(ctx.gateway.clone());
    resend.resend(email).await?;
    print_json(&json!({ "ok": true, "cooldown_secs": resend.cooldown().remaining() }))
}

async fn run_verify_guardian(ctx: &CliContext, href: &str, code: &str) -> Result<(), CliError> {
    let store = mounted_store(ctx, href).await?;
    let token = store.snapshot().token.ok_or(CliError::NotSignedIn)?;
    let flow = VerificationFlow::new(VerificationKind::Guardian, ctx.gateway.clone(), store.location().clone())
        .with_success_delay(Duration::ZERO);
    let input = otp_input(VerificationKind::Guardian, code);
    flow.verify_guardian(&token, &input).await?;
    print_json(&json!({ "state": flow.state(), "message": flow.message(), "location": store.location().href() }))
}

async fn mounted_store(ctx: &CliContext, href: &str) -> Result<SessionStore, CliError> {
    let store = ctx.store_at(href)?;
    let session = store.mount().await;
    if session.token.is_none() {
        return Err(CliError::NotSignedIn);
    }
    Ok(store)
}

fn otp_input(kind: VerificationKind, code: &str) -> OtpInput {
    let mut input = OtpInput::for_kind(kind);
    input.paste(0, code);
    input
}

/// Session as JSON with the bearer token reduced to a presence flag.
fn session_json(session: &Session, redirect: Option<&str>) -> Value {
    json!({
        "authenticated": session.is_authenticated(),
        "has_token": session.token.is_some(),
        "identity": session.identity,
        "profile_completed": session.profile_completed,
        "password_setup_required": session.password_setup_required,
        "redirect": redirect,
    })
}

fn print_session(ctx: &CliContext, store: &SessionStore, session: &Session) -> Result<(), CliError> {
    let redirect = ctx.redirect.evaluate(session, &store.location().path());
    print_json(&session_json(session, redirect))
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
