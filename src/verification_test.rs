use super::*;
use crate::session::location::MemoryLocation;
use crate::test_helpers::{APP_URL, MockGateway, transport_error};

fn flow(kind: VerificationKind) -> (Arc<MockGateway>, Arc<MemoryLocation>, VerificationFlow) {
    let gateway = Arc::new(MockGateway::new());
    let location = Arc::new(MemoryLocation::new(APP_URL).unwrap());
    let flow = VerificationFlow::new(kind, gateway.clone(), location.clone()).with_success_delay(Duration::ZERO);
    (gateway, location, flow)
}

fn filled(kind: VerificationKind, digits: &str) -> OtpInput {
    let mut input = OtpInput::for_kind(kind);
    input.paste(0, digits);
    input
}

// =============================================================================
// OtpInput
// =============================================================================

#[test]
fn paste_strips_non_digits_and_truncates() {
    let mut input = OtpInput::new(6);
    input.paste(0, "12a3456789");
    assert_eq!(input.value(), "123456");
    assert!(input.is_complete());
}

#[test]
fn paste_mid_field_fills_from_index() {
    let mut input = OtpInput::new(6);
    input.input(0, '9');
    let focus = input.paste(2, "1-2");
    assert_eq!(input.value(), "912");
    assert_eq!(focus, 4);
    assert!(!input.is_complete());
}

#[test]
fn paste_into_guardian_field_keeps_eight_digits() {
    let mut input = OtpInput::for_kind(VerificationKind::Guardian);
    input.paste(0, "1234 5678 90");
    assert_eq!(input.value(), "12345678");
}

#[test]
fn typing_rejects_non_digits() {
    let mut input = OtpInput::new(6);
    assert_eq!(input.input(0, 'x'), 0);
    assert!(input.is_empty());
    assert_eq!(input.input(0, '4'), 1);
    assert_eq!(input.value(), "4");
}

#[test]
fn typing_last_slot_keeps_focus_there() {
    let mut input = OtpInput::new(6);
    assert_eq!(input.input(5, '1'), 5);
}

#[test]
fn backspace_on_empty_slot_clears_previous() {
    let mut input = OtpInput::new(6);
    input.paste(0, "12");
    assert_eq!(input.backspace(2), 1);
    assert_eq!(input.value(), "1");
    assert_eq!(input.backspace(0), 0);
    assert!(input.is_empty());
    assert_eq!(input.backspace(0), 0);
}

#[test]
fn incomplete_code_names_expected_width() {
    let input = filled(VerificationKind::EmailOtp, "123");
    assert_eq!(input.code(), Err(ValidationError::IncompleteCode { expected: 6 }));
}

#[test]
fn sanitize_code_is_digit_only() {
    assert_eq!(sanitize_code(" 98-76 54x3", 6), "987654");
    assert_eq!(sanitize_code("abc", 6), "");
}

#[test]
fn kinds_have_expected_widths_and_destinations() {
    assert_eq!(VerificationKind::EmailOtp.code_len(), 6);
    assert_eq!(VerificationKind::Guardian.code_len(), 8);
    assert_eq!(VerificationKind::EmailOtp.destination(), "/login");
    assert_eq!(VerificationKind::Guardian.destination(), "/profile");
}

// =============================================================================
// VerificationFlow
// =============================================================================

#[tokio::test]
async fn email_success_navigates_to_login() {
    let (gateway, location, flow) = flow(VerificationKind::EmailOtp);
    let input = filled(VerificationKind::EmailOtp, "123456");

    flow.verify_email("ana@mathmind.test", &input).await.unwrap();

    assert_eq!(flow.state(), AttemptState::Success);
    assert_eq!(flow.message().as_deref(), Some("Email verified"));
    assert_eq!(location.path(), "/login");
    assert_eq!(gateway.call_count("verify_email_otp"), 1);
}

#[tokio::test]
async fn guardian_success_navigates_to_profile() {
    let (gateway, location, flow) = flow(VerificationKind::Guardian);
    let input = filled(VerificationKind::Guardian, "12345678");

    flow.verify_guardian("guardian-token", &input).await.unwrap();

    assert_eq!(flow.state(), AttemptState::Success);
    assert_eq!(location.path(), "/profile");
    assert_eq!(gateway.call_count("verify_guardian"), 1);
}

#[tokio::test]
async fn rejection_keeps_message_and_allows_retry() {
    let (gateway, location, flow) = flow(VerificationKind::EmailOtp);
    *gateway.verify_email_result.lock().unwrap() =
        Err(GatewayError::Rejected { code: 1010, message: "Invalid or expired OTP".into() });
    let input = filled(VerificationKind::EmailOtp, "000000");

    let err = flow.verify_email("ana@mathmind.test", &input).await.unwrap_err();
    assert_eq!(err.user_message(), "Invalid or expired OTP");
    assert_eq!(flow.state(), AttemptState::Error);
    assert_eq!(flow.message().as_deref(), Some("Invalid or expired OTP"));
    assert_eq!(location.path(), "/dashboard");

    *gateway.verify_email_result.lock().unwrap() = Ok("ok".into());
    flow.verify_email("ana@mathmind.test", &input).await.unwrap();
    assert_eq!(flow.state(), AttemptState::Success);
}

#[tokio::test]
async fn transport_failure_uses_generic_message() {
    let (gateway, _location, flow) = flow(VerificationKind::Guardian);
    *gateway.guardian_result.lock().unwrap() = Err(transport_error());
    let input = filled(VerificationKind::Guardian, "12345678");

    flow.verify_guardian("t", &input).await.unwrap_err();
    assert_eq!(flow.message().as_deref(), Some("Something went wrong. Please try again."));
}

#[tokio::test]
async fn incomplete_code_is_not_submitted() {
    let (gateway, _location, flow) = flow(VerificationKind::EmailOtp);
    let input = filled(VerificationKind::EmailOtp, "12");

    let err = flow.verify_email("ana@mathmind.test", &input).await.unwrap_err();
    assert!(matches!(err, VerificationError::Validation(ValidationError::IncompleteCode { expected: 6 })));
    assert_eq!(flow.state(), AttemptState::Idle);
    assert!(flow.message().is_some());
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn input_width_must_match_kind() {
    let (gateway, _location, flow) = flow(VerificationKind::Guardian);
    let input = filled(VerificationKind::EmailOtp, "123456");

    let err = flow.verify_guardian("t", &input).await.unwrap_err();
    assert!(matches!(err, VerificationError::Validation(ValidationError::IncompleteCode { expected: 8 })));
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn success_is_terminal() {
    let (_gateway, _location, flow) = flow(VerificationKind::EmailOtp);
    let input = filled(VerificationKind::EmailOtp, "123456");
    flow.verify_email("ana@mathmind.test", &input).await.unwrap();

    let err = flow.verify_email("ana@mathmind.test", &input).await.unwrap_err();
    assert_eq!(err, VerificationError::AlreadyVerified);
}

#[test]
fn begin_rejects_concurrent_submission() {
    let (_gateway, _location, flow) = flow(VerificationKind::EmailOtp);
    flow.begin().unwrap();
    assert_eq!(flow.state(), AttemptState::Submitting);
    assert_eq!(flow.begin(), Err(VerificationError::InFlight));
}

// =============================================================================
// Resend cooldown
// =============================================================================

#[test]
fn cooldown_counts_down_exactly_sixty_ticks() {
    let mut cooldown = ResendCooldown::default();
    assert!(cooldown.can_resend());
    cooldown.start();
    for _ in 0..59 {
        cooldown.tick();
        assert!(!cooldown.can_resend());
    }
    assert_eq!(cooldown.tick(), 0);
    assert!(cooldown.can_resend());
    assert_eq!(cooldown.tick(), 0);
}

#[tokio::test]
async fn resend_starts_cooldown_and_blocks_repeat() {
    let gateway = Arc::new(MockGateway::new());
    let resend = ResendFlow::new(gateway.clone());

    resend.resend("ana@mathmind.test").await.unwrap();
    assert_eq!(resend.cooldown().remaining(), RESEND_COOLDOWN_TICKS);

    let err = resend.resend("ana@mathmind.test").await.unwrap_err();
    assert_eq!(err, VerificationError::CoolingDown { remaining: 60 });
    assert_eq!(gateway.call_count("resend_otp"), 1);

    for _ in 0..RESEND_COOLDOWN_TICKS {
        assert!(!resend.cooldown().can_resend());
        resend.tick();
    }
    assert!(resend.cooldown().can_resend());
    resend.resend("ana@mathmind.test").await.unwrap();
    assert_eq!(gateway.call_count("resend_otp"), 2);
}

#[tokio::test]
async fn failed_resend_does_not_start_cooldown() {
    let gateway = Arc::new(MockGateway::new());
    *gateway.resend_result.lock().unwrap() = Err(transport_error());
    let resend = ResendFlow::new(gateway);

    resend.resend("ana@mathmind.test").await.unwrap_err();
    assert!(resend.cooldown().can_resend());
    assert!(!resend.is_sending());
}

#[tokio::test]
async fn overlapping_resend_is_rejected_while_first_is_pending() {
    let gateway = Arc::new(MockGateway::new());
    let release = gateway.hold_next_resend();
    let resend = Arc::new(ResendFlow::new(gateway.clone()));

    let first = {
        let resend = resend.clone();
        tokio::spawn(async move { resend.resend("ana@mathmind.test").await })
    };
    while gateway.call_count("resend_otp") == 0 {
        tokio::task::yield_now().await;
    }

    assert!(resend.is_sending());
    let err = resend.resend("ana@mathmind.test").await.unwrap_err();
    assert_eq!(err, VerificationError::InFlight);

    release.send(()).unwrap();
    first.await.unwrap().unwrap();
    assert_eq!(gateway.call_count("resend_otp"), 1);
    assert!(!resend.is_sending());
    assert_eq!(resend.cooldown().remaining(), RESEND_COOLDOWN_TICKS);
}

#[tokio::test(start_paused = true)]
async fn run_cooldown_ticks_once_per_second() {
    let gateway = Arc::new(MockGateway::new());
    let resend = ResendFlow::new(gateway);
    resend.resend("ana@mathmind.test").await.unwrap();

    let started = tokio::time::Instant::now();
    resend.run_cooldown().await;

    assert!(resend.cooldown().can_resend());
    assert_eq!(started.elapsed(), RESEND_TICK * RESEND_COOLDOWN_TICKS);
}

#[tokio::test(start_paused = true)]
async fn run_cooldown_is_still_counting_before_the_last_tick() {
    let gateway = Arc::new(MockGateway::new());
    let resend = Arc::new(ResendFlow::new(gateway));
    resend.resend("ana@mathmind.test").await.unwrap();

    let runner = {
        let resend = resend.clone();
        tokio::spawn(async move { resend.run_cooldown().await })
    };
    tokio::time::sleep(RESEND_TICK * (RESEND_COOLDOWN_TICKS - 1) + Duration::from_millis(500)).await;
    assert_eq!(resend.cooldown().remaining(), 1);
    assert!(!resend.cooldown().can_resend());

    runner.await.unwrap();
    assert!(resend.cooldown().can_resend());
}
