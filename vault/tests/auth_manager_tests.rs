//! Token lifecycle tests against the in-memory engine.

use auth_vault_lease::{AuthState, ErrorKind, VaultError};
use futures::future::join_all;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;
use test_utils::{at, init_test_tracing, test_config, Harness, Op};

#[tokio::test]
async fn test_token_grace_period_renewal_sequence() {
    init_test_tracing();
    let h = Harness::new();

    let token = h.auth.login(None).await.unwrap();
    assert_eq!(token.client_token().expose_secret(), "1");

    // Outside the grace window: cached token, validated but not reissued.
    h.set_time(2);
    let token = h.auth.login(Some(token)).await.unwrap();
    assert_eq!(token.client_token().expose_secret(), "1");
    assert_eq!(h.engine.calls(Op::Login), 1);
    assert_eq!(h.engine.calls(Op::RenewSelf), 0);

    // Inside the grace window: renewed in place.
    h.set_time(8);
    let token = h.auth.login(Some(token)).await.unwrap();
    assert_eq!(token.client_token().expose_secret(), "2");
    assert_eq!(token.lease().created_at(), at(8));
    assert_eq!(h.engine.calls(Op::RenewSelf), 1);

    // Validation rejects the token: fresh login.
    h.set_time(10);
    h.engine.fail_next(Op::LookupSelf, ErrorKind::Authentication);
    let token = h.auth.login(Some(token)).await.unwrap();
    assert_eq!(token.client_token().expose_secret(), "3");
    assert_eq!(h.engine.calls(Op::Login), 2);

    // Expired: fresh login.
    h.set_time(22);
    let token = h.auth.login(Some(token)).await.unwrap();
    assert_eq!(token.client_token().expose_secret(), "4");
    assert_eq!(h.engine.calls(Op::Login), 3);

    // Server shortens the lease: still a renewal, shorter duration stored.
    h.engine.set_token_lease(2, true);
    h.set_time(30);
    let token = h.auth.login(Some(token)).await.unwrap();
    assert_eq!(token.client_token().expose_secret(), "5");
    assert_eq!(token.lease().lease_duration_secs(), 2);
    assert_eq!(token.lease().created_at(), at(30));
    assert_eq!(h.engine.calls(Op::RenewSelf), 2);
}

#[tokio::test]
async fn test_reuse_without_validation_makes_no_call() {
    let h = Harness::with_config(&test_config().with_token_validation(false));

    let token = h.auth.login(None).await.unwrap();
    let before = h.engine.total_calls();

    h.set_time(2);
    let token = h.auth.login(Some(token)).await.unwrap();
    assert_eq!(token.client_token().expose_secret(), "1");
    assert_eq!(h.engine.total_calls(), before);
}

#[tokio::test]
async fn test_state_follows_the_clock() {
    let h = Harness::new();
    assert_eq!(h.auth.state().await, AuthState::NoToken);

    h.auth.current_token().await.unwrap();
    assert_eq!(h.auth.state().await, AuthState::Valid);

    h.set_time(8);
    assert_eq!(h.auth.state().await, AuthState::Renewing);

    h.set_time(10);
    assert_eq!(h.auth.state().await, AuthState::Invalid);

    h.auth.invalidate().await;
    assert_eq!(h.auth.state().await, AuthState::NoToken);
}

#[tokio::test]
async fn test_current_token_caches_in_slot() {
    let h = Harness::new();

    let first = h.auth.client_token().await.unwrap();
    h.set_time(1);
    let second = h.auth.client_token().await.unwrap();

    assert_eq!(first.expose_secret(), second.expose_secret());
    assert_eq!(h.engine.calls(Op::Login), 1);
}

#[tokio::test]
async fn test_transient_renewal_failure_keeps_token() {
    let h = Harness::new();
    h.auth.current_token().await.unwrap();

    h.set_time(8);
    h.engine.fail_next(Op::RenewSelf, ErrorKind::Transient);
    let err = h.auth.current_token().await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(h.auth.state().await, AuthState::Renewing);
    assert_eq!(h.engine.calls(Op::Login), 1);

    let token = h.auth.current_token().await.unwrap();
    assert_eq!(token.client_token().expose_secret(), "2");
    assert_eq!(h.engine.calls(Op::Login), 1);
}

#[tokio::test]
async fn test_transient_validation_failure_is_surfaced() {
    let h = Harness::new();
    h.auth.current_token().await.unwrap();

    h.set_time(2);
    h.engine.fail_next(Op::LookupSelf, ErrorKind::Transient);
    let err = h.auth.current_token().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transient);
    assert_eq!(h.auth.state().await, AuthState::Valid);
    assert_eq!(h.engine.calls(Op::Login), 1);
}

#[tokio::test]
async fn test_rejected_renewal_falls_back_to_one_login() {
    let h = Harness::new();
    h.auth.current_token().await.unwrap();

    h.set_time(8);
    h.engine.fail_next(Op::RenewSelf, ErrorKind::Authentication);
    let token = h.auth.current_token().await.unwrap();

    assert_eq!(token.client_token().expose_secret(), "2");
    assert_eq!(token.lease().created_at(), at(8));
    assert_eq!(h.engine.calls(Op::Login), 2);
}

#[tokio::test]
async fn test_failed_relogin_propagates_and_clears_slot() {
    let h = Harness::new();
    h.auth.current_token().await.unwrap();

    h.set_time(2);
    h.engine.revoke_all_tokens();
    h.engine.fail_next(Op::Login, ErrorKind::Authentication);

    let err = h.auth.current_token().await.unwrap_err();
    assert!(matches!(err, VaultError::Authentication(_)));
    assert_eq!(h.engine.calls(Op::Login), 2);
    assert_eq!(h.auth.state().await, AuthState::NoToken);

    let token = h.auth.current_token().await.unwrap();
    assert_eq!(token.client_token().expose_secret(), "2");
}

#[tokio::test]
async fn test_discard_only_drops_the_rejected_token() {
    let h = Harness::new();
    let token = h.auth.client_token().await.unwrap();

    assert!(!h.auth.discard(&SecretString::from("stale")).await);
    assert_eq!(h.auth.state().await, AuthState::Valid);

    assert!(h.auth.discard(&token).await);
    assert_eq!(h.auth.state().await, AuthState::NoToken);
}

#[tokio::test]
async fn test_non_renewable_token_is_replaced_before_expiry() {
    let h = Harness::new();
    h.engine.set_token_lease(10, false);
    h.auth.current_token().await.unwrap();

    h.set_time(8);
    let token = h.auth.current_token().await.unwrap();

    assert_eq!(token.client_token().expose_secret(), "2");
    assert_eq!(h.engine.calls(Op::RenewSelf), 0);
    assert_eq!(h.engine.calls(Op::Login), 2);
}

#[tokio::test]
async fn test_non_positive_token_lease_is_protocol_error() {
    let h = Harness::new();
    h.engine.set_token_lease(0, true);

    let err = h.auth.current_token().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(h.auth.state().await, AuthState::NoToken);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_one_renewal() {
    let h = Arc::new(Harness::new());
    h.auth.current_token().await.unwrap();

    h.set_time(8);
    h.engine.set_latency(Duration::from_millis(20));

    let handles = (0..16).map(|_| {
        let h = Arc::clone(&h);
        tokio::spawn(async move { h.auth.client_token().await })
    });
    let tokens: Vec<String> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap().expose_secret().to_string())
        .collect();

    assert!(tokens.iter().all(|t| t == "2"));
    assert_eq!(h.engine.calls(Op::RenewSelf), 1);
    assert_eq!(h.engine.calls(Op::Login), 1);
}
