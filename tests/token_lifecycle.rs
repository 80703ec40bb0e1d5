mod support;

use std::sync::Arc;

use chrono::Duration;

use session_tokens::auth::{
    session, AccessToken, RefreshToken, RotationPolicy, SlidingToken, UntypedToken, UserId,
};
use session_tokens::clock::datetime_to_epoch;
use session_tokens::TokenError;
use support::{test_context, InMemoryBlacklist, TestUser, NOW};

fn alice() -> TestUser {
    TestUser::new(42, "alice")
}

#[test]
fn issued_refresh_tokens_are_recorded_as_outstanding() {
    let blacklist = Arc::new(InMemoryBlacklist::default());
    let ctx = test_context(|context| context.with_blacklist(blacklist.clone()));

    let refresh = RefreshToken::for_user(&ctx.context, &alice()).unwrap();
    let jti = refresh.claims().jti().unwrap();
    let record = blacklist.outstanding(jti).expect("outstanding record");

    assert_eq!(record.token, refresh.encode().unwrap());
    assert_eq!(record.user_id, Some(UserId::Int(42)));
    assert_eq!(record.created_at.map(datetime_to_epoch), Some(NOW));
    assert_eq!(datetime_to_epoch(record.expires_at), NOW + 86_400);

    // Access tokens are never tracked
    AccessToken::for_user(&ctx.context, &alice()).unwrap();
    assert_eq!(blacklist.outstanding_count(), 1);
}

#[test]
fn revoked_refresh_token_can_no_longer_be_used() {
    let blacklist = Arc::new(InMemoryBlacklist::default());
    let ctx = test_context(|context| context.with_blacklist(blacklist.clone()));
    let pair = session::obtain_pair(&ctx.context, &alice()).unwrap();

    assert_eq!(session::revoke(&ctx.context, &pair.refresh), Ok(true));

    assert_eq!(
        RefreshToken::from_encoded(&ctx.context, &pair.refresh, true).unwrap_err(),
        TokenError::Blacklisted
    );
    assert_eq!(
        session::refresh_pair(&ctx.context, &pair.refresh).unwrap_err(),
        TokenError::Blacklisted
    );
    assert_eq!(
        session::verify(&ctx.context, &pair.refresh).unwrap_err(),
        TokenError::Blacklisted
    );
    // Already revoked tokens fail verification before they reach the store
    assert_eq!(
        session::revoke(&ctx.context, &pair.refresh).unwrap_err(),
        TokenError::Blacklisted
    );
    // The access token lives on until it expires
    assert!(session::verify(&ctx.context, &pair.access).is_ok());
}

#[test]
fn blacklisting_twice_reports_existing_entry() {
    let blacklist = Arc::new(InMemoryBlacklist::default());
    let ctx = test_context(|context| context.with_blacklist(blacklist.clone()));
    let refresh = RefreshToken::for_user(&ctx.context, &alice()).unwrap();

    assert_eq!(refresh.blacklist(), Ok(true));
    assert_eq!(refresh.blacklist(), Ok(false));
}

#[test]
fn rotation_with_blacklisting_retires_the_old_refresh_token() {
    let blacklist = Arc::new(InMemoryBlacklist::default());
    let ctx = test_context(|context| {
        context
            .with_rotation(RotationPolicy {
                rotate_refresh_tokens: true,
                blacklist_after_rotation: true,
            })
            .with_blacklist(blacklist.clone())
    });
    let pair = session::obtain_pair(&ctx.context, &alice()).unwrap();

    ctx.clock.advance(Duration::hours(1));
    let refreshed = session::refresh_pair(&ctx.context, &pair.refresh).unwrap();
    let rotated = refreshed.refresh.expect("rotated refresh token");

    assert_eq!(
        session::refresh_pair(&ctx.context, &pair.refresh).unwrap_err(),
        TokenError::Blacklisted
    );

    let token = RefreshToken::from_encoded(&ctx.context, &rotated, true).unwrap();
    let record = blacklist
        .outstanding(token.claims().jti().unwrap())
        .expect("rotated token is outstanding");
    assert_eq!(record.token, rotated);
    assert_eq!(datetime_to_epoch(record.expires_at), NOW + 3_600 + 86_400);

    let access = AccessToken::from_encoded(&ctx.context, &refreshed.access, true).unwrap();
    assert_eq!(access.claims().exp(), Some(NOW + 3_600 + 300));
    assert_eq!(access.claims().user_id(), Some(&serde_json::json!(42)));
}

#[test]
fn refresh_token_expires_after_its_lifetime() {
    let ctx = test_context(|context| context);
    let pair = session::obtain_pair(&ctx.context, &alice()).unwrap();

    ctx.clock.advance(Duration::hours(23));
    assert!(session::refresh_pair(&ctx.context, &pair.refresh).is_ok());

    ctx.clock.advance(Duration::hours(1));
    assert_eq!(
        session::refresh_pair(&ctx.context, &pair.refresh).unwrap_err(),
        TokenError::Invalid
    );
}

#[test]
fn sliding_token_can_be_revoked() {
    let blacklist = Arc::new(InMemoryBlacklist::default());
    let ctx = test_context(|context| context.with_blacklist(blacklist.clone()));
    let encoded = session::obtain_sliding(&ctx.context, &alice()).unwrap();

    let sliding = SlidingToken::from_encoded(&ctx.context, &encoded, true).unwrap();
    assert!(blacklist.outstanding(sliding.claims().jti().unwrap()).is_some());
    assert_eq!(sliding.blacklist(), Ok(true));

    assert_eq!(
        session::refresh_sliding(&ctx.context, &encoded).unwrap_err(),
        TokenError::Blacklisted
    );
}

#[test]
fn unverified_decode_skips_expiry_and_blacklist() {
    let blacklist = Arc::new(InMemoryBlacklist::default());
    let ctx = test_context(|context| context.with_blacklist(blacklist.clone()));
    let refresh = RefreshToken::for_user(&ctx.context, &alice()).unwrap();
    let encoded = refresh.encode().unwrap();
    refresh.blacklist().unwrap();

    ctx.clock.advance(Duration::days(2));
    let decoded = UntypedToken::from_encoded(&ctx.context, &encoded, false).unwrap();

    assert_eq!(decoded.claims().jti(), refresh.claims().jti());
}
