use super::*;
use axum::http::Request;
use jsonwebtoken::{EncodingKey, Header, encode};

const USER_SECRET: &str = "user-secret-for-unit-testing-1234567890";
const BUS_SECRET: &str = "bus-secret-for-unit-testing-0987654321";

fn keys() -> JwtKeys {
    JwtKeys::new(USER_SECRET, BUS_SECRET)
}

fn user_token(sub: &str, exp: usize, secret: &str) -> String {
    let claims = UserClaims {
        sub: sub.to_string(),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn bus_token(secret: &str) -> String {
    let claims = BusClaims {
        sub: "12".to_string(),
        bus_name: "Green Line".to_string(),
        route_id: 3,
        exp: 9999999999,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

#[test]
fn test_verify_user_success() {
    let token = user_token("42", 9999999999, USER_SECRET);
    assert_eq!(keys().verify_user(&token).unwrap(), AuthUser { user_id: 42 });
}

#[test]
fn test_verify_user_expired() {
    let token = user_token("42", 1, USER_SECRET);
    assert!(keys().verify_user(&token).is_err());
}

#[test]
fn test_verify_user_invalid_signature() {
    let token = user_token("42", 9999999999, "wrongsecret");
    assert!(keys().verify_user(&token).is_err());
}

#[test]
fn test_verify_user_non_numeric_subject() {
    let token = user_token("123e4567-e89b-12d3-a456-426614174000", 9999999999, USER_SECRET);
    assert!(keys().verify_user(&token).is_err());
}

#[test]
fn test_rider_token_is_not_a_bus_token() {
    let token = bus_token(USER_SECRET);
    assert!(keys().verify_bus(&token).is_err());
}

#[test]
fn test_verify_bus_success() {
    let token = bus_token(BUS_SECRET);
    assert_eq!(
        keys().verify_bus(&token).unwrap(),
        AuthBus {
            bus_id: 12,
            bus_name: "Green Line".to_string(),
            route_id: 3,
        }
    );
}

#[tokio::test]
async fn test_extractor_reads_bearer_header() {
    let token = user_token("7", 9999999999, USER_SECRET);
    let request = Request::builder()
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .extension(Arc::new(keys()))
        .body(())
        .unwrap();
    let (mut parts, _) = request.into_parts();

    let user = AuthUser::from_request_parts(&mut parts, &()).await.unwrap();
    assert_eq!(user.user_id, 7);
}

#[tokio::test]
async fn test_extractor_rejects_missing_header() {
    let request = Request::builder()
        .extension(Arc::new(keys()))
        .body(())
        .unwrap();
    let (mut parts, _) = request.into_parts();

    assert!(AuthUser::from_request_parts(&mut parts, &()).await.is_err());
}
