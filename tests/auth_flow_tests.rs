//! End-to-end flow tests over the assembled server state and router.
//!
//! Everything runs in-process: in-memory user store, moka session store
//! and a wiremock identity provider.
//! Run with: cargo test --test auth_flow_tests

use authgate::api::create_router;
use authgate::api::handlers::AppState;
use authgate::auth::error::AuthError;
use authgate::auth::service::TokenPair;
use authgate::users::store::UserStore;
use authgate::{build_state, AuthConfig, Config, ProviderConfig};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "integration-secret-at-least-32-bytes";

fn config(providers: BTreeMap<String, ProviderConfig>) -> Config {
    Config {
        server_port: 0,
        public_url: None,
        auth: AuthConfig {
            jwt_secret: SECRET.to_string(),
            bcrypt_cost: 4,
            ..AuthConfig::default()
        },
        session_max_capacity: 100,
        providers,
    }
}

fn state() -> AppState {
    build_state(&config(BTreeMap::new())).unwrap()
}

fn mock_provider(base: &str) -> ProviderConfig {
    ProviderConfig {
        client_id: "it-client".to_string(),
        client_secret: "it-secret".to_string(),
        redirect_uri: "http://localhost:8080/callback".to_string(),
        auth_endpoint: Some(format!("{}/authorize", base)),
        token_endpoint: Some(format!("{}/token", base)),
        userinfo_endpoint: Some(format!("{}/userinfo", base)),
        scopes: None,
    }
}

async fn post_json(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let resp = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// Begin a provider login and pull the `state` out of the authorization URL.
async fn start_login(app: &axum::Router, provider: &str) -> String {
    let (status, body) = get_json(app, &format!("/api/auth/oauth2/{}", provider)).await;
    assert_eq!(status, StatusCode::OK);
    let url = body["authUrl"].as_str().unwrap();
    url.split("state=")
        .nth(1)
        .and_then(|rest| rest.split('&').next())
        .unwrap()
        .to_string()
}

// ============================================================================
// Password accounts
// ============================================================================

#[tokio::test]
async fn test_rotation_and_replay_scenario() {
    let state = state();
    let auth = &state.auth;

    auth.sign_up("a@x.com", "secret123", "nick").await.unwrap();
    let t1 = auth.login("a@x.com", "secret123").await.unwrap();
    assert!(!t1.access_token.is_empty());
    assert!(!t1.refresh_token.is_empty());

    let t2 = auth.refresh(&t1.refresh_token).await.unwrap();
    assert_ne!(t2.refresh_token, t1.refresh_token);

    let replay = auth.refresh(&t1.refresh_token).await.unwrap_err();
    assert!(matches!(replay, AuthError::InvalidToken(_)), "{replay:?}");

    // the rotated token is still good
    let t3 = auth.refresh(&t2.refresh_token).await.unwrap();
    assert_ne!(t3.refresh_token, t2.refresh_token);
}

#[tokio::test]
async fn test_logout_revokes_refresh() {
    let state = state();
    let auth = &state.auth;

    auth.sign_up("b@x.com", "secret123", "bee").await.unwrap();
    let tokens = auth.login("b@x.com", "secret123").await.unwrap();
    auth.logout("b@x.com").await.unwrap();

    let err = auth.refresh(&tokens.refresh_token).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidToken(_)));
}

#[tokio::test]
async fn test_foreign_signature_is_invalid_not_expired() {
    let ours = state();
    let theirs = build_state(&Config {
        auth: AuthConfig {
            jwt_secret: "some-other-secret-also-32-bytes-long".to_string(),
            bcrypt_cost: 4,
            ..AuthConfig::default()
        },
        ..config(BTreeMap::new())
    })
    .unwrap();

    theirs.auth.sign_up("c@x.com", "secret123", "sea").await.unwrap();
    let tokens = theirs.auth.login("c@x.com", "secret123").await.unwrap();

    let err = ours.auth.codec().verify(&tokens.access_token).unwrap_err();
    assert!(matches!(err, AuthError::InvalidToken(_)), "{err:?}");
}

#[tokio::test]
async fn test_http_signup_login_me_logout() {
    let state = state();
    let app = create_router(state);

    let (status, body) = post_json(
        &app,
        "/api/auth/signup",
        json!({"email": "d@x.com", "password": "secret123", "nickname": "dee"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "USER");

    let (status, body) = post_json(
        &app,
        "/api/auth/signup",
        json!({"email": "d@x.com", "password": "secret123", "nickname": "other"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "U002");

    let (status, body) = post_json(
        &app,
        "/api/auth/login",
        json!({"email": "d@x.com", "password": "secret123"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let tokens: TokenPair = serde_json::from_value(body).unwrap();

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", tokens.access_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/logout")
                .header(header::AUTHORIZATION, format!("Bearer {}", tokens.access_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let (status, body) = post_json(
        &app,
        "/api/auth/refresh",
        json!({"refreshToken": tokens.refresh_token}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "A001");
}

// ============================================================================
// Federated accounts
// ============================================================================

#[tokio::test]
async fn test_same_email_across_providers_yields_one_account() {
    let state = state();

    let mut google = serde_json::Map::new();
    google.insert("sub".into(), json!("g-1"));
    google.insert("email".into(), json!("u@p.com"));
    google.insert("name".into(), json!("Gee"));

    let naver = json!({"response": {"id": "77", "email": "u@p.com", "name": "U"}});
    let naver = naver.as_object().unwrap().clone();

    let first = state.federated.complete("naver", &naver).await.unwrap();
    let second = state.federated.complete("google", &google).await.unwrap();
    assert_eq!(first.user.id, second.user.id);
    assert_eq!(second.resolution.as_str(), "linked");

    let mut providers = second.user.providers.clone();
    providers.sort();
    assert_eq!(providers, vec!["google".to_string(), "naver".to_string()]);

    // repeated login is recognised and adds nothing
    let third = state.federated.complete("naver", &naver).await.unwrap();
    assert_eq!(third.user.id, first.user.id);
    assert_eq!(third.resolution.as_str(), "recognised");
    assert_eq!(third.user.providers.len(), 2);

    // federated tokens rotate like any others
    let rotated = state.auth.refresh(&third.tokens.refresh_token).await.unwrap();
    assert_ne!(rotated.refresh_token, third.tokens.refresh_token);
}

#[tokio::test]
async fn test_unknown_provider_rejected() {
    let state = state();
    let err = state
        .federated
        .complete("github", &serde_json::Map::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UnsupportedProvider(_)));
}

#[tokio::test]
async fn test_kakao_callback_through_router() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "provider-at"})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 4242,
            "kakao_account": {
                "email": "k@kakao.com",
                "profile": {"nickname": "Kay", "profile_image_url": "http://img/k.png"}
            }
        })))
        .mount(&server)
        .await;

    let mut providers = BTreeMap::new();
    providers.insert("kakao".to_string(), mock_provider(&server.uri()));
    let state = build_state(&config(providers)).unwrap();
    let app = create_router(state.clone());

    let login_state = start_login(&app, "kakao").await;
    let (status, body) = get_json(
        &app,
        &format!("/api/auth/oauth2/kakao/callback?code=abc&state={}", login_state),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let access = body["accessToken"].as_str().unwrap();

    let claims = state.auth.codec().verify_access(access).unwrap();
    assert_eq!(claims.email, "k@kakao.com");
    assert_eq!(claims.nickname, "Kay");
}

#[tokio::test]
async fn test_naver_account_keyed_by_id_token_subject() {
    let payload = URL_SAFE_NO_PAD.encode(json!({"sub": "naver-oidc-1"}).to_string());
    let id_token = format!("eyJhbGciOiJSUzI1NiJ9.{}.sig", payload);

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "naver-at",
            "id_token": id_token
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resultcode": "00",
            "response": {"id": "legacy-77", "email": "n@naver.com", "name": "Nari"}
        })))
        .mount(&server)
        .await;

    let mut providers = BTreeMap::new();
    providers.insert("naver".to_string(), mock_provider(&server.uri()));
    let state = build_state(&config(providers)).unwrap();
    let app = create_router(state.clone());

    let mut user_ids = Vec::new();
    for _ in 0..2 {
        let login_state = start_login(&app, "naver").await;
        let (status, body) = get_json(
            &app,
            &format!("/api/auth/oauth2/naver/callback?code=c&state={}", login_state),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let access = body["accessToken"].as_str().unwrap();
        user_ids.push(state.auth.codec().verify_access(access).unwrap().user_id);
    }
    assert_eq!(user_ids[0], user_ids[1]);

    let users = state.auth.users();
    let owner = users
        .find_by_provider_and_provider_id("naver", "naver-oidc-1")
        .await
        .unwrap()
        .expect("identity keyed by the ID token subject");
    assert_eq!(owner.id, user_ids[0]);
    assert_eq!(owner.identities.len(), 1);
    assert!(users
        .find_by_provider_and_provider_id("naver", "legacy-77")
        .await
        .unwrap()
        .is_none());
}
