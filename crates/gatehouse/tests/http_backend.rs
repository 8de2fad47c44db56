//! Wire-format tests for the HTTP backend against an axum mock server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Form, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use gatehouse::AppConfig;
use gatehouse::api::{AuthApi, HttpBackend};
use gatehouse_common::{
    CaptchaChallenge, CaptchaCheckForm, ChallengeOutcome, CheckOutcome, ClickPoint,
    GatehouseError, LoginOutcome, LoginRequest, QrCreateOutcome, QrPoll, QrSession,
};

#[derive(Default)]
struct Seen {
    logins: Vec<Value>,
    checks: Vec<HashMap<String, String>>,
    qr_bodies: Vec<Value>,
    statuses: Vec<String>,
    authorization: Vec<Option<String>>,
}

type Shared = Arc<Mutex<Seen>>;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn backend(base: &str, credential: Option<&str>) -> HttpBackend {
    let config = AppConfig {
        api_base_url: base.to_string(),
        ..AppConfig::default()
    };
    HttpBackend::new(&config, credential.map(str::to_string)).unwrap()
}

fn auth_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn login(State(seen): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    let mut seen = seen.lock().unwrap();
    seen.authorization.push(auth_header(&headers));
    seen.logins.push(body.clone());
    if body["code"] == "123456" {
        Json(json!({ "data": { "token": "tok_abc" } }))
    } else {
        Json(json!({ "data": null, "message": "invalid code" }))
    }
}

async fn captcha() -> Json<Value> {
    Json(json!({
        "code": 0,
        "image_base64": "aW1hZ2U=",
        "thumb_base64": "dGh1bWI=",
        "captcha_key": "k1"
    }))
}

async fn captcha_check(State(seen): State<Shared>, Form(form): Form<HashMap<String, String>>) -> Json<Value> {
    let passed = form.get("dots").map(String::as_str) == Some("10,20,30,40");
    seen.lock().unwrap().checks.push(form);
    if passed {
        Json(json!({ "code": 0, "message": "verified" }))
    } else {
        Json(json!({ "code": 1, "message": "wrong" }))
    }
}

async fn qr_code(State(seen): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    seen.lock().unwrap().qr_bodies.push(body);
    Json(json!({
        "success": true,
        "data": { "qr_url": "https://x/qr.png", "session_id": "sid1" }
    }))
}

async fn qr_status(State(seen): State<Shared>, Path(session_id): Path<String>) -> Json<Value> {
    seen.lock().unwrap().statuses.push(session_id.clone());
    match session_id.as_str() {
        "scanned" => Json(json!({ "success": true, "status": "scanned" })),
        "done" => Json(json!({ "success": true, "status": "success", "data": { "token": "tok_qr" } })),
        "empty" => Json(json!({ "success": true, "status": "success", "data": {} })),
        "old" => Json(json!({ "success": true, "status": "expired" })),
        "down" => Json(json!({ "success": false })),
        _ => Json(json!({ "success": true, "status": "pending" })),
    }
}

fn mock_backend(seen: Shared) -> Router {
    Router::new()
        .route("/api/login", post(login))
        .route("/api/captcha/click-basic", get(captcha))
        .route("/api/captcha/click-basic/check", post(captcha_check))
        .route("/api/auth/wechat/qr-code", post(qr_code))
        .route("/api/auth/wechat/status/{session_id}", get(qr_status))
        .with_state(seen)
}

#[tokio::test]
async fn test_login_posts_json_and_reads_token() {
    let seen = Shared::default();
    let base = serve(mock_backend(seen.clone())).await;
    let api = backend(&base, None);

    let outcome = api
        .login(&LoginRequest {
            phone: "13800001234".into(),
            code: "123456".into(),
        })
        .await
        .unwrap();
    assert_eq!(
        outcome,
        LoginOutcome::Authenticated {
            token: "tok_abc".into()
        }
    );

    let outcome = api
        .login(&LoginRequest {
            phone: "13800001234".into(),
            code: "000000".into(),
        })
        .await
        .unwrap();
    assert_eq!(
        outcome,
        LoginOutcome::Refused {
            message: Some("invalid code".into())
        }
    );

    let seen = seen.lock().unwrap();
    assert_eq!(
        seen.logins[0],
        json!({ "phone": "13800001234", "code": "123456" })
    );
    assert_eq!(seen.authorization, vec![None, None]);
}

#[tokio::test]
async fn test_stored_credential_is_sent_as_bearer() {
    let seen = Shared::default();
    let base = serve(mock_backend(seen.clone())).await;
    let api = backend(&base, Some("tok_old"));

    api.login(&LoginRequest {
        phone: "13800001234".into(),
        code: "123456".into(),
    })
    .await
    .unwrap();

    assert_eq!(
        seen.lock().unwrap().authorization,
        vec![Some("Bearer tok_old".to_string())]
    );
}

#[tokio::test]
async fn test_captcha_fetch_and_form_check() {
    let seen = Shared::default();
    let base = serve(mock_backend(seen.clone())).await;
    let api = backend(&base, None);

    let challenge = api.fetch_challenge().await.unwrap();
    assert_eq!(
        challenge,
        ChallengeOutcome::Issued(CaptchaChallenge {
            key: "k1".into(),
            image: "aW1hZ2U=".into(),
            thumb: "dGh1bWI=".into(),
        })
    );

    let points = [ClickPoint::new(10, 20), ClickPoint::new(30, 40)];
    let form = CaptchaCheckForm::new(&points, "k1", &json!({ "phone": "13800001234" })).unwrap();
    let outcome = api.check_challenge(&form).await.unwrap();
    assert_eq!(
        outcome,
        CheckOutcome::Passed {
            message: Some("verified".into())
        }
    );

    let form = CaptchaCheckForm::new(&points[..1], "k1", &json!({})).unwrap();
    let outcome = api.check_challenge(&form).await.unwrap();
    assert!(matches!(outcome, CheckOutcome::Failed { code: Some(1), .. }));

    let seen = seen.lock().unwrap();
    let first = &seen.checks[0];
    assert_eq!(first["dots"], "10,20,30,40");
    assert_eq!(first["key"], "k1");
    assert_eq!(first["extraData"], r#"{"phone":"13800001234"}"#);
}

#[tokio::test]
async fn test_captcha_urls_are_configurable() {
    let app = Router::new().route(
        "/custom/captcha",
        get(|| async { Json(json!({ "image_base64": "", "captcha_key": "custom" })) }),
    );
    let base = serve(app).await;
    let config = AppConfig {
        api_base_url: "http://127.0.0.1:9".into(),
        captcha_get_url: format!("{base}/custom/captcha"),
        ..AppConfig::default()
    };
    let api = HttpBackend::new(&config, None).unwrap();

    // No code field at all still counts as an issued challenge.
    match api.fetch_challenge().await.unwrap() {
        ChallengeOutcome::Issued(challenge) => assert_eq!(challenge.key, "custom"),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_qr_session_create_and_status() {
    let seen = Shared::default();
    let base = serve(mock_backend(seen.clone())).await;
    let api = backend(&base, None);

    assert_eq!(
        api.create_qr_session().await.unwrap(),
        QrCreateOutcome::Created(QrSession {
            session_id: "sid1".into(),
            qr_url: "https://x/qr.png".into(),
        })
    );

    assert_eq!(api.qr_status("sid1").await.unwrap(), QrPoll::Pending);
    assert_eq!(api.qr_status("scanned").await.unwrap(), QrPoll::Scanned);
    assert_eq!(api.qr_status("old").await.unwrap(), QrPoll::Expired);
    assert_eq!(api.qr_status("down").await.unwrap(), QrPoll::Pending);
    assert_eq!(
        api.qr_status("done").await.unwrap(),
        QrPoll::Confirmed {
            token: "tok_qr".into()
        }
    );
    assert!(matches!(
        api.qr_status("empty").await,
        Err(GatehouseError::Decode(_))
    ));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.qr_bodies, vec![json!({})]);
    assert_eq!(seen.statuses[0], "sid1");
}

#[tokio::test]
async fn test_session_id_is_percent_encoded() {
    let seen = Shared::default();
    let base = serve(mock_backend(seen.clone())).await;
    let api = backend(&base, None);

    api.qr_status("a b/c?d").await.unwrap();

    assert_eq!(seen.lock().unwrap().statuses, vec!["a b/c?d".to_string()]);
}

#[tokio::test]
async fn test_error_status_becomes_rejection() {
    let app = Router::new()
        .route(
            "/api/login",
            post(|| async {
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "message": "maintenance" })),
                )
            }),
        )
        .route(
            "/api/auth/wechat/qr-code",
            post(|| async { StatusCode::BAD_GATEWAY }),
        );
    let base = serve(app).await;
    let api = backend(&base, None);

    let err = api
        .login(&LoginRequest {
            phone: "13800001234".into(),
            code: "123456".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "maintenance");

    let err = api.create_qr_session().await.unwrap_err();
    assert!(matches!(err, GatehouseError::Rejected(ref m) if m.starts_with("HTTP 502")));
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = backend(&format!("http://{addr}"), None);
    let err = api.fetch_challenge().await.unwrap_err();

    assert!(matches!(err, GatehouseError::Transport(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_garbage_body_is_decode_error() {
    let app = Router::new().route(
        "/api/auth/wechat/qr-code",
        post(|| async { "not json" }),
    );
    let base = serve(app).await;
    let api = backend(&base, None);

    let err = api.create_qr_session().await.unwrap_err();
    assert!(matches!(err, GatehouseError::Decode(_)));
}
