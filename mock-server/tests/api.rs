use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, CORRECT_AUTH_TOKEN, SEEDED_DEVICE_TOKEN, WRONG_AUTH_TOKEN};
use serde_json::Value;
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn authed(method: &str, uri: &str, token: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, format!("Token token=\"{token}\""))
        .header(
            http::header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body(String::new())
        .unwrap()
}

fn request(method: &str, uri: &str) -> Request<String> {
    authed(method, uri, CORRECT_AUTH_TOKEN)
}

// --- auth ---

#[tokio::test]
async fn verify_credentials_ok() {
    let resp = app()
        .oneshot(request("GET", "/verify_credentials"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["message"], "authenticated");
    assert_eq!(body["auth_token_type"], "server_token");
}

#[tokio::test]
async fn wrong_token_is_unauthorized() {
    let resp = app()
        .oneshot(authed("GET", "/verify_credentials", WRONG_AUTH_TOKEN))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn missing_authorization_is_unauthorized() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/inactive_tokens")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// --- inactive tokens ---

#[tokio::test]
async fn inactive_tokens_lists_seeded_records() {
    let resp = app()
        .oneshot(request("GET", "/inactive_tokens"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let records = body.as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["marked_inactive_at"], "2013-03-11T16:25:14-04:00");
}

// --- registration ---

#[tokio::test]
async fn register_without_token_is_bad_request_with_quota() {
    let resp = app().oneshot(request("POST", "/register")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(resp.headers().contains_key("x-device-quota"));
    assert!(resp.headers().contains_key("x-device-quota-remaining"));
    assert!(resp.headers().contains_key("x-device-quota-overage"));
    let body = body_json(resp).await;
    assert_eq!(body["error"], "missing required field");
}

#[tokio::test]
async fn set_badge_rejects_non_numeric_badge() {
    let resp = app()
        .oneshot(request("POST", "/set_badge?device_token=abc&badge=lots"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- devices ---

#[tokio::test]
async fn get_device_returns_seeded_device() {
    let resp = app()
        .oneshot(request("GET", &format!("/devices/{SEEDED_DEVICE_TOKEN}")))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-device-quota"], "1000");
    let body = body_json(resp).await;
    assert_eq!(body["token"], SEEDED_DEVICE_TOKEN);
    assert_eq!(body["active"], true);
    assert!(body["marked_inactive_at"].is_null());
    assert_eq!(body["badge"], 1);
    assert_eq!(body["channels"][0], "testflight");
}

#[tokio::test]
async fn get_unknown_device_is_not_found() {
    let resp = app()
        .oneshot(request("GET", "/devices/nope"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "device not found");
}

// --- notify / broadcast ---

#[tokio::test]
async fn notify_reads_bracketed_token_key() {
    let uri = format!(
        "/notify?device_tokens%5B%5D={SEEDED_DEVICE_TOKEN}&device_tokens%5B%5D=unknown&alert=hi"
    );
    let resp = app().oneshot(request("POST", &uri)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["sent_count"], 1);
    assert_eq!(body["unregistered_tokens"][0], "unknown");
}

#[tokio::test]
async fn notify_without_tokens_is_bad_request() {
    let resp = app()
        .oneshot(request("POST", "/notify?device_tokens=abc&alert=hi"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn broadcast_without_content_is_bad_request() {
    let resp = app()
        .oneshot(request("POST", "/broadcast/testflight?badge=1"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- subscription lifecycle ---

#[tokio::test]
async fn subscription_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    // subscribe a new device
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("POST", "/subscribe/foo?device_token=dev1"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["device_token"], "dev1");
    assert_eq!(body["channels"].as_array().unwrap().len(), 1);

    // broadcast reaches it
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("POST", "/broadcast/foo?alert=hi"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["sent_count"], 1);

    // unsubscribe
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("DELETE", "/subscribe/foo?device_token=dev1"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert!(body["channels"].as_array().unwrap().is_empty());

    // broadcast no longer reaches it
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("POST", "/broadcast/foo?alert=hi"))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["sent_count"], 0);

    // unregister removes the device
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("DELETE", "/unregister?device_token=dev1"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(request("GET", "/devices/dev1"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
