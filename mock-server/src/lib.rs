use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;

pub const CORRECT_AUTH_TOKEN: &str = "correct_auth_token";
pub const WRONG_AUTH_TOKEN: &str = "wrong_auth_token";

/// Device present in every fresh registry.
pub const SEEDED_DEVICE_TOKEN: &str =
    "1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcedf";
pub const SEEDED_INACTIVE_TOKEN: &str =
    "1234567890abcdef1234567890abcdef1234567890abcdef1234567890abc000";
pub const SEEDED_INACTIVE_AT: &str = "2013-03-11T16:25:14-04:00";

const QUOTA_HEADERS: [(&str, &str); 3] = [
    ("x-device-quota", "1000"),
    ("x-device-quota-remaining", "998"),
    ("x-device-quota-overage", "0"),
];

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Device {
    pub token: String,
    pub active: bool,
    pub marked_inactive_at: Option<String>,
    pub badge: u32,
    pub channels: Vec<String>,
}

impl Device {
    fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            active: true,
            marked_inactive_at: None,
            badge: 0,
            channels: Vec::new(),
        }
    }

    fn join(&mut self, channel: &str) {
        if !self.channels.iter().any(|c| c == channel) {
            self.channels.push(channel.to_string());
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InactiveToken {
    pub device_token: String,
    pub marked_inactive_at: String,
}

#[derive(Debug, Default)]
pub struct Registry {
    pub devices: HashMap<String, Device>,
    pub inactive: Vec<InactiveToken>,
}

impl Registry {
    pub fn seeded() -> Self {
        let device = Device {
            badge: 1,
            channels: vec!["testflight".to_string(), "user@example.com".to_string()],
            ..Device::new(SEEDED_DEVICE_TOKEN)
        };
        let inactive = [SEEDED_DEVICE_TOKEN, SEEDED_INACTIVE_TOKEN]
            .into_iter()
            .map(|token| InactiveToken {
                device_token: token.to_string(),
                marked_inactive_at: SEEDED_INACTIVE_AT.to_string(),
            })
            .collect();
        Self {
            devices: HashMap::from([(device.token.clone(), device)]),
            inactive,
        }
    }
}

pub type Db = Arc<RwLock<Registry>>;

type Params = Query<Vec<(String, String)>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Registry::seeded()));
    Router::new()
        .route("/verify_credentials", get(verify_credentials))
        .route("/inactive_tokens", get(inactive_tokens))
        .route("/register", post(register))
        .route("/unregister", delete(unregister))
        .route("/set_badge", post(set_badge))
        .route("/notify", post(notify))
        .route("/broadcast/{channel}", post(broadcast))
        .route("/subscribe/{channel}", post(subscribe).delete(unsubscribe))
        .route("/devices/{device_token}", get(get_device))
        .layer(TraceLayer::new_for_http())
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn failure(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn with_quota(response: impl IntoResponse) -> Response {
    (QUOTA_HEADERS, response).into_response()
}

fn authenticate(headers: &HeaderMap) -> Result<(), Response> {
    let expected = format!("token=\"{CORRECT_AUTH_TOKEN}\"");
    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split_once(' '))
        .is_some_and(|(scheme, credential)| scheme == "Token" && credential == expected);
    if authorized {
        Ok(())
    } else {
        Err(failure(StatusCode::UNAUTHORIZED, "unauthorized"))
    }
}

fn values<'a>(params: &'a [(String, String)], key: &'a str) -> impl Iterator<Item = &'a str> {
    params
        .iter()
        .filter(move |(k, v)| k == key && !v.is_empty())
        .map(|(_, v)| v.as_str())
}

fn param<'a>(params: &'a [(String, String)], key: &'a str) -> Option<&'a str> {
    values(params, key).next()
}

fn missing_field() -> Response {
    with_quota(failure(StatusCode::BAD_REQUEST, "missing required field"))
}

fn required<'a>(params: &'a [(String, String)], key: &'a str) -> Result<&'a str, Response> {
    param(params, key).ok_or_else(missing_field)
}

fn require_content(params: &[(String, String)]) -> Result<(), Response> {
    if param(params, "alert").is_some() || param(params, "info").is_some() {
        Ok(())
    } else {
        Err(missing_field())
    }
}

async fn verify_credentials(headers: HeaderMap) -> Result<Response, Response> {
    authenticate(&headers)?;
    Ok(Json(json!({ "message": "authenticated", "auth_token_type": "server_token" })).into_response())
}

async fn inactive_tokens(State(db): State<Db>, headers: HeaderMap) -> Result<Response, Response> {
    authenticate(&headers)?;
    let registry = db.read().await;
    Ok(Json(registry.inactive.clone()).into_response())
}

async fn register(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(params): Params,
) -> Result<Response, Response> {
    authenticate(&headers)?;
    let token = required(&params, "device_token")?;
    let mut registry = db.write().await;
    let device = registry
        .devices
        .entry(token.to_string())
        .or_insert_with(|| Device::new(token));
    if let Some(channel) = param(&params, "channel") {
        device.join(channel);
    }
    Ok(with_quota(Json(json!({ "message": "ok" }))))
}

async fn unregister(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(params): Params,
) -> Result<Response, Response> {
    authenticate(&headers)?;
    let token = required(&params, "device_token")?;
    db.write().await.devices.remove(token);
    Ok(with_quota(Json(json!({ "message": "ok" }))))
}

async fn set_badge(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(params): Params,
) -> Result<Response, Response> {
    authenticate(&headers)?;
    let token = required(&params, "device_token")?;
    let badge: u32 = required(&params, "badge")?
        .parse()
        .map_err(|_| with_quota(failure(StatusCode::BAD_REQUEST, "invalid badge")))?;
    let mut registry = db.write().await;
    registry
        .devices
        .entry(token.to_string())
        .or_insert_with(|| Device::new(token))
        .badge = badge;
    Ok(with_quota(Json(json!({ "message": "ok" }))))
}

async fn notify(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(params): Params,
) -> Result<Response, Response> {
    authenticate(&headers)?;
    let tokens: Vec<&str> = values(&params, "device_tokens[]").collect();
    if tokens.is_empty() {
        return Err(missing_field());
    }
    require_content(&params)?;

    let registry = db.read().await;
    let mut sent_count = 0u64;
    let mut inactive_tokens = Vec::new();
    let mut unregistered_tokens = Vec::new();
    for token in tokens {
        if registry.devices.get(token).is_some_and(|d| d.active) {
            sent_count += 1;
        } else if registry.inactive.iter().any(|t| t.device_token == token) {
            inactive_tokens.push(token);
        } else {
            unregistered_tokens.push(token);
        }
    }
    Ok(with_quota(Json(json!({
        "sent_count": sent_count,
        "inactive_tokens": inactive_tokens,
        "unregistered_tokens": unregistered_tokens,
    }))))
}

async fn broadcast(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(channel): Path<String>,
    Query(params): Params,
) -> Result<Response, Response> {
    authenticate(&headers)?;
    require_content(&params)?;
    let registry = db.read().await;
    let sent_count = registry
        .devices
        .values()
        .filter(|d| d.active && d.channels.contains(&channel))
        .count();
    Ok(with_quota(Json(json!({ "sent_count": sent_count }))))
}

async fn subscribe(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(channel): Path<String>,
    Query(params): Params,
) -> Result<Response, Response> {
    authenticate(&headers)?;
    let token = required(&params, "device_token")?;
    let mut registry = db.write().await;
    let device = registry
        .devices
        .entry(token.to_string())
        .or_insert_with(|| Device::new(token));
    device.join(&channel);
    Ok(with_quota(Json(json!({
        "device_token": device.token,
        "channels": device.channels,
    }))))
}

async fn unsubscribe(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(channel): Path<String>,
    Query(params): Params,
) -> Result<Response, Response> {
    authenticate(&headers)?;
    let token = required(&params, "device_token")?;
    let mut registry = db.write().await;
    let channels = match registry.devices.get_mut(token) {
        Some(device) => {
            device.channels.retain(|c| *c != channel);
            device.channels.clone()
        }
        None => Vec::new(),
    };
    Ok(with_quota(Json(json!({
        "device_token": token,
        "channels": channels,
    }))))
}

async fn get_device(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(device_token): Path<String>,
) -> Result<Response, Response> {
    authenticate(&headers)?;
    let registry = db.read().await;
    match registry.devices.get(&device_token) {
        Some(device) => Ok(with_quota(Json(device.clone()))),
        None => Err(with_quota(failure(StatusCode::NOT_FOUND, "device not found"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn device_serializes_null_timestamp() {
        let json = serde_json::to_value(Device::new("abc")).unwrap();
        assert_eq!(json["token"], "abc");
        assert_eq!(json["active"], true);
        assert!(json["marked_inactive_at"].is_null());
        assert_eq!(json["badge"], 0);
        assert_eq!(json["channels"], json!([]));
    }

    #[test]
    fn seeded_registry_has_device_and_inactive_tokens() {
        let registry = Registry::seeded();
        let device = &registry.devices[SEEDED_DEVICE_TOKEN];
        assert_eq!(device.badge, 1);
        assert_eq!(device.channels, vec!["testflight", "user@example.com"]);
        assert_eq!(registry.inactive.len(), 2);
    }

    #[test]
    fn join_does_not_duplicate_channels() {
        let mut device = Device::new("abc");
        device.join("foo");
        device.join("foo");
        assert_eq!(device.channels, vec!["foo"]);
    }

    #[test]
    fn values_skip_blank_entries() {
        let params = pairs(&[
            ("device_tokens[]", "a"),
            ("device_tokens[]", ""),
            ("alert", "hi"),
            ("device_tokens[]", "b"),
        ]);
        let tokens: Vec<&str> = values(&params, "device_tokens[]").collect();
        assert_eq!(tokens, vec!["a", "b"]);
        assert_eq!(param(&params, "alert"), Some("hi"));
        assert_eq!(param(&params, "info"), None);
    }

    #[test]
    fn authenticate_requires_token_scheme_and_correct_credential() {
        let mut headers = HeaderMap::new();
        assert!(authenticate(&headers).is_err());

        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_static(r#"Token token="wrong_auth_token""#),
        );
        assert!(authenticate(&headers).is_err());

        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_static(r#"Token token="correct_auth_token""#),
        );
        assert!(authenticate(&headers).is_ok());
    }
}
