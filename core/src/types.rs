//! Typed payloads, notification parameters, and typed results.
//!
//! # Design
//! Each operation's result is an `ApiResponse<T>`: the envelope it was
//! decoded from plus a payload `T` deserialized out of the envelope body.
//! Payloads are plain serde structs, so a missing or mistyped field is a
//! decode error instead of a silent zero value.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::{ApiError, Result};
use crate::response::{BodyShape, Record, ZeroResponse};

/// A payload extracted from a decoded envelope.
pub trait Payload: DeserializeOwned {
    /// JSON shape the endpoint returns on success.
    const SHAPE: BodyShape = BodyShape::Object;

    fn from_body(body: &[Record]) -> Result<Self> {
        let record = body
            .first()
            .ok_or_else(|| ApiError::Decode("empty response body".to_string()))?;
        from_record(record)
    }
}

fn from_record<T: DeserializeOwned>(record: &Record) -> Result<T> {
    serde_json::from_value(Value::Object(record.clone())).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Counts and badges: integers, or floats that are finite, non-negative,
/// integral and in range for the target type. Anything else is rejected.
fn count<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    let value = match number.as_u64() {
        Some(v) => v,
        None => match number.as_f64() {
            Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64 => {
                f as u64
            }
            _ => {
                return Err(D::Error::custom(format!(
                    "expected a non-negative integer, got {number}"
                )))
            }
        },
    };
    T::try_from(value).map_err(|_| D::Error::custom(format!("{value} is out of range")))
}

/// A decoded envelope together with the payload extracted from it.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub response: ZeroResponse,
    pub data: T,
}

impl<T: Payload> ApiResponse<T> {
    pub(crate) fn from_envelope(response: ZeroResponse) -> Result<Self> {
        let data = T::from_body(&response.body)?;
        Ok(Self { response, data })
    }
}

impl<T> ApiResponse<T> {
    pub fn get_header(&self, key: &str) -> &str {
        self.response.get_header(key)
    }
}

/// `GET /verify_credentials`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub message: String,
    pub auth_token_type: String,
}

impl Payload for Credentials {}

/// Acknowledgement returned by register, unregister and set_badge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub message: String,
}

impl Payload for Message {}

/// One inactive device as listed by `GET /inactive_tokens`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenDetail {
    pub device_token: String,
    pub marked_inactive_at: String,
}

impl Payload for Vec<TokenDetail> {
    const SHAPE: BodyShape = BodyShape::Array;

    fn from_body(body: &[Record]) -> Result<Self> {
        body.iter().map(from_record).collect()
    }
}

/// `GET /devices/{token}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceDetail {
    pub token: String,
    pub active: bool,
    pub marked_inactive_at: Option<String>,
    #[serde(deserialize_with = "count")]
    pub badge: u32,
    #[serde(default)]
    pub channels: Vec<String>,
}

impl Payload for DeviceDetail {}

/// `POST /notify`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotifyReport {
    #[serde(deserialize_with = "count")]
    pub sent_count: u64,
    #[serde(default)]
    pub inactive_tokens: Vec<String>,
    #[serde(default)]
    pub unregistered_tokens: Vec<String>,
}

impl Payload for NotifyReport {}

/// `POST /broadcast/{channel}`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BroadcastReport {
    #[serde(deserialize_with = "count")]
    pub sent_count: u64,
}

impl Payload for BroadcastReport {}

/// `POST|DELETE /subscribe/{channel}`: the device's channels after the change.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Subscription {
    pub device_token: String,
    #[serde(default)]
    pub channels: Vec<String>,
}

impl Payload for Subscription {}

pub type VerifyCredentialsResponse = ApiResponse<Credentials>;
pub type InactiveTokensResponse = ApiResponse<Vec<TokenDetail>>;
pub type DeviceResponse = ApiResponse<DeviceDetail>;
pub type MessageResponse = ApiResponse<Message>;
pub type NotifyResponse = ApiResponse<NotifyReport>;
pub type BroadcastResponse = ApiResponse<BroadcastReport>;
pub type SubscriptionResponse = ApiResponse<Subscription>;

/// Push payload shared by notify and broadcast.
///
/// At least one of `alert` and `info` must be non-empty. Unset or empty
/// fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notification {
    pub alert: Option<String>,
    /// Absolute (`"3"`) or relative (`"+1"`) badge value.
    pub badge: Option<String>,
    pub sound: Option<String>,
    pub info: Option<String>,
    /// Seconds until the provider discards the notification.
    pub expiry: Option<u64>,
    pub content_available: bool,
    pub category: Option<String>,
}

impl Notification {
    pub fn alert(alert: impl Into<String>) -> Self {
        Self {
            alert: Some(alert.into()),
            ..Self::default()
        }
    }

    pub fn info(info: impl Into<String>) -> Self {
        Self {
            info: Some(info.into()),
            ..Self::default()
        }
    }

    pub fn with_badge(mut self, badge: impl Into<String>) -> Self {
        self.badge = Some(badge.into());
        self
    }

    pub fn with_sound(mut self, sound: impl Into<String>) -> Self {
        self.sound = Some(sound.into());
        self
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    pub fn with_expiry(mut self, seconds: u64) -> Self {
        self.expiry = Some(seconds);
        self
    }

    pub fn with_content_available(mut self) -> Self {
        self.content_available = true;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub(crate) fn has_content(&self) -> bool {
        let set = |field: &Option<String>| field.as_deref().is_some_and(|s| !s.is_empty());
        set(&self.alert) || set(&self.info)
    }

    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        let text_fields = [
            ("alert", &self.alert),
            ("badge", &self.badge),
            ("sound", &self.sound),
            ("info", &self.info),
        ];
        for (key, value) in text_fields {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                pairs.push((key, v.to_string()));
            }
        }
        if let Some(expiry) = self.expiry {
            pairs.push(("expiry", expiry.to_string()));
        }
        if self.content_available {
            pairs.push(("content_available", "true".to_string()));
        }
        if let Some(category) = self.category.as_deref().filter(|v| !v.is_empty()) {
            pairs.push(("category", category.to_string()));
        }
        pairs
    }
}
