//! Request orchestration for the ZeroPush API.
//!
//! # Design
//! Each operation is split into a `build_*` method that validates arguments
//! and produces an `HttpRequest`, and the generic [`parse`] that turns an
//! `HttpResponse` into a typed result. The operation methods glue the two
//! together through the client's `Transport`. Callers that perform I/O
//! themselves can use the two halves directly.
//!
//! All parameters travel in the query string, whatever the HTTP method.

use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ApiError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
use crate::response;
use crate::types::{
    ApiResponse, BroadcastResponse, DeviceResponse, InactiveTokensResponse, MessageResponse,
    Notification, NotifyResponse, Payload, SubscriptionResponse, VerifyCredentialsResponse,
};

const DEVICE_TOKEN_REQUIRED: &str = "device token must be set";
const DEVICE_TOKENS_REQUIRED: &str = "device tokens cannot be empty";
const CHANNEL_REQUIRED: &str = "channel is not set";
const BADGE_NEGATIVE: &str = "badge must not be negative";
const CONTENT_REQUIRED: &str = "either alert or info must be set";

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn require(value: &str, msg: &str) -> Result<()> {
    if is_blank(value) {
        return Err(ApiError::validation(msg));
    }
    Ok(())
}

/// Values placed in the URL path. `.` and `..` would be collapsed by URL
/// normalization and address a different endpoint.
fn require_segment(value: &str, name: &str, msg: &str) -> Result<()> {
    require(value, msg)?;
    if value == "." || value == ".." {
        return Err(ApiError::Validation(format!("{name} cannot be '{value}'")));
    }
    Ok(())
}

fn require_content(notification: &Notification) -> Result<()> {
    if notification.has_content() {
        Ok(())
    } else {
        Err(ApiError::validation(CONTENT_REQUIRED))
    }
}

fn optional(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !is_blank(v))
}

/// Synchronous client for the ZeroPush REST API.
///
/// Holds only the base URL, the credential and the transport; nothing is
/// mutated by a call, so one client can serve concurrent callers when the
/// transport allows it.
#[derive(Debug, Clone)]
pub struct ZeroPushClient<T = UreqTransport> {
    base_url: Url,
    auth_token: String,
    transport: T,
}

impl ZeroPushClient<UreqTransport> {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Self::with_transport(config, UreqTransport::new())
    }
}

impl<T> ZeroPushClient<T> {
    pub fn with_transport(config: &ClientConfig, transport: T) -> Result<Self> {
        let mut base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::InvalidBaseUrl(format!("{}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(config.base_url.clone()));
        }
        base_url.set_query(None);
        base_url.set_fragment(None);
        Ok(Self {
            base_url,
            auth_token: config.auth_token.clone(),
            transport,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn request(
        &self,
        method: HttpMethod,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<HttpRequest> {
        if self.auth_token.is_empty() {
            return Err(ApiError::MissingAuthToken);
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        let mut headers = vec![(
            "Authorization".to_string(),
            format!("Token token=\"{}\"", self.auth_token),
        )];
        if method != HttpMethod::Get {
            headers.push((
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            ));
        }

        Ok(HttpRequest {
            method,
            url: url.to_string(),
            headers,
        })
    }

    pub fn build_verify_credentials(&self) -> Result<HttpRequest> {
        self.request(HttpMethod::Get, &["verify_credentials"], &[])
    }

    pub fn build_inactive_tokens(&self) -> Result<HttpRequest> {
        self.request(HttpMethod::Get, &["inactive_tokens"], &[])
    }

    pub fn build_get_device(&self, device_token: &str) -> Result<HttpRequest> {
        require_segment(device_token, "device token", DEVICE_TOKEN_REQUIRED)?;
        self.request(HttpMethod::Get, &["devices", device_token], &[])
    }

    fn build_registration(
        &self,
        method: HttpMethod,
        path: &str,
        device_token: &str,
        channel: Option<&str>,
    ) -> Result<HttpRequest> {
        require(device_token, DEVICE_TOKEN_REQUIRED)?;
        let mut query = vec![("device_token", device_token.to_string())];
        if let Some(channel) = optional(channel) {
            query.push(("channel", channel.to_string()));
        }
        self.request(method, &[path], &query)
    }

    pub fn build_register(&self, device_token: &str, channel: Option<&str>) -> Result<HttpRequest> {
        self.build_registration(HttpMethod::Post, "register", device_token, channel)
    }

    pub fn build_unregister(&self, device_token: &str, channel: Option<&str>) -> Result<HttpRequest> {
        self.build_registration(HttpMethod::Delete, "unregister", device_token, channel)
    }

    pub fn build_set_badge(&self, device_token: &str, badge: i64) -> Result<HttpRequest> {
        if badge < 0 {
            return Err(ApiError::validation(BADGE_NEGATIVE));
        }
        require(device_token, DEVICE_TOKEN_REQUIRED)?;
        let query = [
            ("device_token", device_token.to_string()),
            ("badge", badge.to_string()),
        ];
        self.request(HttpMethod::Post, &["set_badge"], &query)
    }

    /// Blank entries in `device_tokens` are dropped; at least one must remain.
    pub fn build_notify<S: AsRef<str>>(
        &self,
        notification: &Notification,
        device_tokens: &[S],
    ) -> Result<HttpRequest> {
        let mut query: Vec<(&str, String)> = device_tokens
            .iter()
            .map(AsRef::<str>::as_ref)
            .filter(|token| !is_blank(token))
            .map(|token| ("device_tokens[]", token.to_string()))
            .collect();
        if query.is_empty() {
            return Err(ApiError::validation(DEVICE_TOKENS_REQUIRED));
        }
        require_content(notification)?;
        query.extend(notification.query_pairs());
        self.request(HttpMethod::Post, &["notify"], &query)
    }

    pub fn build_broadcast(&self, channel: &str, notification: &Notification) -> Result<HttpRequest> {
        require_segment(channel, "channel", CHANNEL_REQUIRED)?;
        require_content(notification)?;
        self.request(
            HttpMethod::Post,
            &["broadcast", channel],
            &notification.query_pairs(),
        )
    }

    fn build_subscription(
        &self,
        method: HttpMethod,
        device_token: Option<&str>,
        channel: &str,
    ) -> Result<HttpRequest> {
        require_segment(channel, "channel", CHANNEL_REQUIRED)?;
        let query: Vec<(&str, String)> = optional(device_token)
            .map(|token| ("device_token", token.to_string()))
            .into_iter()
            .collect();
        self.request(method, &["subscribe", channel], &query)
    }

    pub fn build_subscribe(&self, device_token: Option<&str>, channel: &str) -> Result<HttpRequest> {
        self.build_subscription(HttpMethod::Post, device_token, channel)
    }

    pub fn build_unsubscribe(&self, device_token: Option<&str>, channel: &str) -> Result<HttpRequest> {
        self.build_subscription(HttpMethod::Delete, device_token, channel)
    }
}

impl<T: Transport> ZeroPushClient<T> {
    fn send<P: Payload>(&self, request: HttpRequest) -> Result<ApiResponse<P>> {
        debug!(method = %request.method, url = %request.url, "dispatching request");
        let response = self.transport.execute(&request)?;
        parse(response)
    }

    pub fn verify_credentials(&self) -> Result<VerifyCredentialsResponse> {
        self.send(self.build_verify_credentials()?)
    }

    pub fn inactive_tokens(&self) -> Result<InactiveTokensResponse> {
        self.send(self.build_inactive_tokens()?)
    }

    pub fn get_device(&self, device_token: &str) -> Result<DeviceResponse> {
        self.send(self.build_get_device(device_token)?)
    }

    pub fn register(&self, device_token: &str, channel: Option<&str>) -> Result<MessageResponse> {
        self.send(self.build_register(device_token, channel)?)
    }

    pub fn unregister(&self, device_token: &str, channel: Option<&str>) -> Result<MessageResponse> {
        self.send(self.build_unregister(device_token, channel)?)
    }

    pub fn set_badge(&self, device_token: &str, badge: i64) -> Result<MessageResponse> {
        self.send(self.build_set_badge(device_token, badge)?)
    }

    pub fn notify<S: AsRef<str>>(
        &self,
        notification: &Notification,
        device_tokens: &[S],
    ) -> Result<NotifyResponse> {
        self.send(self.build_notify(notification, device_tokens)?)
    }

    pub fn broadcast(&self, channel: &str, notification: &Notification) -> Result<BroadcastResponse> {
        self.send(self.build_broadcast(channel, notification)?)
    }

    pub fn subscribe(&self, device_token: Option<&str>, channel: &str) -> Result<SubscriptionResponse> {
        self.send(self.build_subscribe(device_token, channel)?)
    }

    pub fn unsubscribe(&self, device_token: Option<&str>, channel: &str) -> Result<SubscriptionResponse> {
        self.send(self.build_unsubscribe(device_token, channel)?)
    }
}

/// Decode a raw response into the typed result for payload `P`.
pub fn parse<P: Payload>(response: HttpResponse) -> Result<ApiResponse<P>> {
    let envelope = match response::decode(response, P::SHAPE) {
        Ok(envelope) => envelope,
        Err(err) => {
            if let ApiError::Remote {
                status, message, ..
            } = &err
            {
                warn!(status, error = %message, "request rejected");
            }
            return Err(err);
        }
    };
    ApiResponse::from_envelope(envelope)
}
