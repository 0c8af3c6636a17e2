//! Synchronous client for the ZeroPush push-notification REST API.
//!
//! # Overview
//! Validates arguments locally, builds the HTTP request for each endpoint,
//! dispatches it through a blocking `Transport`, and decodes the JSON answer
//! into a typed result that still carries the raw envelope and headers.
//!
//! # Design
//! - `ZeroPushClient` holds only the base URL, the credential and the
//!   transport; calls share no mutable state.
//! - Each operation is split into `build_*` (produces a request) and
//!   [`parse`] (consumes a response), so the I/O boundary is explicit.
//! - Validation and configuration errors are raised before any I/O.
//! - Remote errors carry the decoded envelope so quota headers remain
//!   readable on failure.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod response;
pub mod types;

pub use client::{parse, ZeroPushClient};
pub use config::{ClientConfig, Environment};
pub use error::{ApiError, Result};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use response::{BodyShape, Record, ZeroResponse};
pub use types::{
    ApiResponse, BroadcastReport, BroadcastResponse, Credentials, DeviceDetail, DeviceResponse,
    InactiveTokensResponse, Message, MessageResponse, Notification, NotifyReport, NotifyResponse,
    Payload, Subscription, SubscriptionResponse, TokenDetail, VerifyCredentialsResponse,
};
