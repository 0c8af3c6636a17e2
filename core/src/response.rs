//! The response envelope and the decoder that fills it.
//!
//! # Design
//! Every endpoint answers with one of three JSON shapes: a single object, an
//! array of objects, or an error object. `decode` normalizes all three into a
//! `ZeroResponse` so typed extraction works from one representation. Headers
//! are captured before the status branch, so rejected calls still expose
//! quota headers.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::{ApiError, Result};
use crate::http::HttpResponse;

/// A generic JSON record: field name to dynamically-typed value.
pub type Record = Map<String, Value>;

/// Which JSON shape an endpoint returns on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyShape {
    Object,
    Array,
}

/// Uniform wrapper around a decoded HTTP response.
///
/// Exactly one of `body` (non-empty for object endpoints) and `error` is
/// populated. Header names are stored lower-cased.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZeroResponse {
    pub body: Vec<Record>,
    pub headers: BTreeMap<String, Vec<String>>,
    pub error: Option<BTreeMap<String, String>>,
}

impl ZeroResponse {
    /// First value of the named header, or `""` if absent. Case-insensitive.
    pub fn get_header(&self, key: &str) -> &str {
        self.headers
            .get(&key.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
            .unwrap_or("")
    }
}

fn collect_headers(headers: Vec<(String, String)>) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in headers {
        map.entry(name.to_ascii_lowercase()).or_default().push(value);
    }
    map
}

fn decode_error(e: serde_json::Error) -> ApiError {
    ApiError::Decode(e.to_string())
}

/// Turn a raw response into an envelope.
///
/// Statuses above 299 become `ApiError::Remote` carrying the envelope. A
/// body that is not JSON of the expected shape becomes `ApiError::Decode`
/// regardless of status.
pub fn decode(response: HttpResponse, shape: BodyShape) -> Result<ZeroResponse> {
    let mut envelope = ZeroResponse {
        headers: collect_headers(response.headers),
        ..ZeroResponse::default()
    };

    if response.status > 299 {
        let error: BTreeMap<String, String> =
            serde_json::from_str(&response.body).map_err(decode_error)?;
        let message = error.get("error").cloned().unwrap_or_default();
        envelope.error = Some(error);
        return Err(ApiError::Remote {
            status: response.status,
            message,
            response: Box::new(envelope),
        });
    }

    envelope.body = match shape {
        BodyShape::Object => {
            let record: Record = serde_json::from_str(&response.body).map_err(decode_error)?;
            vec![record]
        }
        BodyShape::Array => serde_json::from_str(&response.body).map_err(decode_error)?,
    };
    Ok(envelope)
}
