//! Response values loaders and actions may return instead of plain data.
//!
//! A response carries redirect (`Location`) and cache-revalidation (`X-Revalidate`)
//! signals that the cache and action layers act on.

use crate::error::LoadError;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, StatusCode};
use serde_json::Value;

/// Comma-separated cache key prefixes to invalidate and revalidate.
pub const REVALIDATE_HEADER: &str = "x-revalidate";
/// Marks a body whose top-level keys seed the cache, with the action result under
/// [`SINGLE_FLIGHT_VALUE_KEY`].
pub const SINGLE_FLIGHT_HEADER: &str = "x-single-flight";
pub const SINGLE_FLIGHT_VALUE_KEY: &str = "_$value";

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// The redirect target, if any.
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }

    /// Key prefixes named by `X-Revalidate`; `None` when the header is absent.
    pub fn revalidate_keys(&self) -> Option<Vec<String>> {
        let raw = self.headers.get(REVALIDATE_HEADER)?.to_str().ok()?;
        Some(raw.split(',').map(str::to_string).collect())
    }

    pub fn is_single_flight(&self) -> bool {
        self.headers.contains_key(SINGLE_FLIGHT_HEADER)
    }
}

/// Status, extra headers and revalidation keys for the response helpers.
#[derive(Debug, Clone, Default)]
pub struct ResponseInit {
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    pub revalidate: Vec<String>,
}

impl ResponseInit {
    pub fn revalidate<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            revalidate: keys.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

impl From<StatusCode> for ResponseInit {
    fn from(status: StatusCode) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

impl From<u16> for ResponseInit {
    fn from(status: u16) -> Self {
        StatusCode::from_u16(status)
            .map(Self::from)
            .unwrap_or_default()
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, LoadError> {
    HeaderValue::from_str(value).map_err(|_| LoadError::InvalidHeader {
        name: name.to_string(),
    })
}

fn build(init: ResponseInit, default_status: StatusCode) -> Result<Response, LoadError> {
    let mut headers = init.headers;
    if !init.revalidate.is_empty() {
        headers.insert(
            HeaderName::from_static(REVALIDATE_HEADER),
            header_value(REVALIDATE_HEADER, &init.revalidate.join(","))?,
        );
    }
    Ok(Response {
        status: init.status.unwrap_or(default_status),
        headers,
        body: None,
    })
}

/// A redirect to `url`, `302 Found` unless `init` says otherwise.
pub fn redirect(url: &str, init: impl Into<ResponseInit>) -> Result<Response, LoadError> {
    let mut response = build(init.into(), StatusCode::FOUND)?;
    response
        .headers
        .insert(LOCATION, header_value("location", url)?);
    Ok(response)
}

/// An empty response that only carries revalidation keys.
pub fn reload(init: impl Into<ResponseInit>) -> Result<Response, LoadError> {
    build(init.into(), StatusCode::OK)
}

/// A JSON body response.
pub fn json(data: Value, init: impl Into<ResponseInit>) -> Result<Response, LoadError> {
    let mut response = build(init.into(), StatusCode::OK)?;
    response
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response.body = Some(data);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redirect_defaults_to_found() {
        let r = redirect("/login", ResponseInit::default()).expect("valid redirect");
        assert_eq!(r.status, StatusCode::FOUND);
        assert_eq!(r.location(), Some("/login"));
        assert_eq!(r.revalidate_keys(), None);

        let r = redirect("/moved", StatusCode::MOVED_PERMANENTLY).expect("valid redirect");
        assert_eq!(r.status, StatusCode::MOVED_PERMANENTLY);

        let r = redirect("/temp", 307u16).expect("valid redirect");
        assert_eq!(r.status, StatusCode::TEMPORARY_REDIRECT);
    }

    #[test]
    fn test_revalidate_header() {
        let r = reload(ResponseInit::revalidate(["users", "orders"])).expect("reload");
        assert_eq!(
            r.revalidate_keys(),
            Some(vec!["users".to_string(), "orders".to_string()])
        );
        assert!(r.location().is_none());
    }

    #[test]
    fn test_json_sets_content_type() {
        let r = json(json!({"ok": true}), ResponseInit::default()).expect("json");
        assert_eq!(
            r.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
        assert_eq!(r.body, Some(json!({"ok": true})));
    }

    #[test]
    fn test_invalid_location_is_rejected() {
        let err = redirect("/bad\nheader", ResponseInit::default()).expect_err("invalid");
        assert_eq!(
            err,
            LoadError::InvalidHeader {
                name: "location".into()
            }
        );
    }
}
