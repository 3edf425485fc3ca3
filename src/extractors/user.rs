//! Acting user (`X-User`) and label locale (`Accept-Language`) from request headers.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::ACCEPT_LANGUAGE, request::Parts, HeaderMap},
};

/// Header carrying the acting user name recorded in the audit log.
pub const USER_HEADER: &str = "X-User";

pub const DEFAULT_LOCALE: &str = "en-US";

fn header_str<'a>(headers: &'a HeaderMap, name: impl axum::http::header::AsHeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Optional acting user.
#[derive(Clone, Debug, Default)]
pub struct Actor(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Actor(header_str(&parts.headers, USER_HEADER).map(str::to_string)))
    }
}

/// First language tag of `Accept-Language`, quality values ignored.
#[derive(Clone, Debug)]
pub struct Locale(pub String);

impl Default for Locale {
    fn default() -> Self {
        Locale(DEFAULT_LOCALE.to_string())
    }
}

impl Locale {
    pub fn parse(header: Option<&str>) -> Self {
        header
            .and_then(|h| h.split(',').next())
            .and_then(|tag| tag.split(';').next())
            .map(str::trim)
            .filter(|tag| !tag.is_empty() && *tag != "*")
            .map(|tag| Locale(tag.to_string()))
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Locale::parse(header_str(&parts.headers, ACCEPT_LANGUAGE)))
    }
}
