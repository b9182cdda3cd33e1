//! Viewport classification from client hints
//!
//! Browsers that honour `Accept-CH` send the layout viewport width in
//! `Sec-CH-Viewport-Width` (or the legacy `Viewport-Width`). The width is
//! mapped onto the breakpoints the stylesheet uses. Without a width hint a
//! mobile user agent (`Sec-CH-UA-Mobile: ?1`) counts as narrow and anything
//! else as wide.

use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::convert::Infallible;

pub const VIEWPORT_WIDTH: &str = "sec-ch-viewport-width";
pub const LEGACY_VIEWPORT_WIDTH: &str = "viewport-width";
pub const UA_MOBILE: &str = "sec-ch-ua-mobile";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Breakpoint {
    Base,
    Sm,
    Md,
    Lg,
    Xl,
}

impl Breakpoint {
    /// Minimum widths: sm 480px, md 768px, lg 992px, xl 1280px.
    pub fn from_width(px: u32) -> Self {
        match px {
            0..=479 => Breakpoint::Base,
            480..=767 => Breakpoint::Sm,
            768..=991 => Breakpoint::Md,
            992..=1279 => Breakpoint::Lg,
            _ => Breakpoint::Xl,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub breakpoint: Breakpoint,
}

impl Viewport {
    pub fn wide() -> Self {
        Self {
            breakpoint: Breakpoint::Lg,
        }
    }

    pub fn narrow() -> Self {
        Self {
            breakpoint: Breakpoint::Base,
        }
    }

    /// Wide layouts show the profile details, the creation date column and
    /// the edit action.
    pub fn is_wide(&self) -> bool {
        self.breakpoint >= Breakpoint::Lg
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        let width = [VIEWPORT_WIDTH, LEGACY_VIEWPORT_WIDTH]
            .iter()
            .filter_map(|name| headers.get(*name))
            .filter_map(|value| value.to_str().ok())
            .find_map(|value| value.trim().parse::<f64>().ok());

        if let Some(width) = width {
            return Self {
                breakpoint: Breakpoint::from_width(width.max(0.0) as u32),
            };
        }

        let is_mobile = headers
            .get(UA_MOBILE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim() == "?1")
            .unwrap_or(false);

        if is_mobile {
            Self::narrow()
        } else {
            Self::wide()
        }
    }
}

impl<S> FromRequestParts<S> for Viewport
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Asks browsers to send viewport hints on subsequent requests.
pub async fn advertise_client_hints(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        "Accept-CH",
        HeaderValue::from_static("Sec-CH-Viewport-Width, Viewport-Width, Sec-CH-UA-Mobile"),
    );
    headers.append(
        "Vary",
        HeaderValue::from_static("Sec-CH-Viewport-Width, Viewport-Width, Sec-CH-UA-Mobile"),
    );

    response
}
