//! HTTP client for the remote users API
//!
//! The admin pages never talk to the API directly; they go through the
//! [`UsersApi`] trait so the query layer and the handlers can be exercised
//! against a fake implementation.
//!
//! # Endpoints
//!
//! - `GET {base}/users?page=N&per_page=P` returns `{"users": [...]}` with the
//!   total number of users in the `x-total-count` header
//! - `GET {base}/users/{id}` returns `{"user": {...}}`
//! - `POST {base}/users` accepts `{"user": {...}}`
//!
//! # Example
//!
//! ```rust,no_run
//! use dashgo::services::{HttpUsersApi, UsersApi};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = HttpUsersApi::new("http://localhost:3000/api", Duration::from_secs(30))?;
//! let page = api.list_users(1, 10).await?;
//! println!("{} users in total", page.total_count);
//! # Ok(())
//! # }
//! ```

use crate::models::{ApiUser, NewUser, User, UserPage};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Errors that can occur while talking to the users API
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Unexpected status code: {0}")]
    Status(u16),

    #[error("Response decoding failed: {0}")]
    Decode(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait UsersApi: Send + Sync {
    /// Fetch one page of users (pages are 1-based).
    async fn list_users(&self, page: u32, per_page: u32) -> ApiResult<UserPage>;

    /// Fetch a single user by id.
    async fn get_user(&self, id: &str) -> ApiResult<User>;

    /// Create a user and return it as stored by the API.
    async fn create_user(&self, user: &NewUser) -> ApiResult<User>;
}

#[derive(Debug, Deserialize)]
struct UsersBody {
    users: Vec<ApiUser>,
    #[serde(default, alias = "totalCount")]
    total_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UserBody {
    Wrapped { user: ApiUser },
    Bare(ApiUser),
}

impl From<UserBody> for User {
    fn from(body: UserBody) -> Self {
        match body {
            UserBody::Wrapped { user } | UserBody::Bare(user) => user.into(),
        }
    }
}

/// reqwest-backed [`UsersApi`]
///
/// Cheap to clone; the underlying `reqwest::Client` pools connections.
#[derive(Clone, Debug)]
pub struct HttpUsersApi {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpUsersApi {
    /// Creates a client for the API rooted at `base_url`.
    ///
    /// A trailing slash on `base_url` is ignored.
    pub fn new(base_url: &str, timeout: Duration) -> ApiResult<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ApiError::InvalidBaseUrl(base_url));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> ApiResult<reqwest::Response> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout(self.timeout.as_millis() as u64)
            } else {
                ApiError::Request(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("users API answered {} for {}", status, response.url());
            return Err(ApiError::Status(status.as_u16()));
        }

        Ok(response)
    }
}

fn total_count_from_headers(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(TOTAL_COUNT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

#[async_trait]
impl UsersApi for HttpUsersApi {
    async fn list_users(&self, page: u32, per_page: u32) -> ApiResult<UserPage> {
        let request = self
            .client
            .get(self.url("users"))
            .query(&[("page", page), ("per_page", per_page)]);

        let response = self.send(request).await?;
        let header_total = total_count_from_headers(response.headers());

        let body: UsersBody = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        let users: Vec<User> = body.users.into_iter().map(User::from).collect();
        let total_count = header_total
            .or(body.total_count)
            .unwrap_or(users.len() as u64);

        Ok(UserPage { users, total_count })
    }

    async fn get_user(&self, id: &str) -> ApiResult<User> {
        // Ids arrive percent-decoded from the route; keep them one path segment
        let request = self
            .client
            .get(self.url(&format!("users/{}", urlencoding::encode(id))));
        let response = self.send(request).await?;

        let body: UserBody = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        Ok(body.into())
    }

    async fn create_user(&self, user: &NewUser) -> ApiResult<User> {
        let request = self
            .client
            .post(self.url("users"))
            .json(&json!({ "user": user }));
        let response = self.send(request).await?;

        let body: UserBody = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        Ok(body.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_new_rejects_non_http_base_url() {
        let result = HttpUsersApi::new("localhost:3000", Duration::from_secs(1));
        assert!(matches!(result, Err(ApiError::InvalidBaseUrl(_))));
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let api = HttpUsersApi::new("http://localhost:3000/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(api.base_url(), "http://localhost:3000/api");
        assert_eq!(api.url("/users/1"), "http://localhost:3000/api/users/1");
    }

    #[test]
    fn test_total_count_header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(total_count_from_headers(&headers), None);

        headers.insert(TOTAL_COUNT_HEADER, HeaderValue::from_static("42"));
        assert_eq!(total_count_from_headers(&headers), Some(42));

        headers.insert(TOTAL_COUNT_HEADER, HeaderValue::from_static("many"));
        assert_eq!(total_count_from_headers(&headers), None);
    }
}
