use crate::models::{NewUser, User, UserPage};
use crate::services::api_client::{ApiError, UsersApi};
use crate::services::query_client::{QueryClient, QueryState};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Name is required")]
    MissingName,
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Password too weak (minimum 6 characters)")]
    WeakPassword,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("API error: {0}")]
    Api(#[from] ApiError),
}

impl UserServiceError {
    pub fn is_validation(&self) -> bool {
        !matches!(self, UserServiceError::Api(_))
    }
}

pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// Cache settings applied to user queries
#[derive(Debug, Clone, Copy)]
pub struct QueryTimings {
    pub users_stale_time: Duration,
    pub user_stale_time: Duration,
    pub render_timeout: Duration,
}

impl Default for QueryTimings {
    fn default() -> Self {
        Self {
            users_stale_time: Duration::from_secs(600),
            user_stale_time: Duration::from_secs(600),
            render_timeout: Duration::from_millis(1500),
        }
    }
}

/// Users data access for the admin pages
///
/// Listing pages are cached under the page number, single users under
/// their id. Both go through a [`QueryClient`] so repeated renders and
/// hovers within the freshness window reuse earlier responses.
pub struct UserService {
    api: Arc<dyn UsersApi>,
    pages: QueryClient<u32, UserPage>,
    users: QueryClient<String, User>,
    per_page: u32,
    timings: QueryTimings,
}

impl UserService {
    pub fn new(api: Arc<dyn UsersApi>, per_page: u32, timings: QueryTimings) -> Self {
        Self {
            api,
            pages: QueryClient::new(),
            users: QueryClient::new(),
            per_page: per_page.max(1),
            timings,
        }
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Cache state for listing page `page` after waiting up to the render timeout.
    pub async fn users_page(&self, page: u32) -> QueryState<UserPage> {
        let page = page.max(1);
        let api = self.api.clone();
        let per_page = self.per_page;

        self.pages
            .observe(
                page,
                self.timings.users_stale_time,
                self.timings.render_timeout,
                move || async move { api.list_users(page, per_page).await },
            )
            .await
    }

    /// Cache state for user `id` after waiting up to the render timeout.
    pub async fn user_detail(&self, id: &str) -> QueryState<User> {
        let api = self.api.clone();
        let user_id = id.to_string();

        self.users
            .observe(
                id.to_string(),
                self.timings.user_stale_time,
                self.timings.render_timeout,
                move || async move { api.get_user(&user_id).await },
            )
            .await
    }

    /// Warms the cache for user `id`; returns true if a request was issued.
    pub async fn prefetch_user(&self, id: &str) -> bool {
        let api = self.api.clone();
        let user_id = id.to_string();

        self.users
            .prefetch_query(
                id.to_string(),
                self.timings.user_stale_time,
                move || async move { api.get_user(&user_id).await },
            )
            .await
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User, UserServiceError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(UserServiceError::MissingName);
        }

        let email = request.email.trim();
        self.validate_email(email)?;

        if request.password.len() < 6 {
            return Err(UserServiceError::WeakPassword);
        }

        if request.password != request.password_confirm {
            return Err(UserServiceError::PasswordMismatch);
        }

        let new_user = NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password: request.password,
        };

        let user = self.api.create_user(&new_user).await?;

        let stale_pages = self.pages.invalidate_queries(|_| true).await;
        tracing::info!(
            "Created user {} ({} cached listing pages invalidated)",
            user.id,
            stale_pages
        );

        self.users.set_query_data(user.id.clone(), user.clone()).await;

        Ok(user)
    }

    /// Drops cache entries idle for longer than `gc_time`.
    pub async fn collect_garbage(&self, gc_time: Duration) -> usize {
        self.pages.garbage_collect(gc_time).await + self.users.garbage_collect(gc_time).await
    }

    fn validate_email(&self, email: &str) -> Result<(), UserServiceError> {
        if !email.contains('@') || email.len() <= 3 {
            return Err(UserServiceError::InvalidEmail);
        }
        Ok(())
    }
}
