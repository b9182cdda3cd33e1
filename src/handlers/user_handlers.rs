use crate::components::{Pagination, Profile, QueryView, DEFAULT_SIBLINGS};
use crate::error::{AppError, Result};
use crate::middleware::Viewport;
use crate::models::{CreateUserForm, User};
use crate::services::{CreateUserRequest, UserServiceError};
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;

pub const LOAD_FAILED_MESSAGE: &str = "Failed to load user data.";
pub const CREATE_FAILED_MESSAGE: &str = "Failed to create user.";

#[derive(Template, WebTemplate)]
#[template(path = "users/list.html")]
struct UserListTemplate {
    profile_html: String,
    is_loading: bool,
    is_failed: bool,
    is_fetching: bool,
    is_wide: bool,
    users: Vec<User>,
    pagination_html: String,
    error_message: &'static str,
}

#[derive(Template, WebTemplate)]
#[template(path = "users/detail.html")]
struct UserDetailTemplate {
    profile_html: String,
    is_loading: bool,
    is_failed: bool,
    is_fetching: bool,
    user: Option<User>,
    error_message: &'static str,
}

#[derive(Template, WebTemplate)]
#[template(path = "users/create.html")]
struct CreateUserTemplate {
    profile_html: String,
    error_message: String,
    name: String,
    email: String,
}

#[derive(Deserialize)]
pub struct ListUsersQuery {
    page: Option<String>,
}

fn profile_html(state: &AppState, viewport: Viewport) -> Result<String> {
    Ok(Profile::new(&state.config.profile, viewport.is_wide()).render()?)
}

fn parse_page(raw: Option<&str>) -> Result<u32> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(1),
        Some(value) => value
            .parse::<i64>()
            .map(|page| page.clamp(1, u32::MAX as i64) as u32)
            .map_err(|_| AppError::Validation("page must be an integer".to_string())),
    }
}

/// GET /users - paginated user listing
pub async fn list_users_page(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
    viewport: Viewport,
) -> Result<Response> {
    let page = parse_page(query.page.as_deref())?;
    let per_page = state.user_service.per_page();

    let view = QueryView::from(state.user_service.users_page(page).await);

    let is_loading = view.is_loading();
    let is_failed = view.is_failed();
    let is_fetching = view.is_fetching();

    let (users, pagination_html) = match view.into_data() {
        Some(user_page) => {
            let pagination = Pagination::new(
                "/users",
                user_page.total_count,
                page,
                per_page,
                DEFAULT_SIBLINGS,
            );
            (user_page.users, pagination.render()?)
        }
        None => (Vec::new(), String::new()),
    };

    let template = UserListTemplate {
        profile_html: profile_html(&state, viewport)?,
        is_loading,
        is_failed,
        is_fetching,
        is_wide: viewport.is_wide(),
        users,
        pagination_html,
        error_message: LOAD_FAILED_MESSAGE,
    };

    Ok(template.into_response())
}

/// GET /users/{id} - single user, served from the prefetch cache when fresh
pub async fn user_detail_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
    viewport: Viewport,
) -> Result<Response> {
    let view = QueryView::from(state.user_service.user_detail(&id).await);

    let template = UserDetailTemplate {
        profile_html: profile_html(&state, viewport)?,
        is_loading: view.is_loading(),
        is_failed: view.is_failed(),
        is_fetching: view.is_fetching(),
        user: view.into_data(),
        error_message: LOAD_FAILED_MESSAGE,
    };

    Ok(template.into_response())
}

/// POST /users/{id}/prefetch - fired when the pointer enters a user row
///
/// Always answers 204; the fetch keeps running after the response is sent.
pub async fn prefetch_user_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> StatusCode {
    if state.user_service.prefetch_user(&id).await {
        tracing::debug!("Prefetching user {}", id);
    }
    StatusCode::NO_CONTENT
}

/// GET /users/create - user creation form
pub async fn create_user_page(
    State(state): State<AppState>,
    viewport: Viewport,
) -> Result<Response> {
    let template = CreateUserTemplate {
        profile_html: profile_html(&state, viewport)?,
        error_message: String::new(),
        name: String::new(),
        email: String::new(),
    };

    Ok(template.into_response())
}

/// POST /users/create - validate, create through the API, back to the listing
pub async fn create_user_handler(
    State(state): State<AppState>,
    viewport: Viewport,
    Form(form): Form<CreateUserForm>,
) -> Result<Response> {
    let name = form.name.clone();
    let email = form.email.clone();

    let request = CreateUserRequest {
        name: form.name,
        email: form.email,
        password: form.password,
        password_confirm: form.password_confirmation,
    };

    match state.user_service.create_user(request).await {
        Ok(_) => Ok(Redirect::to("/users").into_response()),
        Err(e) => {
            let (status, error_message) = if e.is_validation() {
                (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            } else {
                if let UserServiceError::Api(api_error) = &e {
                    tracing::warn!("User creation failed: {}", api_error);
                }
                (StatusCode::BAD_GATEWAY, CREATE_FAILED_MESSAGE.to_string())
            };

            let template = CreateUserTemplate {
                profile_html: profile_html(&state, viewport)?,
                error_message,
                name,
                email,
            };

            Ok((status, template).into_response())
        }
    }
}

/// GET /health
pub async fn health_handler() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_defaults_and_clamps() {
        assert_eq!(parse_page(None).unwrap(), 1);
        assert_eq!(parse_page(Some("")).unwrap(), 1);
        assert_eq!(parse_page(Some("0")).unwrap(), 1);
        assert_eq!(parse_page(Some(" 3 ")).unwrap(), 3);
        assert_eq!(parse_page(Some("-1")).unwrap(), 1);
        assert_eq!(parse_page(Some("-250")).unwrap(), 1);
        assert_eq!(parse_page(Some("99999999999")).unwrap(), u32::MAX);
    }

    #[test]
    fn test_parse_page_rejects_garbage() {
        assert!(matches!(
            parse_page(Some("two")),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(parse_page(Some("1.5")), Err(AppError::Validation(_))));
    }
}
