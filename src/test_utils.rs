pub mod test_helpers {
    use crate::config::AppConfig;
    use crate::services::{HttpUsersApi, QueryTimings, UserService};
    use crate::AppState;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    /// Configuration pointing at `api_base_url` with short timeouts for tests
    pub fn test_config(api_base_url: &str) -> AppConfig {
        AppConfig {
            api_base_url: api_base_url.to_string(),
            api_timeout: Duration::from_secs(5),
            render_timeout: Duration::from_secs(2),
            ..AppConfig::default()
        }
    }

    /// Application state backed by the HTTP API client
    pub fn create_test_state(config: AppConfig) -> Result<AppState, crate::services::ApiError> {
        let api = HttpUsersApi::new(&config.api_base_url, config.api_timeout)?;
        let user_service = UserService::new(
            Arc::new(api),
            config.users_per_page,
            QueryTimings {
                users_stale_time: config.users_stale_time,
                user_stale_time: config.user_stale_time,
                render_timeout: config.render_timeout,
            },
        );

        Ok(AppState {
            user_service: Arc::new(user_service),
            config: Arc::new(config),
        })
    }

    /// A user record in the shape the remote API returns
    pub fn api_user_json(id: u32) -> Value {
        json!({
            "id": id.to_string(),
            "name": format!("User {}", id),
            "email": format!("user{}@example.com", id),
            "created_at": "2021-04-02T10:15:00.000Z"
        })
    }

    /// `{"users": [...]}` body with `count` users starting at `first_id`
    pub fn users_page_json(first_id: u32, count: u32) -> Value {
        let users: Vec<Value> = (first_id..first_id + count).map(api_user_json).collect();
        json!({ "users": users })
    }
}
