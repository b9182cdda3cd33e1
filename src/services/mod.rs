pub mod api_client;
pub mod query_client;
pub mod user_service;

pub use api_client::{ApiError, ApiResult, HttpUsersApi, UsersApi};
pub use query_client::{QueryClient, QueryError, QueryState};
pub use user_service::{CreateUserRequest, QueryTimings, UserService, UserServiceError};
