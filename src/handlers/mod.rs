pub mod user_handlers;

pub use user_handlers::{
    create_user_handler, create_user_page, health_handler, list_users_page,
    prefetch_user_handler, user_detail_page,
};
