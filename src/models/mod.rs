pub mod user;

pub use user::{ApiUser, CreateUserForm, NewUser, User, UserPage};
