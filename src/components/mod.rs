pub mod pagination;
pub mod profile;
pub mod query_view;

pub use pagination::{PageLink, Pagination, DEFAULT_SIBLINGS};
pub use profile::Profile;
pub use query_view::QueryView;
