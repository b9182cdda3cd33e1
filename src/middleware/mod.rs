pub mod security;
pub mod viewport;

pub use security::add_security_headers;
pub use viewport::{advertise_client_hints, Breakpoint, Viewport};
