//! Authentication for sync endpoints.

mod middleware;

pub use middleware::*;
