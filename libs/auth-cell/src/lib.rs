pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use error::AuthError;
pub use models::*;
pub use services::*;
pub use router::auth_routes;
