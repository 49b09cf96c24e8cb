pub mod auth;
pub mod de;
pub mod error;
