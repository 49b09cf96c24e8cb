pub mod client;
pub mod refresh;

pub use client::AuthenticatedClient;
pub use refresh::TokenRefreshService;
