pub mod clinic_api;
pub mod credentials;

pub use clinic_api::{ApiRequest, ApiResponse, ClinicApiClient};
pub use reqwest::{Method, StatusCode};
pub use credentials::{CredentialKey, CredentialStore, FileCredentialStore, InMemoryCredentialStore};
