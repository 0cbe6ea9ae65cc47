//! HTTP surface: `POST /scan` behind a pre-shared bearer token.

mod auth;
mod error;
mod routes;
mod server;

pub use auth::ApiKey;
pub use error::ScanError;
pub use routes::{AppState, ScanRequest, router};
pub use server::{ServerConfig, serve};
