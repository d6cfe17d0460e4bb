pub mod auth;
pub mod directory;
pub mod dispatch;
pub mod error;
pub mod mailer;
pub mod models;
pub mod openapi;
pub mod render;
pub mod repo;
pub mod routes;

// Re-export commonly used items for tests / external users
pub use dispatch::{DispatchError, DispatchSummary, Dispatcher};
pub use routes::{config, AppState};
