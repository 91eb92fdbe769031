//! Bookclub Server
//!
//! Community book sharing: members keep shelves, join clubs, lend books to
//! each other and exchange direct messages. Book metadata comes from public
//! catalogues or from photos of covers read by several vision providers.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod isbn;
pub mod models;
pub mod ocr;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
