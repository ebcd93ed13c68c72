//! # API REST
//!
//! HTTP surface for docdir.
//!
//! Handles:
//! - HTTP endpoints with axum (home page, listing, upload, rename, download)
//! - Static passthrough of the store directory under `/public`
//! - HTML pages rendered from the template directory
//! - Per-request logging
//! - OpenAPI/Swagger documentation
//!
//! Uses `docdir_files` for every document operation; nothing here touches the
//! store directory directly except the `/public` file server.

#![warn(rust_2018_idioms)]

pub mod config;
pub mod logging;
pub mod pages;
pub mod routes;

pub use config::{ConfigError, ServerConfig};
pub use pages::{Pages, PagesError};
pub use routes::{router, ApiDoc, AppState};
