//! libris: a small library-catalog service.
//!
//! Accounts and cookie sessions live in [`auth`], the catalog and its files in
//! [`books`], and [`gateway`] puts both behind an axum router.

pub mod auth;
pub mod books;
pub mod config;
pub mod gateway;

pub use config::Config;
pub use gateway::{router, run_gateway, AppState};
